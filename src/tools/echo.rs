//! Echo 工具（演练用）
//!
//! 未配置 HTTP 后端时，命令行为目录中的每个工具注册一个 EchoTool，返回「将以何参数调用」的文本，
//! 便于在没有真实工具服务的情况下观察计划与聚合结果。

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{Parameters, Tool};

/// 以任意名称注册的回显工具
pub struct EchoTool {
    name: String,
    description: String,
}

impl EchoTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, parameters: &Parameters) -> Result<Value, String> {
        if parameters.is_empty() {
            return Ok(Value::String(format!("[dry-run] {} (no parameters)", self.name)));
        }
        let rendered = parameters
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Value::String(format!("[dry-run] {} ({})", self.name, rendered)))
    }
}
