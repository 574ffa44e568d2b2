//! 工具注册表（进程内后端）
//!
//! 所有进程内工具实现 Tool trait（name / description / execute），由 ToolRegistry 按注册顺序存储；
//! ToolRegistry 本身实现 ToolBackend，并可导出对应的 ToolDirectory。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{Parameters, ToolBackend, ToolDirectory, ToolError, ToolResponse, ToolSpec};

/// 工具 trait：名称、描述（供目录与 LLM 理解）、异步执行
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（即目录中的 name）
    fn name(&self) -> &str;

    /// 工具描述
    fn description(&self) -> &str;

    /// 执行工具，Err 中为面向用户的失败原因
    async fn execute(&self, parameters: &Parameters) -> Result<Value, String>;
}

/// 工具注册表：保持注册顺序，按名称查找
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；同名工具覆盖旧实现但保留原位置
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        let tool: Arc<dyn Tool> = Arc::new(tool);
        match self.index.get(&name) {
            Some(&pos) => self.tools[pos] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&pos| Arc::clone(&self.tools[pos]))
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 按注册顺序生成工具目录
    pub fn directory(&self) -> ToolDirectory {
        self.tools
            .iter()
            .map(|t| ToolSpec::new(t.name(), t.description()))
            .collect()
    }
}

#[async_trait]
impl ToolBackend for ToolRegistry {
    async fn execute_tool(
        &self,
        name: &str,
        parameters: &Parameters,
    ) -> Result<ToolResponse, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        match tool.execute(parameters).await {
            Ok(result) => Ok(ToolResponse::success(result)),
            Err(message) => Ok(ToolResponse::error(message)),
        }
    }
}
