//! 工具执行后端契约
//!
//! `execute_tool(name, parameters) -> {status, result, error_message}`。编排层把非 success 状态、
//! 超时与抛出的错误一视同仁地视为步骤失败；Unavailable 额外用于判定「后端整体不可达」。

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// 工具参数：有序映射，保证日志与序列化稳定
pub type Parameters = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

/// 后端返回的信封
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub status: ToolStatus,
    #[serde(default)]
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ToolResponse {
    pub fn success(result: impl Into<Value>) -> Self {
        Self {
            status: ToolStatus::Success,
            result: result.into(),
            error_message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            result: Value::Null,
            error_message: Some(message.into()),
        }
    }
}

/// 工具调用失败的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// 后端本身不可达（连接失败等）
    #[error("Tool backend unavailable: {0}")]
    Unavailable(String),

    #[error("Tool execution failed: {0}")]
    Failed(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool timeout: {0}")]
    Timeout(String),
}

impl ToolError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ToolError::Unavailable(_))
    }
}

/// 工具执行后端：进程内注册表、HTTP 服务或测试替身
#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn execute_tool(
        &self,
        name: &str,
        parameters: &Parameters,
    ) -> Result<ToolResponse, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_envelope_json_shape() {
        let ok: ToolResponse =
            serde_json::from_str(r#"{"status": "success", "result": {"hits": 3}}"#).unwrap();
        assert_eq!(ok.status, ToolStatus::Success);
        assert_eq!(ok.result["hits"], 3);

        let err: ToolResponse =
            serde_json::from_str(r#"{"status": "error", "error_message": "quota"}"#).unwrap();
        assert_eq!(err.status, ToolStatus::Error);
        assert_eq!(err.result, Value::Null);
        assert_eq!(err.error_message.as_deref(), Some("quota"));
    }

    #[test]
    fn test_only_unavailable_counts_as_backend_outage() {
        assert!(ToolError::Unavailable("connection refused".into()).is_unavailable());
        assert!(!ToolError::Timeout("slow_tool".into()).is_unavailable());
        assert!(!ToolError::Failed("quota".into()).is_unavailable());
        assert!(!ToolError::UnknownTool("x".into()).is_unavailable());
    }
}
