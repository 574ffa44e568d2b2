//! 工具执行器
//!
//! 持有 ToolBackend 与单步超时，execute(tool_name, parameters) 在超时内调用后端，
//! 超时、错误状态或后端故障统一转为 ToolError；每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::tools::{Parameters, ToolBackend, ToolError, ToolStatus};

/// 工具执行器：对每次调用施加超时，并将结果映射为 ToolError
#[derive(Clone)]
pub struct ToolExecutor {
    backend: Arc<dyn ToolBackend>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(backend: Arc<dyn ToolBackend>, timeout_secs: u64) -> Self {
        Self {
            backend,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    pub fn with_timeout(backend: Arc<dyn ToolBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 执行指定工具；超时返回 Timeout，status=error 转为 Failed；输出 JSON 审计日志
    pub async fn execute(&self, tool_name: &str, parameters: &Parameters) -> Result<Value, ToolError> {
        let start = Instant::now();
        let result = timeout(self.timeout, self.backend.execute_tool(tool_name, parameters)).await;

        let outcome = match result {
            Ok(Ok(response)) => match response.status {
                ToolStatus::Success => Ok(response.result),
                ToolStatus::Error => Err(ToolError::Failed(
                    response
                        .error_message
                        .unwrap_or_else(|| "tool reported an error".to_string()),
                )),
            },
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ToolError::Timeout(tool_name.to_string())),
        };

        let label = match &outcome {
            Ok(_) => "ok",
            Err(ToolError::Timeout(_)) => "timeout",
            Err(ToolError::Unavailable(_)) => "unavailable",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": outcome.is_ok(),
            "outcome": label,
            "duration_ms": start.elapsed().as_millis() as u64,
            "params_preview": params_preview(parameters),
        });
        tracing::info!(audit = %audit, "tool");

        outcome
    }
}

fn params_preview(parameters: &Parameters) -> String {
    let s = serde_json::to_string(parameters).unwrap_or_default();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
