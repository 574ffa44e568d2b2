//! HTTP 工具后端
//!
//! POST `{base_url}/execute`，请求体 `{"name": ..., "parameters": {...}}`，响应体为
//! `{status, result, error_message}` 信封。连接层失败映射为 Unavailable，HTTP 错误码映射为 Failed。

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::tools::{Parameters, ToolBackend, ToolError, ToolResponse};

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    name: &'a str,
    parameters: &'a Parameters,
}

/// 远程工具执行服务客户端
pub struct HttpToolBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpToolBackend {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ToolError> {
        reqwest::Url::parse(base_url)
            .map_err(|e| ToolError::Failed(format!("invalid backend url '{base_url}': {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| ToolError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/execute", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ToolBackend for HttpToolBackend {
    async fn execute_tool(
        &self,
        name: &str,
        parameters: &Parameters,
    ) -> Result<ToolResponse, ToolError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ExecuteRequest { name, parameters })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout(name.to_string())
                } else if e.is_connect() || e.is_request() {
                    ToolError::Unavailable(e.to_string())
                } else {
                    ToolError::Failed(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ToolError::UnknownTool(name.to_string()));
        }
        if status.is_server_error() && status != reqwest::StatusCode::INTERNAL_SERVER_ERROR {
            // 502/503/504：网关或服务本身不可用
            return Err(ToolError::Unavailable(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(ToolError::Failed(format!("HTTP {status}")));
        }

        response
            .json::<ToolResponse>()
            .await
            .map_err(|e| ToolError::Failed(format!("invalid response envelope: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_normalises_trailing_slash() {
        let backend = HttpToolBackend::new("http://localhost:8080/", 5).unwrap();
        assert_eq!(backend.endpoint(), "http://localhost:8080/execute");
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(matches!(HttpToolBackend::new("not a url", 5), Err(ToolError::Failed(_))));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        // 端口 9 (discard) 在测试环境中通常无人监听
        let backend = HttpToolBackend::new("http://127.0.0.1:9", 2).unwrap();
        let result = backend.execute_tool("web_search_tool", &Parameters::new()).await;
        assert!(matches!(
            result,
            Err(ToolError::Unavailable(_)) | Err(ToolError::Timeout(_))
        ));
    }
}
