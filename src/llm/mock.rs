//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按脚本依次返回预置回复；脚本耗尽后回显最后一条 User 消息。`failing()` 模拟服务不可用。
//! 所有收到的消息都会被记录，测试可断言「兜底服务是否被调用」。token 用量按空白分词近似统计。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, TokenUsage};
use crate::memory::{Message, Role};

/// Mock 客户端：脚本化回复 + 调用记录
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<Vec<Message>>>,
    always_fail: bool,
    usage: TokenUsage,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置若干条成功回复，按调用顺序消费
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    /// 每次调用都返回 Unavailable
    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    pub fn push_response(&self, response: impl Into<String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(response.into()));
        }
    }

    pub fn push_error(&self, error: LlmError) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(error));
        }
    }

    /// 已收到的调用次数
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// 最后一次调用的消息（断言 prompt 内容用）
    pub fn last_call(&self) -> Option<Vec<Message>> {
        self.calls.lock().ok().and_then(|c| c.last().cloned())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn name(&self) -> &str {
        "mock"
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }

        if self.always_fail {
            return Err(LlmError::Unavailable("mock llm configured to fail".to_string()));
        }

        let reply = match self.script.lock().ok().and_then(|mut s| s.pop_front()) {
            Some(next) => next?,
            None => {
                let last_user = messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or("(no input)");
                format!("Echo from Mock: {}", last_user)
            }
        };

        let prompt: usize = messages.iter().map(|m| word_count(&m.content)).sum();
        self.usage.add(prompt as u64, word_count(&reply) as u64);
        Ok(reply)
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_then_echo() {
        let mock = MockLlmClient::with_responses(["first"]);
        let messages = vec![Message::user("ping")];
        assert_eq!(mock.complete(&messages).await.unwrap(), "first");
        assert_eq!(mock.complete(&messages).await.unwrap(), "Echo from Mock: ping");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_pushed_script_and_usage() {
        let mock = MockLlmClient::new();
        mock.push_response("two words");
        mock.push_error(LlmError::EmptyResponse);

        let messages = vec![Message::system("be brief"), Message::user("ping")];
        assert_eq!(mock.complete(&messages).await.unwrap(), "two words");
        assert_eq!(mock.token_usage(), (3, 2, 5));

        assert_eq!(mock.complete(&messages).await, Err(LlmError::EmptyResponse));
        // 失败调用不计入用量
        assert_eq!(mock.token_usage(), (3, 2, 5));
    }

    #[tokio::test]
    async fn test_failing_mock_records_call() {
        let mock = MockLlmClient::failing();
        let result = mock.complete(&[Message::user("x")]).await;
        assert!(matches!(result, Err(LlmError::Unavailable(_))));
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.token_usage(), (0, 0, 0));
    }
}
