//! LLM 客户端抽象
//!
//! 规划兜底服务与对话回复共用同一个 LlmClient：所有后端（OpenAI 兼容 / DeepSeek / Mock）只需实现 complete。

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::Message;

/// 文本生成服务的错误（编排层只关心「能否拿到文本」）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("LLM service unavailable: {0}")]
    Unavailable(String),
}

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 后端名称（日志用）
    fn name(&self) -> &str {
        "llm"
    }

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
