//! 编排错误与面向用户的致歉文本
//!
//! 这些错误不会让请求失败：编排器把它们转成一个 workflow_error 事件和一段自然语言回复。

use thiserror::Error;

use crate::workflow::PlanningError;

/// 编排过程中无法恢复的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("planning failed: {0}")]
    Planning(#[from] PlanningError),

    #[error("workflow cancelled")]
    Cancelled,

    #[error("tool backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("config error: {0}")]
    Config(String),
}

impl OrchestratorError {
    /// 给用户看的回复
    pub fn user_message(&self) -> String {
        match self {
            OrchestratorError::Planning(_) => {
                "Sorry, I couldn't work out how to break your request into steps right now. \
                 Please try rephrasing it or try again shortly."
                    .to_string()
            }
            OrchestratorError::Cancelled => "The workflow was cancelled before it finished.".to_string(),
            OrchestratorError::BackendUnavailable(_) => {
                "Sorry, the tool service is unavailable right now, so none of the steps could run. \
                 Please try again shortly."
                    .to_string()
            }
            OrchestratorError::Config(_) => {
                "Sorry, the assistant is misconfigured and cannot run this request.".to_string()
            }
        }
    }
}
