//! 对话历史：请求携带的先前轮次
//!
//! WorkflowRequest 按时间顺序（旧 → 新）携带 user/assistant 消息；ConversationWindow 截取最近 N 轮，
//! 供兜底规划服务与对话回复使用，避免把整段历史塞进 prompt。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 最近 N 轮对话的只读视图（每轮含 user + assistant，故最多保留 max_turns*2 条消息）
#[derive(Clone, Copy, Debug)]
pub struct ConversationWindow<'a> {
    messages: &'a [Message],
}

impl<'a> ConversationWindow<'a> {
    pub fn new(history: &'a [Message], max_turns: usize) -> Self {
        let keep = max_turns.saturating_mul(2);
        let start = history.len().saturating_sub(keep);
        Self {
            messages: &history[start..],
        }
    }

    pub fn messages(&self) -> &'a [Message] {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 渲染为 `role: content` 多行文本，用于拼入规划 prompt
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => "system",
                };
                format!("{}: {}", role, m.content.trim())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
