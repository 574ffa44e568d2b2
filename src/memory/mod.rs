//! 记忆层：请求内的对话历史窗口

pub mod conversation;

pub use conversation::{ConversationWindow, Message, Role};
