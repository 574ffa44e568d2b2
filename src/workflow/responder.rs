//! 对话回复（conversation 意图）
//!
//! 空输入与简单问候走确定性回复，不调用任何服务；其余请求连同最近对话与文档上下文交给文本生成服务，
//! 服务失败时返回固定的致歉文本。

use std::sync::Arc;

use crate::llm::LlmClient;
use crate::memory::{ConversationWindow, Message};
use crate::tools::ToolDirectory;
use crate::workflow::scoring::normalize_tokens;

const GREETING_WORDS: &[&str] = &["hello", "hi", "hey", "hiya", "greetings", "howdy", "yo"];
const GREETING_PHRASES: &[&[&str]] = &[
    &["good", "morning"],
    &["good", "afternoon"],
    &["good", "evening"],
];
/// 超过该词数即不再视为单纯问候
const MAX_GREETING_WORDS: usize = 8;

pub const EMPTY_INPUT_REPLY: &str = "It looks like your message was empty. What would you like me to do?";
pub const UNAVAILABLE_REPLY: &str =
    "Sorry, I can't reply right now because the assistant service is unavailable. Please try again shortly.";

const SYSTEM_PROMPT: &str = "You are a helpful patent assistant. Answer the user's message directly and concisely. \
If the user asks for something one of the listed tools can do, suggest phrasing the request as a task.";

/// 对话回复器
pub struct ConversationResponder {
    llm: Option<Arc<dyn LlmClient>>,
    greeting_fast_path: bool,
    max_context_turns: usize,
}

impl ConversationResponder {
    pub fn new(llm: Option<Arc<dyn LlmClient>>, greeting_fast_path: bool, max_context_turns: usize) -> Self {
        Self {
            llm,
            greeting_fast_path,
            max_context_turns,
        }
    }

    /// 共享 LLM 的累计 token 用量 (prompt, completion, total)；无 LLM 时为零
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.as_ref().map(|llm| llm.token_usage()).unwrap_or_default()
    }

    pub async fn respond(
        &self,
        text: &str,
        history: &[Message],
        document: &str,
        directory: &ToolDirectory,
    ) -> String {
        if text.trim().is_empty() {
            return EMPTY_INPUT_REPLY.to_string();
        }
        if self.greeting_fast_path && is_greeting(text) {
            return greeting_reply(directory);
        }

        let Some(llm) = &self.llm else {
            return UNAVAILABLE_REPLY.to_string();
        };
        let window = ConversationWindow::new(history, self.max_context_turns);
        let mut messages = Vec::with_capacity(window.len() + 2);
        messages.push(Message::system(system_prompt(document, directory)));
        messages.extend(window.messages().iter().cloned());
        messages.push(Message::user(text));

        match llm.complete(&messages).await {
            Ok(reply) if !reply.trim().is_empty() => reply,
            Ok(_) => UNAVAILABLE_REPLY.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "conversation reply failed");
                UNAVAILABLE_REPLY.to_string()
            }
        }
    }
}

/// 是否为单纯问候（以问候词开头且足够短）
pub fn is_greeting(text: &str) -> bool {
    let tokens = normalize_tokens(text);
    if tokens.is_empty() || tokens.len() > MAX_GREETING_WORDS {
        return false;
    }
    GREETING_WORDS.contains(&tokens[0].as_str())
        || GREETING_PHRASES
            .iter()
            .any(|p| tokens.len() >= p.len() && tokens.iter().zip(p.iter()).all(|(t, w)| t == w))
}

fn greeting_reply(directory: &ToolDirectory) -> String {
    if directory.is_empty() {
        return "Hello! How can I help you today?".to_string();
    }
    format!(
        "Hello! How can I help you today? I can run these tools for you: {}.",
        directory.names().join(", ")
    )
}

fn system_prompt(document: &str, directory: &ToolDirectory) -> String {
    let mut prompt = SYSTEM_PROMPT.to_string();
    if !directory.is_empty() {
        prompt.push_str("\n\nAvailable tools:\n");
        prompt.push_str(&directory.render_for_prompt());
    }
    if !document.trim().is_empty() {
        prompt.push_str("\n\nDocument context:\n");
        prompt.push_str(document.trim());
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::tools::ToolSpec;

    fn directory() -> ToolDirectory {
        ToolDirectory::new(vec![ToolSpec::new("web_search_tool", "Search the internet")])
    }

    #[test]
    fn test_greeting_detection() {
        assert!(is_greeting("hello how are you"));
        assert!(is_greeting("Hi!"));
        assert!(is_greeting("good morning team"));
        assert!(!is_greeting("history of patents"));
        assert!(!is_greeting(""));
    }

    #[tokio::test]
    async fn test_greeting_skips_llm() {
        let llm = Arc::new(MockLlmClient::new());
        let r = ConversationResponder::new(Some(llm.clone()), true, 5);
        let reply = r.respond("hello how are you", &[], "", &directory()).await;
        assert!(reply.starts_with("Hello!"));
        assert!(reply.contains("web_search_tool"));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_llm_reply_includes_history_and_document() {
        let llm = Arc::new(MockLlmClient::with_responses(["Claims define the scope."]));
        let r = ConversationResponder::new(Some(llm.clone()), true, 5);
        let history = vec![Message::user("earlier"), Message::assistant("noted")];
        let reply = r
            .respond("what do claims do?", &history, "my invention doc", &directory())
            .await;
        assert_eq!(reply, "Claims define the scope.");

        let sent = llm.last_call().unwrap();
        assert_eq!(sent.len(), 4);
        assert!(sent[0].content.contains("my invention doc"));
        assert_eq!(sent[3].content, "what do claims do?");
        let (prompt, completion, total) = r.token_usage();
        assert!(prompt > 0);
        assert_eq!(completion, 4);
        assert_eq!(total, prompt + completion);
    }

    #[tokio::test]
    async fn test_failure_and_empty_input_are_canned() {
        let r = ConversationResponder::new(Some(Arc::new(MockLlmClient::failing())), true, 5);
        assert_eq!(r.respond("what do claims do?", &[], "", &directory()).await, UNAVAILABLE_REPLY);
        assert_eq!(r.respond("   ", &[], "", &directory()).await, EMPTY_INPUT_REPLY);
        assert_eq!(r.token_usage(), (0, 0, 0));
        assert_eq!(ConversationResponder::new(None, true, 5).token_usage(), (0, 0, 0));
    }
}
