//! 意图识别
//!
//! 先走确定性的启发式：按连接词切分子句、逐句解析最佳工具，再结合全文的工具证据判定。
//! 启发式无法定论时（多个工具有证据却无法按子句区分）才询问文本生成服务；
//! 服务失败或回复无法解析时一律退化为 conversation，从不让请求失败。

use std::sync::Arc;

use crate::llm::LlmClient;
use crate::tools::ToolDirectory;
use crate::workflow::fallback;
use crate::workflow::scoring::ScoringIndex;
use crate::workflow::segmenter::Segmenter;
use crate::workflow::types::Intent;

/// 启发式判定结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Decided(Intent),
    /// 有多个工具的证据，但子句层面无法区分
    Inconclusive { candidates: Vec<String> },
}

/// 意图识别器
pub struct IntentClassifier {
    llm: Option<Arc<dyn LlmClient>>,
    segmenter: Segmenter,
}

impl IntentClassifier {
    pub fn new(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            llm,
            segmenter: Segmenter::new(),
        }
    }

    /// 识别请求意图
    pub async fn classify(&self, text: &str, directory: &ToolDirectory) -> Intent {
        match self.heuristic(text, directory) {
            Verdict::Decided(intent) => intent,
            Verdict::Inconclusive { candidates } => {
                tracing::info!(?candidates, "intent heuristic inconclusive, asking planning service");
                self.llm_classify(text, directory).await
            }
        }
    }

    /// 纯启发式判定（不调用 LLM）
    pub fn heuristic(&self, text: &str, directory: &ToolDirectory) -> Verdict {
        if text.trim().is_empty() || directory.is_empty() {
            return Verdict::Decided(Intent::Conversation);
        }

        let index = ScoringIndex::new(directory);
        let segmentation = self.segmenter.segment(text);

        // 子句层面解析出的工具（相邻重复只计一次）
        let mut resolved: Vec<String> = Vec::new();
        for clause in &segmentation.clauses {
            if let Some(best) = index.best(&clause.text) {
                if resolved.last() != Some(&best.tool) {
                    resolved.push(best.tool);
                }
            }
        }
        let mut distinct = resolved.clone();
        distinct.sort();
        distinct.dedup();

        // 全文层面有证据的工具
        let whole_text = index.matching_tools(text);

        if distinct.len() >= 2 {
            return Verdict::Decided(Intent::MultiStep);
        }
        if whole_text.len() >= 2 {
            return Verdict::Inconclusive {
                candidates: whole_text,
            };
        }
        if distinct.len() == 1 || whole_text.len() == 1 {
            return Verdict::Decided(Intent::SingleTool);
        }
        Verdict::Decided(Intent::Conversation)
    }

    async fn llm_classify(&self, text: &str, directory: &ToolDirectory) -> Intent {
        let Some(llm) = &self.llm else {
            return Intent::Conversation;
        };

        let messages = fallback::intent_messages(text, directory);
        match llm.complete(&messages).await {
            Ok(answer) => fallback::parse_intent_answer(&answer).unwrap_or_else(|| {
                tracing::warn!(answer = %answer, "unparseable intent answer, defaulting to conversation");
                Intent::Conversation
            }),
            Err(e) => {
                tracing::warn!(error = %e, "intent classification service failed, defaulting to conversation");
                Intent::Conversation
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::tools::ToolSpec;

    fn directory() -> ToolDirectory {
        ToolDirectory::new(vec![
            ToolSpec::new("prior_art_search_tool", "Search patent databases for prior art"),
            ToolSpec::new("claim_drafting_tool", "Draft patent claims from an invention description"),
            ToolSpec::new("web_search_tool", "Search the internet for general information"),
        ])
    }

    fn classifier() -> IntentClassifier {
        IntentClassifier::new(Some(Arc::new(MockLlmClient::failing())))
    }

    #[test]
    fn test_multi_step_with_connector() {
        let verdict = classifier().heuristic("prior art search 5g ai, draft 2 claims", &directory());
        assert_eq!(verdict, Verdict::Decided(Intent::MultiStep));
    }

    #[test]
    fn test_single_tool_without_connector() {
        let verdict = classifier().heuristic("prior art search for 5g technology", &directory());
        assert_eq!(verdict, Verdict::Decided(Intent::SingleTool));
    }

    #[test]
    fn test_conversation_and_degenerate_inputs() {
        let c = classifier();
        let dir = directory();
        assert_eq!(c.heuristic("hello how are you", &dir), Verdict::Decided(Intent::Conversation));
        assert_eq!(c.heuristic("", &dir), Verdict::Decided(Intent::Conversation));
        assert_eq!(c.heuristic("and then, and", &dir), Verdict::Decided(Intent::Conversation));
        assert_eq!(
            c.heuristic("draft claims and draft claims", &dir),
            Verdict::Decided(Intent::SingleTool)
        );
    }

    #[test]
    fn test_two_tools_in_one_clause_is_inconclusive() {
        let verdict = classifier().heuristic("web search for prior art on drones", &directory());
        assert!(matches!(verdict, Verdict::Inconclusive { .. }));
    }

    #[tokio::test]
    async fn test_inconclusive_asks_llm() {
        let llm = Arc::new(MockLlmClient::with_responses(["INTENT: multi_step"]));
        let c = IntentClassifier::new(Some(llm.clone()));
        let intent = c.classify("web search for prior art on drones", &directory()).await;
        assert_eq!(intent, Intent::MultiStep);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_llm_failure_defaults_to_conversation() {
        let intent = classifier()
            .classify("web search for prior art on drones", &directory())
            .await;
        assert_eq!(intent, Intent::Conversation);

        let garbled = IntentClassifier::new(Some(Arc::new(MockLlmClient::with_responses(["¯\\_(ツ)_/¯"]))));
        let intent = garbled.classify("web search for prior art on drones", &directory()).await;
        assert_eq!(intent, Intent::Conversation);
    }

    #[tokio::test]
    async fn test_decided_cases_never_call_llm() {
        let llm = Arc::new(MockLlmClient::new());
        let c = IntentClassifier::new(Some(llm.clone()));
        c.classify("hello how are you", &directory()).await;
        c.classify("prior art search 5g ai, draft 2 claims", &directory()).await;
        assert_eq!(llm.call_count(), 0);
    }
}
