//! 工作流规划器
//!
//! 启发式路径（纯函数、确定性）：
//! 1. 按连接词切分子句；
//! 2. 逐句打分解析工具，无法解析的子句按原文回拼到相邻子句（多为查询内容中的「and」或逗号）；
//! 3. 相邻同工具子句合并为一步；
//! 4. 按工具画像生成参数模板；
//! 5. 依据「产出 / 消费」产物表连接 input_from。
//!
//! 启发式得到 0 步时转入兜底规划服务；服务不可达时返回 PlanningError。

use std::sync::Arc;

use crate::llm::LlmClient;
use crate::memory::{ConversationWindow, Message};
use crate::tools::{catalog, Parameters, ToolDirectory};
use crate::workflow::builder::PlanBuilder;
use crate::workflow::fallback::{self, RawStep};
use crate::workflow::scoring::ScoringIndex;
use crate::workflow::segmenter::{rejoin, Segmenter};
use crate::workflow::template;
use crate::workflow::types::{PlanSource, PlanningError, WorkflowPlan};

/// 已解析到工具的子句
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedClause {
    tool: String,
    text: String,
}

/// 工作流规划器
pub struct WorkflowPlanner {
    llm: Option<Arc<dyn LlmClient>>,
    segmenter: Segmenter,
    max_context_turns: usize,
}

impl WorkflowPlanner {
    pub fn new(llm: Option<Arc<dyn LlmClient>>, max_context_turns: usize) -> Self {
        Self {
            llm,
            segmenter: Segmenter::new(),
            max_context_turns,
        }
    }

    /// 规划多步请求：启发式优先，0 步时走兜底服务
    pub async fn plan(
        &self,
        text: &str,
        directory: &ToolDirectory,
        prior_context: &[Message],
    ) -> Result<WorkflowPlan, PlanningError> {
        let plan = self.plan_heuristic(text, directory);
        if !plan.is_empty() {
            tracing::info!(steps = plan.total_steps, tools = ?plan.tool_names(), "heuristic plan ready");
            return Ok(plan);
        }
        self.plan_with_service(text, directory, prior_context).await
    }

    /// 单工具请求：以全文为子句解析出一个工具；解析不到时退回通用规划并只保留第一步
    pub async fn plan_single(
        &self,
        text: &str,
        directory: &ToolDirectory,
        prior_context: &[Message],
    ) -> Result<WorkflowPlan, PlanningError> {
        let index = ScoringIndex::new(directory);
        if let Some(best) = index.best(text) {
            let clause = ResolvedClause {
                tool: best.tool,
                text: text.trim().to_string(),
            };
            return Ok(build_heuristic_plan(&[clause], directory));
        }
        Ok(self.plan(text, directory, prior_context).await?.truncated(1))
    }

    /// 纯启发式规划，不调用任何外部服务；无法识别时返回空计划
    pub fn plan_heuristic(&self, text: &str, directory: &ToolDirectory) -> WorkflowPlan {
        let segmentation = self.segmenter.segment(text);
        if segmentation.clauses.is_empty() || directory.is_empty() {
            return WorkflowPlan::empty(PlanSource::Heuristic);
        }

        let index = ScoringIndex::new(directory);
        let mut resolved: Vec<ResolvedClause> = Vec::new();
        // 出现在第一个可解析子句之前的未解析文本，等待并入下一个子句
        let mut leading: Option<String> = None;

        for clause in &segmentation.clauses {
            match index.best(&clause.text) {
                Some(best) => {
                    let text = match leading.take() {
                        Some(prefix) => rejoin(&prefix, clause.boundary.as_deref(), &clause.text),
                        None => clause.text.clone(),
                    };
                    match resolved.last_mut() {
                        // 相邻同工具合并
                        Some(last) if last.tool == best.tool => {
                            last.text = rejoin(&last.text, clause.boundary.as_deref(), &text);
                        }
                        _ => resolved.push(ResolvedClause {
                            tool: best.tool,
                            text,
                        }),
                    }
                }
                None => match resolved.last_mut() {
                    Some(last) => {
                        last.text = rejoin(&last.text, clause.boundary.as_deref(), &clause.text);
                    }
                    None => {
                        leading = Some(match leading.take() {
                            Some(prefix) => {
                                rejoin(&prefix, clause.boundary.as_deref(), &clause.text)
                            }
                            None => clause.text.clone(),
                        });
                    }
                },
            }
        }

        build_heuristic_plan(&resolved, directory)
    }

    async fn plan_with_service(
        &self,
        text: &str,
        directory: &ToolDirectory,
        prior_context: &[Message],
    ) -> Result<WorkflowPlan, PlanningError> {
        let Some(llm) = &self.llm else {
            tracing::info!("heuristic produced no steps and the planning service is disabled");
            return Ok(WorkflowPlan::empty(PlanSource::Fallback));
        };

        let window = ConversationWindow::new(prior_context, self.max_context_turns);
        let messages = fallback::plan_messages(text, directory, window);
        let answer = llm.complete(&messages).await.map_err(|e| {
            tracing::warn!(error = %e, "planning service unreachable");
            PlanningError::FallbackUnavailable(e.to_string())
        })?;

        let raw = fallback::parse_plan_answer(&answer, directory);
        if raw.is_empty() {
            tracing::warn!("planning service answer contained no usable steps");
            return Ok(WorkflowPlan::empty(PlanSource::Fallback));
        }

        let plan = build_fallback_plan(&raw, directory)?;
        tracing::info!(steps = plan.total_steps, tools = ?plan.tool_names(), "fallback plan ready");
        Ok(plan)
    }
}

/// 工具的默认参数模板
fn default_template(tool: &str, clause: &str) -> Parameters {
    let mut params = Parameters::new();
    params.insert(catalog::primary_param(tool).to_string(), clause.to_string());
    if catalog::uses_document(tool) {
        params.insert(catalog::DOCUMENT_PARAM.to_string(), template::DOCUMENT.to_string());
    }
    params
}

/// 最近的、产物可被 consumer 消费的更早步骤；同距离按消费优先级
fn find_producer(tools: &[String], consumer: usize) -> Option<usize> {
    let consumer_tool = &tools[consumer - 1];
    (1..consumer)
        .rev()
        .filter_map(|p| catalog::consumes_from(consumer_tool, &tools[p - 1]).map(|rank| (p, rank)))
        .min_by_key(|(p, rank)| (consumer - p, *rank))
        .map(|(p, _)| p)
}

fn wire_producers(builder: &mut PlanBuilder) {
    let tools: Vec<String> = builder.steps().iter().map(|s| s.tool_name.clone()).collect();
    for consumer in 2..=tools.len() {
        if builder.steps()[consumer - 1].input_from.is_some() {
            continue;
        }
        if let Some(producer) = find_producer(&tools, consumer) {
            builder.connect(consumer, producer);
        }
    }
}

/// 已连接 input_from 但模板未引用 {{input}} 的步骤补上 context 参数
fn ensure_input_param(builder: &mut PlanBuilder) {
    let wired: Vec<usize> = builder
        .steps()
        .iter()
        .filter(|s| s.input_from.is_some() && !template::references(&s.parameter_template, template::INPUT))
        .map(|s| s.ordinal)
        .collect();
    for ordinal in wired {
        if let Some(params) = builder.template_mut(ordinal) {
            params.insert(catalog::CONTEXT_PARAM.to_string(), template::INPUT.to_string());
        }
    }
}

fn build_heuristic_plan(clauses: &[ResolvedClause], directory: &ToolDirectory) -> WorkflowPlan {
    let mut builder = PlanBuilder::new(PlanSource::Heuristic);
    for clause in clauses {
        builder.push(clause.tool.clone(), default_template(&clause.tool, &clause.text));
    }
    wire_producers(&mut builder);
    ensure_input_param(&mut builder);

    // 工具均来自目录、连接只指向更早步骤，校验失败意味着内部逻辑错误
    builder.build(directory).unwrap_or_else(|e| {
        tracing::error!(error = %e, "heuristic plan failed validation");
        WorkflowPlan::empty(PlanSource::Heuristic)
    })
}

fn build_fallback_plan(raw: &[RawStep], directory: &ToolDirectory) -> Result<WorkflowPlan, PlanningError> {
    let mut builder = PlanBuilder::new(PlanSource::Fallback);
    let mut references: Vec<(usize, String)> = Vec::new();

    for step in raw {
        let params = if step.parameters.is_empty() {
            default_template(&step.tool, template::USER_TEXT)
        } else {
            step.parameters.clone()
        };
        let ordinal = builder.push(step.tool.clone(), params);
        if let Some(reference) = &step.input_from {
            references.push((ordinal, reference.clone()));
        }
    }

    for (consumer, reference) in references {
        match resolve_reference(&builder, consumer, &reference) {
            Some(producer) => {
                builder.connect(consumer, producer);
            }
            None => tracing::warn!(
                step = consumer,
                reference = %reference,
                "dropping input_from that does not name an earlier step"
            ),
        }
    }
    wire_producers(&mut builder);
    ensure_input_param(&mut builder);

    Ok(builder.build(directory)?)
}

/// 解析兜底服务给出的引用：output_key、`step_N`、`N`，或更早步骤的工具名
fn resolve_reference(builder: &PlanBuilder, consumer: usize, reference: &str) -> Option<usize> {
    let earlier = &builder.steps()[..consumer - 1];
    if let Some(step) = earlier.iter().find(|s| s.output_key == reference) {
        return Some(step.ordinal);
    }
    let digits = reference
        .trim()
        .trim_start_matches("step")
        .trim_start_matches(['_', ' ', '-']);
    let digits: String = digits.chars().take_while(|c| c.is_ascii_digit()).collect();
    if let Ok(n) = digits.parse::<usize>() {
        return (n >= 1 && n < consumer).then_some(n);
    }
    earlier
        .iter()
        .rev()
        .find(|s| s.tool_name == reference)
        .map(|s| s.ordinal)
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

    fn planner() -> WorkflowPlanner {
        WorkflowPlanner::new(Some(Arc::new(MockLlmClient::failing())), 5)
    }

    #[test]
    fn test_prior_art_then_drafting() {
        let plan = planner().plan_heuristic("prior art search 5g ai, draft 2 claims", &directory());
        assert_eq!(plan.tool_names(), vec!["prior_art_search_tool", "claim_drafting_tool"]);
        assert_eq!(plan.total_steps, 2);
        assert_eq!(plan.steps[0].parameter_template["query"], "prior art search 5g ai");
        assert_eq!(plan.steps[1].parameter_template["user_query"], "draft 2 claims");
        assert_eq!(plan.steps[1].input_from.as_deref(), Some("step_1_prior_art_search"));
        assert_eq!(plan.steps[1].parameter_template["context"], "{{input}}");
    }

    #[test]
    fn test_web_then_prior_art_has_no_wiring() {
        let plan = planner().plan_heuristic("web search ramy atawia then prior art search", &directory());
        assert_eq!(plan.tool_names(), vec!["web_search_tool", "prior_art_search_tool"]);
        assert!(plan.steps.iter().all(|s| s.input_from.is_none()));
    }

    #[test]
    fn test_unresolved_clause_rejoins_previous_step() {
        let plan = planner().plan_heuristic("prior art search for ai and 5g, then draft claims", &directory());
        assert_eq!(plan.total_steps, 2);
        assert_eq!(plan.steps[0].parameter_template["query"], "prior art search for ai and 5g");
    }

    #[test]
    fn test_leading_unresolved_clause_prefixes_next() {
        let plan = planner().plan_heuristic("for my drone patent, draft 3 claims", &directory());
        assert_eq!(plan.tool_names(), vec!["claim_drafting_tool"]);
        assert_eq!(
            plan.steps[0].parameter_template["user_query"],
            "for my drone patent, draft 3 claims"
        );
    }

    #[test]
    fn test_consecutive_same_tool_collapses() {
        let plan = planner().plan_heuristic("draft claims and draft more claims", &directory());
        assert_eq!(plan.total_steps, 1);
        assert_eq!(
            plan.steps[0].parameter_template["user_query"],
            "draft claims and draft more claims"
        );
    }

    #[test]
    fn test_non_consecutive_same_tool_kept() {
        let plan = planner().plan_heuristic(
            "web search drones, prior art search drones, web search batteries",
            &directory(),
        );
        assert_eq!(
            plan.tool_names(),
            vec!["web_search_tool", "prior_art_search_tool", "web_search_tool"]
        );
        assert_eq!(plan.steps[2].output_key, "step_3_web_search");
    }

    #[test]
    fn test_heuristic_is_deterministic() {
        let p = planner();
        let text = "web search ramy atawia then prior art search, draft 2 claims";
        let a = serde_json::to_string(&p.plan_heuristic(text, &directory())).unwrap();
        let b = serde_json::to_string(&p.plan_heuristic(text, &directory())).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_drafting_prefers_nearest_producer() {
        let plan = planner().plan_heuristic(
            "prior art search drones then web search drones then draft claims",
            &directory(),
        );
        assert_eq!(plan.steps[2].input_from.as_deref(), Some("step_2_web_search"));
    }

    #[tokio::test]
    async fn test_plan_single_uses_whole_text() {
        let plan = planner()
            .plan_single("prior art search for 5g technology", &directory(), &[])
            .await
            .unwrap();
        assert_eq!(plan.total_steps, 1);
        assert_eq!(plan.steps[0].tool_name, "prior_art_search_tool");
        assert_eq!(plan.steps[0].parameter_template["query"], "prior art search for 5g technology");
    }

    #[tokio::test]
    async fn test_empty_heuristic_with_unreachable_service_fails() {
        let result = planner().plan("zzz qqq", &directory(), &[]).await;
        assert!(matches!(result, Err(PlanningError::FallbackUnavailable(_))));
    }

    #[tokio::test]
    async fn test_fallback_plan_parsed_and_wired() {
        let llm = Arc::new(MockLlmClient::with_responses([
            r#"{"steps": [{"tool": "web_search_tool", "parameters": {"query": "{{user_text}}"}},
                          {"tool": "claim_drafting_tool", "input_from": "step_1"}]}"#,
        ]));
        let p = WorkflowPlanner::new(Some(llm.clone()), 5);
        let history = vec![Message::user("we build drones")];
        let plan = p.plan("do the usual thing for me", &directory(), &history).await.unwrap();

        assert_eq!(plan.source, PlanSource::Fallback);
        assert_eq!(plan.tool_names(), vec!["web_search_tool", "claim_drafting_tool"]);
        assert_eq!(plan.steps[1].input_from.as_deref(), Some("step_1_web_search"));
        assert_eq!(plan.steps[1].parameter_template["user_query"], "{{user_text}}");
        assert_eq!(plan.steps[1].parameter_template["context"], "{{input}}");

        let prompt = llm.last_call().unwrap();
        assert!(prompt[1].content.contains("user: we build drones"));
    }

    #[tokio::test]
    async fn test_fallback_garbage_yields_empty_plan() {
        let llm = Arc::new(MockLlmClient::with_responses(["no idea, sorry"]));
        let p = WorkflowPlanner::new(Some(llm), 5);
        let plan = p.plan("zzz qqq", &directory(), &[]).await.unwrap();
        assert!(plan.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_forward_reference_dropped() {
        let llm = Arc::new(MockLlmClient::with_responses([
            r#"[{"tool": "web_search_tool", "input_from": "step_2"}, {"tool": "prior_art_search_tool"}]"#,
        ]));
        let p = WorkflowPlanner::new(Some(llm), 5);
        let plan = p.plan("zzz qqq", &directory(), &[]).await.unwrap();
        assert_eq!(plan.total_steps, 2);
        assert!(plan.validate().is_ok());
        assert!(plan.steps[0].input_from.is_none());
    }

    #[tokio::test]
    async fn test_disabled_service_yields_empty_plan() {
        let p = WorkflowPlanner::new(None, 5);
        let plan = p.plan("zzz qqq", &directory(), &[]).await.unwrap();
        assert!(plan.is_empty());
    }
}
