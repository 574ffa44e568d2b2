//! 结果聚合
//!
//! 按计划顺序为每一步生成一个带标题的段落，段落之间以分隔线相连。单步计划走同一条路径，
//! 因此单工具请求的回复与多步回复的第一段结构一致。

use crate::workflow::events::ResponseMetadata;
use crate::workflow::types::{StepResult, WorkflowPlan};

pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";
const EMPTY_OUTPUT: &str = "(no output)";
const NOT_EXECUTED: &str = "(not executed: the workflow was cancelled before this step)";

/// 结果聚合器
#[derive(Debug, Clone)]
pub struct ResponseAggregator {
    max_section_chars: usize,
}

impl Default for ResponseAggregator {
    fn default() -> Self {
        Self::new(8000)
    }
}

impl ResponseAggregator {
    pub fn new(max_section_chars: usize) -> Self {
        Self {
            max_section_chars: max_section_chars.max(1),
        }
    }

    /// 合并各步结果，返回 (最终回复, 元数据)
    pub fn aggregate(&self, plan: &WorkflowPlan, step_results: &[StepResult]) -> (String, ResponseMetadata) {
        let mut metadata = ResponseMetadata {
            total_steps: plan.total_steps,
            tools_used: plan.tool_names(),
            ..Default::default()
        };

        let sections: Vec<String> = plan
            .steps
            .iter()
            .map(|step| {
                let body = match step_results.iter().find(|r| r.ordinal == step.ordinal) {
                    Some(result) if result.success => {
                        let text = result.output_text();
                        if text.trim().is_empty() {
                            EMPTY_OUTPUT.to_string()
                        } else {
                            self.truncate(text.trim())
                        }
                    }
                    Some(result) => {
                        metadata.failed_steps += 1;
                        error_note(&step.tool_name, result.error.as_deref())
                    }
                    None => {
                        metadata.skipped_steps += 1;
                        NOT_EXECUTED.to_string()
                    }
                };
                format!("**Step {}: {}**\n{}", step.ordinal, step.tool_name, body)
            })
            .collect();

        (sections.join(SECTION_SEPARATOR), metadata)
    }

    fn truncate(&self, text: &str) -> String {
        if text.chars().count() <= self.max_section_chars {
            return text.to_string();
        }
        let kept: String = text.chars().take(self.max_section_chars).collect();
        format!("{kept}\n...(truncated)")
    }
}

fn error_note(tool_name: &str, error: Option<&str>) -> String {
    match error.filter(|e| !e.trim().is_empty()) {
        Some(e) => format!("Sorry, the {tool_name} step could not be completed: {e}"),
        None => format!("Sorry, the {tool_name} step could not be completed."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Parameters, ToolDirectory, ToolSpec};
    use crate::workflow::builder::PlanBuilder;
    use crate::workflow::types::PlanSource;
    use serde_json::json;

    fn plan(tools: &[&str]) -> WorkflowPlan {
        let directory: ToolDirectory = tools.iter().map(|t| ToolSpec::new(*t, "")).collect();
        let mut builder = PlanBuilder::new(PlanSource::Heuristic);
        for t in tools {
            builder.push(*t, Parameters::new());
        }
        builder.build(&directory).unwrap()
    }

    #[test]
    fn test_partial_failure_keeps_both_sections() {
        let plan = plan(&["a_tool", "b_tool"]);
        let results = vec![
            StepResult::failed(1, "a_tool", "backend said no"),
            StepResult::succeeded(2, "b_tool", json!("B result")),
        ];
        let (text, meta) = ResponseAggregator::default().aggregate(&plan, &results);

        assert!(text.contains("Sorry, the a_tool step could not be completed: backend said no"));
        assert!(text.contains("B result"));
        assert!(text.find("**Step 1: a_tool**").unwrap() < text.find("**Step 2: b_tool**").unwrap());
        assert_eq!(meta.total_steps, 2);
        assert_eq!(meta.failed_steps, 1);
        assert_eq!(meta.tools_used, vec!["a_tool", "b_tool"]);
    }

    #[test]
    fn test_single_step_matches_first_section_of_multi_step() {
        let single = plan(&["a_tool"]);
        let multi = plan(&["a_tool", "b_tool"]);
        let a = StepResult::succeeded(1, "a_tool", json!({"content": "found 3 patents"}));
        let b = StepResult::succeeded(2, "b_tool", json!("x"));

        let agg = ResponseAggregator::default();
        let (one, _) = agg.aggregate(&single, &[a.clone()]);
        let (many, _) = agg.aggregate(&multi, &[a, b]);
        assert_eq!(one, "**Step 1: a_tool**\nfound 3 patents");
        assert_eq!(many.split(SECTION_SEPARATOR).next(), Some(one.as_str()));
    }

    #[test]
    fn test_empty_output_and_missing_results() {
        let plan = plan(&["a_tool", "b_tool"]);
        let results = vec![StepResult::succeeded(1, "a_tool", json!(""))];
        let (text, meta) = ResponseAggregator::default().aggregate(&plan, &results);
        assert!(text.contains(EMPTY_OUTPUT));
        assert!(text.contains("not executed"));
        assert_eq!(meta.skipped_steps, 1);
        assert_eq!(meta.failed_steps, 0);
    }

    #[test]
    fn test_long_section_truncated() {
        let plan = plan(&["a_tool"]);
        let results = vec![StepResult::succeeded(1, "a_tool", json!("x".repeat(50)))];
        let (text, _) = ResponseAggregator::new(10).aggregate(&plan, &results);
        assert!(text.ends_with("xxxxxxxxxx\n...(truncated)"));
    }
}
