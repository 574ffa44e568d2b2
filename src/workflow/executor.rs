//! 步骤执行器
//!
//! 严格按 ordinal 顺序逐步执行：渲染参数模板 → 调用工具后端 → 记录结果。
//! 单步失败（错误状态、后端故障、超时）只记入该步结果，随后继续执行下一步。
//! 每步开始前检查取消令牌；已取消时剩余步骤不再执行。

use tokio_util::sync::CancellationToken;

use crate::core::WorkflowState;
use crate::tools::ToolExecutor;
use crate::workflow::events::ProgressEmitter;
use crate::workflow::template::{self, TemplateContext};
use crate::workflow::types::{Step, StepResult, WorkflowPlan};

/// 一次执行的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub attempted: usize,
    pub failed: usize,
    /// 因后端不可达而失败的步骤数
    pub unavailable: usize,
    pub cancelled: bool,
}

impl ExecutionReport {
    /// 每一步都因后端不可达而失败
    pub fn backend_unavailable(&self) -> bool {
        self.attempted > 0 && self.unavailable == self.attempted
    }
}

/// 步骤执行器
#[derive(Clone)]
pub struct StepExecutor {
    tools: ToolExecutor,
}

impl StepExecutor {
    pub fn new(tools: ToolExecutor) -> Self {
        Self { tools }
    }

    /// 执行 state 中的计划；无计划时直接返回空报告
    pub async fn execute(
        &self,
        state: &mut WorkflowState,
        emitter: &ProgressEmitter,
        cancel: &CancellationToken,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        let Some(plan) = state.plan.take() else {
            return report;
        };
        tracing::debug!(steps = plan.len(), timeout = ?self.tools.timeout(), "executing plan");

        for step in &plan.steps {
            if cancel.is_cancelled() {
                tracing::info!(ordinal = step.ordinal, "workflow cancelled before step");
                report.cancelled = true;
                break;
            }

            emitter.step_started(step.ordinal, &step.tool_name);
            let input = resolve_input(state, &plan, step);
            let params = template::render(
                &step.parameter_template,
                &TemplateContext {
                    user_text: &state.request.text,
                    document: &state.request.document_context,
                    input: input.as_deref(),
                },
            );

            let result = match self.tools.execute(&step.tool_name, &params).await {
                Ok(output) => StepResult::succeeded(step.ordinal, &step.tool_name, output),
                Err(e) => {
                    tracing::warn!(ordinal = step.ordinal, tool = %step.tool_name, error = %e, "step failed");
                    report.failed += 1;
                    if e.is_unavailable() {
                        report.unavailable += 1;
                    }
                    StepResult::failed(step.ordinal, &step.tool_name, e.to_string())
                }
            };

            emitter.step_finished(step.ordinal, &step.tool_name, result.success, result.error.clone());
            state.record(result);
            state.current_step += 1;
            report.attempted += 1;
        }

        state.plan = Some(plan);
        report
    }
}

/// input_from 所指步骤输出的文本；该步失败或尚无结果时为空串
fn resolve_input(state: &WorkflowState, plan: &WorkflowPlan, step: &Step) -> Option<String> {
    let key = step.input_from.as_deref()?;
    let producer = plan.step_by_output_key(key)?;
    Some(
        state
            .result(producer.ordinal)
            .filter(|r| r.success)
            .map(StepResult::output_text)
            .unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::core::WorkflowRequest;
    use crate::tools::{Parameters, Tool, ToolDirectory, ToolRegistry, ToolSpec};
    use crate::workflow::builder::PlanBuilder;
    use crate::workflow::events::progress_channel;
    use crate::workflow::types::PlanSource;

    struct Fixed {
        name: &'static str,
        reply: Result<&'static str, &'static str>,
    }

    #[async_trait]
    impl Tool for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            ""
        }

        async fn execute(&self, params: &Parameters) -> Result<Value, String> {
            match self.reply {
                Ok(text) => Ok(json!(format!("{text} [{}]", params.get("context").cloned().unwrap_or_default()))),
                Err(e) => Err(e.to_string()),
            }
        }
    }

    fn setup(a: Result<&'static str, &'static str>) -> (StepExecutor, WorkflowState) {
        let mut registry = ToolRegistry::new();
        registry.register(Fixed { name: "a_tool", reply: a });
        registry.register(Fixed { name: "b_tool", reply: Ok("b out") });
        let directory = ToolDirectory::new(vec![ToolSpec::new("a_tool", ""), ToolSpec::new("b_tool", "")]);

        let mut wired = Parameters::new();
        wired.insert("context".to_string(), template::INPUT.to_string());
        let plan = PlanBuilder::new(PlanSource::Heuristic)
            .step("a_tool", Parameters::new())
            .step("b_tool", wired)
            .depends_on(2, 1)
            .build(&directory)
            .unwrap();

        let mut state = WorkflowState::new(WorkflowRequest::new("go", directory));
        state.plan = Some(plan);
        let executor = StepExecutor::new(ToolExecutor::new(Arc::new(registry), 5));
        (executor, state)
    }

    #[tokio::test]
    async fn test_output_flows_into_next_step() {
        let (executor, mut state) = setup(Ok("a out"));
        let report = executor
            .execute(&mut state, &ProgressEmitter::noop(), &CancellationToken::new())
            .await;
        assert_eq!(report.attempted, 2);
        assert_eq!(state.current_step, 2);
        assert_eq!(state.result(2).unwrap().output, json!("b out [a out []]"));
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_steps() {
        let (executor, mut state) = setup(Err("quota exceeded"));
        let (emitter, mut rx) = progress_channel();
        let report = executor.execute(&mut state, &emitter, &CancellationToken::new()).await;

        assert_eq!(report.failed, 1);
        assert!(!report.backend_unavailable());
        assert!(!state.result(1).unwrap().success);
        assert!(state.result(1).unwrap().error.as_deref().unwrap().contains("quota exceeded"));
        // 失败步骤的输出以空串代入，context 参数被省略
        assert_eq!(state.result(2).unwrap().output, json!("b out []"));

        let types: Vec<&str> = rx.drain().iter().map(|e| e.kind.event_type()).collect();
        assert_eq!(types, vec!["step_started", "step_finished", "step_started", "step_finished"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let (executor, mut state) = setup(Ok("a out"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = executor.execute(&mut state, &ProgressEmitter::noop(), &cancel).await;
        assert!(report.cancelled);
        assert_eq!(report.attempted, 0);
        assert_eq!(state.step_results().count(), 0);
        assert!(state.plan.is_some());
    }
}
