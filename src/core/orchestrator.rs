//! 工作流编排器：主控流程
//!
//! request → 意图识别 →（单工具 / 多步）规划 → 逐步执行 → 聚合 → 最终回复，
//! 每个状态转换都通过 ProgressEmitter 发出事件。编排器本身无可变状态，可在请求间共享；
//! 每个请求的 WorkflowState 只在 run 内存在。

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::core::error::OrchestratorError;
use crate::core::state::{Outcome, WorkflowRequest, WorkflowResponse, WorkflowState};
use crate::workflow::{
    progress_channel, ConversationResponder, Intent, IntentClassifier, ProgressEmitter, ProgressReceiver,
    ResponseAggregator, ResponseMetadata, StepExecutor, WorkflowPlanner,
};

/// 一个在后台任务上运行的请求（作业边界）
pub struct WorkflowJob {
    pub handle: JoinHandle<WorkflowResponse>,
    /// 唯一的事件消费端
    pub events: ProgressReceiver,
    pub cancel: CancellationToken,
}

/// 工作流编排器
pub struct Orchestrator {
    classifier: IntentClassifier,
    planner: WorkflowPlanner,
    executor: StepExecutor,
    aggregator: ResponseAggregator,
    responder: ConversationResponder,
}

impl Orchestrator {
    pub fn new(
        classifier: IntentClassifier,
        planner: WorkflowPlanner,
        executor: StepExecutor,
        aggregator: ResponseAggregator,
        responder: ConversationResponder,
    ) -> Self {
        Self {
            classifier,
            planner,
            executor,
            aggregator,
            responder,
        }
    }

    /// 不订阅事件、不可取消地处理一个请求
    pub async fn handle(&self, request: WorkflowRequest) -> WorkflowResponse {
        self.run(request, &ProgressEmitter::noop(), &CancellationToken::new())
            .await
    }

    /// 在新的 tokio 任务上处理请求，返回句柄、事件接收端与取消令牌
    pub fn spawn(self: &Arc<Self>, request: WorkflowRequest) -> WorkflowJob {
        let (emitter, events) = progress_channel();
        let cancel = CancellationToken::new();
        let this = Arc::clone(self);
        let token = cancel.clone();
        let handle = tokio::spawn(async move { this.run(request, &emitter, &token).await });
        WorkflowJob {
            handle,
            events,
            cancel,
        }
    }

    /// 处理一个请求；任何失败都转为 workflow_error 事件与致歉回复，不会向调用方返回错误
    pub async fn run(
        &self,
        request: WorkflowRequest,
        emitter: &ProgressEmitter,
        cancel: &CancellationToken,
    ) -> WorkflowResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("workflow", request_id = %request_id);
        self.run_inner(request_id, WorkflowState::new(request), emitter, cancel)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        request_id: String,
        mut state: WorkflowState,
        emitter: &ProgressEmitter,
        cancel: &CancellationToken,
    ) -> WorkflowResponse {
        let text = state.request.text.clone();
        let directory = state.request.directory.clone();

        let intent = self.classifier.classify(&text, &directory).await;
        tracing::info!(%intent, tools = directory.len(), "intent detected");
        state.intent = Some(intent);
        emitter.intent_detected(intent);

        let planned = match intent {
            Intent::Conversation => return self.converse(request_id, state, emitter).await,
            Intent::SingleTool => {
                self.planner
                    .plan_single(&text, &directory, &state.request.history)
                    .await
            }
            Intent::MultiStep => self.planner.plan(&text, &directory, &state.request.history).await,
        };

        let plan = match planned {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(error = %e, "planning failed");
                return fail(request_id, state, emitter, OrchestratorError::from(e));
            }
        };
        if plan.is_empty() {
            tracing::info!("no executable steps, answering as conversation");
            state.intent = Some(Intent::Conversation);
            return self.converse(request_id, state, emitter).await;
        }

        emitter.plan_ready(plan.total_steps, plan.tool_names());
        state.plan = Some(plan);

        let report = self.executor.execute(&mut state, emitter, cancel).await;
        let Some(plan) = state.plan.clone() else {
            return fail(request_id, state, emitter, OrchestratorError::Cancelled);
        };
        let results: Vec<_> = state.step_results().cloned().collect();
        let (aggregated, metadata) = self.aggregator.aggregate(&plan, &results);
        let (prompt_tokens, completion_tokens, total_tokens) = self.responder.token_usage();
        tracing::info!(
            total_steps = metadata.total_steps,
            failed_steps = metadata.failed_steps,
            skipped_steps = metadata.skipped_steps,
            prompt_tokens,
            completion_tokens,
            total_tokens,
            "workflow finished"
        );

        let (final_response, outcome) = if report.cancelled {
            let err = OrchestratorError::Cancelled;
            emitter.workflow_error(err.to_string());
            (format!("{aggregated}\n\n{}", err.user_message()), Outcome::Cancelled)
        } else if report.backend_unavailable() {
            let err = OrchestratorError::BackendUnavailable(format!("{} of {} steps", report.unavailable, report.attempted));
            tracing::error!(error = %err, "every step failed to reach the tool backend");
            emitter.workflow_error(err.to_string());
            (err.user_message(), Outcome::Failed)
        } else {
            emitter.workflow_complete(&aggregated, metadata.clone());
            (aggregated, Outcome::Completed)
        };

        state.final_response = Some(final_response.clone());
        WorkflowResponse {
            request_id,
            final_response,
            intent: state.intent.unwrap_or(intent),
            metadata,
            plan: Some(plan),
            step_results: state.into_step_results(),
            outcome,
        }
    }

    async fn converse(
        &self,
        request_id: String,
        mut state: WorkflowState,
        emitter: &ProgressEmitter,
    ) -> WorkflowResponse {
        let reply = self
            .responder
            .respond(
                &state.request.text,
                &state.request.history,
                &state.request.document_context,
                &state.request.directory,
            )
            .await;
        let (prompt_tokens, completion_tokens, total_tokens) = self.responder.token_usage();
        tracing::info!(prompt_tokens, completion_tokens, total_tokens, "conversation answered");
        let metadata = ResponseMetadata::default();
        emitter.workflow_complete(&reply, metadata.clone());
        state.final_response = Some(reply.clone());

        WorkflowResponse {
            request_id,
            final_response: reply,
            intent: Intent::Conversation,
            metadata,
            step_results: Vec::new(),
            plan: None,
            outcome: Outcome::Completed,
        }
    }
}

fn fail(
    request_id: String,
    state: WorkflowState,
    emitter: &ProgressEmitter,
    err: OrchestratorError,
) -> WorkflowResponse {
    emitter.workflow_error(err.to_string());
    WorkflowResponse {
        request_id,
        final_response: err.user_message(),
        intent: state.intent.unwrap_or(Intent::Conversation),
        metadata: ResponseMetadata::default(),
        plan: state.plan.clone(),
        step_results: state.into_step_results(),
        outcome: Outcome::Failed,
    }
}
