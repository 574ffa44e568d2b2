//! 请求与运行状态
//!
//! WorkflowRequest 在一次调用内只读；WorkflowState 只在单个请求的生命周期内存在，
//! 由编排器独占修改。step_results 按 ordinal 存放，每个 ordinal 只写一次。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::memory::Message;
use crate::tools::ToolDirectory;
use crate::workflow::{Intent, ResponseMetadata, StepResult, WorkflowPlan};

/// 一次编排请求
#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    pub text: String,
    /// 之前的对话（从旧到新）
    pub history: Vec<Message>,
    pub document_context: String,
    pub directory: ToolDirectory,
}

impl WorkflowRequest {
    pub fn new(text: impl Into<String>, directory: ToolDirectory) -> Self {
        Self {
            text: text.into(),
            history: Vec::new(),
            document_context: String::new(),
            directory,
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document_context = document.into();
        self
    }
}

/// 单个请求的运行状态
#[derive(Debug)]
pub struct WorkflowState {
    pub request: WorkflowRequest,
    pub intent: Option<Intent>,
    pub plan: Option<WorkflowPlan>,
    /// 已尝试执行的步骤数
    pub current_step: usize,
    step_results: BTreeMap<usize, StepResult>,
    pub final_response: Option<String>,
}

impl WorkflowState {
    pub fn new(request: WorkflowRequest) -> Self {
        Self {
            request,
            intent: None,
            plan: None,
            current_step: 0,
            step_results: BTreeMap::new(),
            final_response: None,
        }
    }

    /// 记录某步结果；同一 ordinal 已有结果时拒绝覆盖并返回 false
    pub fn record(&mut self, result: StepResult) -> bool {
        if self.step_results.contains_key(&result.ordinal) {
            tracing::warn!(ordinal = result.ordinal, "step result already recorded");
            return false;
        }
        self.step_results.insert(result.ordinal, result);
        true
    }

    pub fn result(&self, ordinal: usize) -> Option<&StepResult> {
        self.step_results.get(&ordinal)
    }

    /// 按 ordinal 顺序
    pub fn step_results(&self) -> impl Iterator<Item = &StepResult> {
        self.step_results.values()
    }

    pub fn into_step_results(self) -> Vec<StepResult> {
        self.step_results.into_values().collect()
    }
}

/// 请求的结局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Cancelled,
    Failed,
}

/// 返回给调用方的结果
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResponse {
    pub request_id: String,
    pub final_response: String,
    pub intent: Intent,
    pub metadata: ResponseMetadata,
    pub step_results: Vec<StepResult>,
    pub plan: Option<WorkflowPlan>,
    pub outcome: Outcome,
}

impl WorkflowResponse {
    pub fn is_completed(&self) -> bool {
        self.outcome == Outcome::Completed
    }
}
