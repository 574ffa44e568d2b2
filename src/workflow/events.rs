//! 进度事件：编排器为唯一生产者，交付层为唯一消费者
//!
//! 每个请求一条无界 mpsc 通道。序号在发送端单调递增（从 1 开始），终止事件
//! （workflow_complete / workflow_error）至多发送一次，之后的事件一律丢弃。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::workflow::types::Intent;

/// 聚合结果的结构化元数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub total_steps: usize,
    pub failed_steps: usize,
    /// 因取消而未执行的步骤数
    #[serde(default)]
    pub skipped_steps: usize,
    pub tools_used: Vec<String>,
}

/// 事件类型与载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "data", rename_all = "snake_case")]
pub enum ProgressKind {
    IntentDetected {
        intent: Intent,
    },
    PlanReady {
        total_steps: usize,
        tools: Vec<String>,
    },
    StepStarted {
        ordinal: usize,
        tool_name: String,
    },
    StepFinished {
        ordinal: usize,
        tool_name: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    WorkflowComplete {
        final_response: String,
        metadata: ResponseMetadata,
    },
    WorkflowError {
        message: String,
    },
}

impl ProgressKind {
    pub fn event_type(&self) -> &'static str {
        match self {
            ProgressKind::IntentDetected { .. } => "intent_detected",
            ProgressKind::PlanReady { .. } => "plan_ready",
            ProgressKind::StepStarted { .. } => "step_started",
            ProgressKind::StepFinished { .. } => "step_finished",
            ProgressKind::WorkflowComplete { .. } => "workflow_complete",
            ProgressKind::WorkflowError { .. } => "workflow_error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressKind::WorkflowComplete { .. } | ProgressKind::WorkflowError { .. }
        )
    }
}

/// 线上格式：`{"event_type", "data", "sequence_number", "timestamp_ms"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(flatten)]
    pub kind: ProgressKind,
    pub sequence_number: u64,
    pub timestamp_ms: i64,
}

impl ProgressEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// 事件发送端
pub struct ProgressEmitter {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
    sequence: AtomicU64,
    finished: AtomicBool,
}

impl ProgressEmitter {
    /// 不投递任何事件的发送端（同步调用 `handle` 时使用）
    pub fn noop() -> Self {
        Self {
            tx: None,
            sequence: AtomicU64::new(0),
            finished: AtomicBool::new(false),
        }
    }

    fn emit(&self, kind: ProgressKind) {
        if kind.is_terminal() {
            if self.finished.swap(true, Ordering::SeqCst) {
                tracing::warn!(event_type = kind.event_type(), "dropping event after terminal event");
                return;
            }
        } else if self.finished.load(Ordering::SeqCst) {
            tracing::warn!(event_type = kind.event_type(), "dropping event after terminal event");
            return;
        }

        let sequence_number = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(event_type = kind.event_type(), sequence_number, "progress");
        let Some(tx) = &self.tx else {
            return;
        };
        let event = ProgressEvent {
            kind,
            sequence_number,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        };
        if tx.send(event).is_err() {
            tracing::debug!("progress consumer dropped");
        }
    }

    pub fn intent_detected(&self, intent: Intent) {
        self.emit(ProgressKind::IntentDetected { intent });
    }

    pub fn plan_ready(&self, total_steps: usize, tools: Vec<String>) {
        self.emit(ProgressKind::PlanReady { total_steps, tools });
    }

    pub fn step_started(&self, ordinal: usize, tool_name: &str) {
        self.emit(ProgressKind::StepStarted {
            ordinal,
            tool_name: tool_name.to_string(),
        });
    }

    pub fn step_finished(&self, ordinal: usize, tool_name: &str, success: bool, error: Option<String>) {
        self.emit(ProgressKind::StepFinished {
            ordinal,
            tool_name: tool_name.to_string(),
            success,
            error,
        });
    }

    pub fn workflow_complete(&self, final_response: &str, metadata: ResponseMetadata) {
        self.emit(ProgressKind::WorkflowComplete {
            final_response: final_response.to_string(),
            metadata,
        });
    }

    pub fn workflow_error(&self, message: impl Into<String>) {
        self.emit(ProgressKind::WorkflowError {
            message: message.into(),
        });
    }

    /// 已发送（或跳过投递）的事件数
    pub fn emitted(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

/// 事件接收端（不可克隆，每个请求只有一个消费者）
pub struct ProgressReceiver {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl ProgressReceiver {
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// 取出已缓冲的全部事件（不等待）
    pub fn drain(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// 等待发送端关闭并收集全部事件
    pub async fn collect(mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }

    /// 转为 Stream，供 SSE 等流式交付使用
    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        futures_util::stream::unfold(self.rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }
}

/// 创建一对发送端 / 接收端
pub fn progress_channel() -> (ProgressEmitter, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ProgressEmitter {
            tx: Some(tx),
            sequence: AtomicU64::new(0),
            finished: AtomicBool::new(false),
        },
        ProgressReceiver { rx },
    )
}
