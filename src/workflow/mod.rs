//! 工作流层：意图识别、计划拆解、逐步执行、结果聚合与进度事件

pub mod aggregator;
pub mod builder;
pub mod classifier;
pub mod events;
pub mod executor;
pub mod fallback;
pub mod planner;
pub mod responder;
pub mod scoring;
pub mod segmenter;
pub mod template;
pub mod types;

pub use aggregator::ResponseAggregator;
pub use builder::{output_key_for, PlanBuilder};
pub use classifier::{IntentClassifier, Verdict};
pub use events::{
    progress_channel, ProgressEmitter, ProgressEvent, ProgressKind, ProgressReceiver, ResponseMetadata,
};
pub use executor::{ExecutionReport, StepExecutor};
pub use planner::WorkflowPlanner;
pub use responder::ConversationResponder;
pub use segmenter::{Clause, Segmentation, Segmenter};
pub use types::*;
