//! 核心编排层：错误、请求状态、编排器与构建器

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod state;

pub use builder::{create_llm_from_config, create_orchestrator_builder, OrchestratorBuilder};
pub use error::OrchestratorError;
pub use orchestrator::{Orchestrator, WorkflowJob};
pub use state::{Outcome, WorkflowRequest, WorkflowResponse, WorkflowState};
