pub mod backend;
pub mod catalog;
pub mod directory;
pub mod echo;
pub mod executor;
pub mod http;
pub mod registry;
pub mod schema;

pub use backend::{Parameters, ToolBackend, ToolError, ToolResponse, ToolStatus};
pub use directory::{ToolDirectory, ToolSpec};
pub use echo::EchoTool;
pub use executor::ToolExecutor;
pub use http::HttpToolBackend;
pub use registry::{Tool, ToolRegistry};
pub use schema::plan_schema_json;
