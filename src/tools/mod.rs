pub mod context;
pub mod runner;

pub use context::ToolExecutionContext;
pub use runner::{ToolRunner, ToolRunnerConfig};
