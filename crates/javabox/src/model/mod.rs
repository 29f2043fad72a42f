pub mod ids;
pub mod result;

pub use ids::SandboxId;
pub use result::{ExecutionResult, ExecutionStatus, TIMEOUT_MESSAGE};
