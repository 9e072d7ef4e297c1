//! Public façade for the resolution layer.

pub mod orchestrator;
pub mod retry;
pub mod types;

pub use orchestrator::RetryOrchestrator;
pub use retry::RetryPolicy;
pub use types::{LineSource, Resolution, RetryState, SourceCounts};
