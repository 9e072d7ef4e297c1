//! # Remote line generation
//!
//! Talks to a chat-completion style endpoint that turns a fixed persona
//! prompt into one short NPC reaction.
//!
//! ```text
//! GenerationRequest → send.rs (POST + auth) → receive.rs (extract content) → line
//! ```
//!
//! Queues only see the [`RemoteGenerator`] trait, so tests and alternative
//! backends can stand in for the HTTP client.

pub mod prompts;
pub mod receive;
pub mod send;

pub use prompts::GenerationRequest;
pub use send::ChatCompletionClient;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("Request timeout - the API took too long to respond")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed - check your API key")]
    Unauthorized,

    #[error("Rate limit exceeded - too many requests")]
    RateLimited,

    #[error("HTTP error {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Failed to parse API response: {0}")]
    Parse(String),

    #[error("API returned no choices")]
    MissingChoice,

    #[error("API returned empty content")]
    EmptyContent,
}

impl GenerationError {
    /// Whether the failure came from the response body rather than the transport.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            GenerationError::Parse(_) | GenerationError::MissingChoice | GenerationError::EmptyContent
        )
    }
}

impl From<serde_json::Error> for GenerationError {
    fn from(err: serde_json::Error) -> Self {
        GenerationError::Parse(err.to_string())
    }
}

/// Source of freshly generated dialogue.
///
/// Implementations return the trimmed text of a single line. Failures are
/// reported, never panicked on; callers decide whether to log and move on.
#[async_trait]
pub trait RemoteGenerator: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "remote"
    }

    async fn generate(&self) -> Result<String, GenerationError>;
}
