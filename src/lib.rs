//! Dialogue availability for ambient NPCs.
//!
//! An NPC bumped by the player should answer right away with a short line.
//! Lines come from a remote text generator that is slow and sometimes down,
//! so they are buffered ahead of time:
//!
//! * a [`dialogue::BackupReserve`] preloaded at startup,
//! * a primary [`dialogue::DialogueQueue`] kept above its low-water mark,
//! * a bounded live poll of the primary queue,
//! * a [`dialogue::StaticFallbackPool`] that always answers.
//!
//! [`NpcReactor`] ties these together behind a cooldown gate and a display
//! timer.

pub mod config;
pub mod dialogue;
pub mod engine;
pub mod interaction;
pub mod llm;
pub mod reactor;

pub use config::{Config, ConfigError};
pub use dialogue::{BackupReserve, DialogueLine, DialogueQueue, StaticFallbackPool, TaskRegistry};
pub use engine::{LineSource, Resolution, RetryOrchestrator, RetryPolicy};
pub use interaction::{DisplaySurface, GatePhase, TracingDisplay};
pub use llm::{ChatCompletionClient, GenerationError, RemoteGenerator};
pub use reactor::{Diagnostics, NpcReactor};

use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber filtered by `RUST_LOG` (default `banter=info`).
/// Calling it again, or after another subscriber was set, is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("banter=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Checks that the generator credentials are present in the environment.
pub fn validate_environment() -> Result<(), ConfigError> {
    let missing: Vec<String> = config::REQUIRED_ENV_VARS
        .iter()
        .filter(|var| std::env::var(var).is_err())
        .map(|var| var.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::MissingEnv(missing))
    }
}
