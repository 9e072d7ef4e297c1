//! Runtime configuration for the dialogue subsystem.
//!
//! Every section has a `Default`, so a TOML file only needs the keys it wants
//! to override. Credentials usually come from the environment (or a `.env`
//! file) through [`Config::from_env`].

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::dialogue::fallback::DEFAULT_FALLBACK_LINES;
use crate::llm::prompts::{DEFAULT_SYSTEM_PROMPT, DEFAULT_USER_PROMPT};

/// Environment variables that must be present for live generation.
pub const REQUIRED_ENV_VARS: [&str; 3] = ["MODEL", "API_KEY", "API_URL"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    #[error("Invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub generator: GeneratorConfig,
    pub primary: PrimaryQueueConfig,
    pub reserve: ReserveConfig,
    pub retry: RetryConfig,
    pub gate: GateConfig,
    pub display: DisplayConfig,
    pub fallback: FallbackConfig,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub api_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_ms: u64,
    pub system_prompt: String,
    pub user_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryQueueConfig {
    /// A refill is requested while the queue holds fewer lines than this.
    pub low_water_mark: usize,
    /// Sequential fetches performed before the NPC reports ready.
    pub warm_up_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReserveConfig {
    pub preload_on_start: bool,
    pub preload_count: usize,
    pub settle_delay_ms: u64,
    pub inter_request_pause_ms: u64,
    pub refill_threshold: usize,
    pub refill_batch: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Attempts `1..=fast_attempts` wait `fast_delay_ms`, the rest `slow_delay_ms`.
    pub fast_attempts: u32,
    pub fast_delay_ms: u64,
    pub slow_delay_ms: u64,
    /// Attempt after which the interim placeholder is shown. `None` means the midpoint.
    pub interim_attempt: Option<u32>,
    pub interim_text: String,
    pub remote_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub cooldown_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub lines: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 125,
            temperature: 0.8,
            request_timeout_ms: 30_000,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_prompt: DEFAULT_USER_PROMPT.to_string(),
        }
    }
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish_non_exhaustive()
    }
}

impl Default for PrimaryQueueConfig {
    fn default() -> Self {
        Self {
            low_water_mark: 2,
            warm_up_count: 3,
        }
    }
}

impl Default for ReserveConfig {
    fn default() -> Self {
        Self {
            preload_on_start: true,
            preload_count: 10,
            settle_delay_ms: 2_000,
            inter_request_pause_ms: 1_000,
            refill_threshold: 3,
            refill_batch: 3,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            fast_attempts: 3,
            fast_delay_ms: 300,
            slow_delay_ms: 800,
            interim_attempt: None,
            interim_text: "Processing...".to_string(),
            remote_enabled: true,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self { cooldown_ms: 2_000 }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { duration_ms: 3_000 }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            lines: DEFAULT_FALLBACK_LINES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl GeneratorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl ReserveConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn inter_request_pause(&self) -> Duration {
        Duration::from_millis(self.inter_request_pause_ms)
    }
}

impl GateConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl DisplayConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = Self::from_toml_str(&raw)
            .with_context(|| format!("loading config file {}", path.display()))?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Defaults plus generator credentials from the environment.
    ///
    /// A `.env` file in the working directory is honoured. `MODEL`, `API_KEY`
    /// and `API_URL` are required; `MAX_TOKENS` and `TEMPERATURE` are optional.
    #[instrument]
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        crate::validate_environment()?;

        let mut config = Config::default();
        config.generator.model = env_var("MODEL")?;
        config.generator.api_key = env_var("API_KEY")?;
        config.generator.api_url = env_var("API_URL")?;

        if let Ok(raw) = std::env::var("MAX_TOKENS") {
            config.generator.max_tokens = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                field: "MAX_TOKENS",
                reason: format!("`{}` is not a positive integer", raw),
            })?;
        }
        if let Ok(raw) = std::env::var("TEMPERATURE") {
            config.generator.temperature = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                field: "TEMPERATURE",
                reason: format!("`{}` is not a number", raw),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let generator = &self.generator;
        url::Url::parse(&generator.api_url).map_err(|e| ConfigError::Invalid {
            field: "generator.api_url",
            reason: e.to_string(),
        })?;
        if generator.model.trim().is_empty() {
            return Err(invalid("generator.model", "model name cannot be empty"));
        }
        if !(0.0..=2.0).contains(&generator.temperature) {
            return Err(invalid("generator.temperature", "must be between 0.0 and 2.0"));
        }
        if generator.request_timeout_ms == 0 {
            return Err(invalid("generator.request_timeout_ms", "must be greater than zero"));
        }

        let retry = &self.retry;
        if retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "at least one attempt is required"));
        }
        if let Some(at) = retry.interim_attempt {
            if at == 0 || at > retry.max_attempts {
                return Err(invalid(
                    "retry.interim_attempt",
                    "must fall within 1..=max_attempts",
                ));
            }
        }

        if self.gate.cooldown_ms == 0 {
            return Err(invalid("gate.cooldown_ms", "must be greater than zero"));
        }
        if self.reserve.refill_batch == 0 {
            return Err(invalid("reserve.refill_batch", "must be greater than zero"));
        }
        if self.fallback.lines.iter().all(|line| line.trim().is_empty()) {
            return Err(invalid("fallback.lines", "at least one non-empty line is required"));
        }

        Ok(())
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnv(vec![name.to_string()]))
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.primary.low_water_mark, 2);
        assert_eq!(config.reserve.refill_threshold, 3);
        assert_eq!(config.reserve.refill_batch, 3);
        assert_eq!(config.retry.max_attempts, 8);
        assert_eq!(config.fallback.lines.len(), 5);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let raw = r#"
            [gate]
            cooldown_ms = 5000

            [retry]
            max_attempts = 4
            interim_attempt = 2
        "#;
        let config = Config::from_toml_str(raw).unwrap();
        assert_eq!(config.gate.cooldown(), Duration::from_secs(5));
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.interim_attempt, Some(2));
        assert_eq!(config.retry.fast_delay_ms, 300);
        assert_eq!(config.display.duration_ms, 3_000);
    }

    #[test]
    fn rejects_interim_beyond_max_attempts() {
        let raw = r#"
            [retry]
            max_attempts = 3
            interim_attempt = 5
        "#;
        let err = Config::from_toml_str(raw).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { field: "retry.interim_attempt", .. }
        ));
    }

    #[test]
    fn rejects_blank_fallback_pool() {
        let mut config = Config::default();
        config.fallback.lines = vec!["   ".to_string()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "fallback.lines", .. })
        ));
    }

    #[test]
    fn rejects_malformed_url() {
        let mut config = Config::default();
        config.generator.api_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[generator]\nmodel = \"gpt-4o-mini\"\n\n[display]\nduration_ms = 1500").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.generator.model, "gpt-4o-mini");
        assert_eq!(config.display.duration(), Duration::from_millis(1500));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("reading config file"));
    }

    const ENV_KEYS: [&str; 5] = ["MODEL", "API_KEY", "API_URL", "MAX_TOKENS", "TEMPERATURE"];

    // the process environment is global, so env tests run one at a time
    static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock();
        let saved: Vec<(&str, Option<String>)> =
            ENV_KEYS.iter().map(|k| (*k, std::env::var(k).ok())).collect();

        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
        for (key, value) in vars {
            std::env::set_var(key, value);
        }

        let result = f();

        for (key, value) in saved {
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
        result
    }

    const FULL_ENV: [(&str, &str); 5] = [
        ("MODEL", "gpt-4o-mini"),
        ("API_KEY", "sk-env"),
        ("API_URL", "https://llm.internal.test/v1/chat/completions"),
        ("MAX_TOKENS", "64"),
        ("TEMPERATURE", "0.5"),
    ];

    #[test]
    fn from_env_reports_every_missing_variable() {
        let err = with_env(&[("API_KEY", "sk-env")], || Config::from_env().unwrap_err());
        match err {
            ConfigError::MissingEnv(missing) => assert_eq!(missing, vec!["MODEL", "API_URL"]),
            other => panic!("expected MissingEnv, got {:?}", other),
        }

        let err = with_env(&[], || crate::validate_environment().unwrap_err());
        assert!(matches!(err, ConfigError::MissingEnv(ref missing) if missing.len() == 3));
    }

    #[test]
    fn from_env_reads_credentials_and_tuning() {
        let config = with_env(&FULL_ENV, || Config::from_env().unwrap());

        assert_eq!(config.generator.model, "gpt-4o-mini");
        assert_eq!(config.generator.api_key, "sk-env");
        assert_eq!(
            config.generator.api_url,
            "https://llm.internal.test/v1/chat/completions"
        );
        assert_eq!(config.generator.max_tokens, 64);
        assert!((config.generator.temperature - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.retry.max_attempts, 8);
    }

    #[test]
    fn from_env_keeps_defaults_for_optional_tuning() {
        let config = with_env(&FULL_ENV[..3], || Config::from_env().unwrap());
        assert_eq!(config.generator.max_tokens, 125);
        assert!((config.generator.temperature - 0.8).abs() < f32::EPSILON);
        assert!(with_env(&FULL_ENV[..3], crate::validate_environment).is_ok());
    }

    #[test]
    fn from_env_rejects_unparseable_tuning() {
        let mut vars = FULL_ENV.to_vec();
        vars[4] = ("TEMPERATURE", "scorching");
        let err = with_env(&vars, || Config::from_env().unwrap_err());
        assert!(matches!(err, ConfigError::Invalid { field: "TEMPERATURE", .. }));

        vars[4] = ("TEMPERATURE", "0.5");
        vars[3] = ("MAX_TOKENS", "-3");
        let err = with_env(&vars, || Config::from_env().unwrap_err());
        assert!(matches!(err, ConfigError::Invalid { field: "MAX_TOKENS", .. }));
    }

    #[test]
    fn from_env_validates_the_url() {
        let mut vars = FULL_ENV.to_vec();
        vars[2] = ("API_URL", "not a url");
        let err = with_env(&vars, || Config::from_env().unwrap_err());
        assert!(matches!(err, ConfigError::Invalid { field: "generator.api_url", .. }));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let mut generator = GeneratorConfig::default();
        generator.api_key = "sk-secret".to_string();
        let printed = format!("{:?}", generator);
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("REDACTED"));
    }
}
