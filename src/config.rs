//! Strongly-typed configuration for the extractor.
//!
//! Mirrors the options object of the original tool while embracing Rust's
//! type system. Values can be constructed from defaults, loaded from
//! environment variables (with optional `.env` support), or overridden
//! programmatically before the extractor is built.

use std::env;
use std::num::ParseIntError;
use std::path::PathBuf;

use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default identity string presented to the search endpoint.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Chromium flags that keep the automated session from being trivially
/// flagged and keep the window out of the way when not headless.
pub const DEFAULT_LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--no-first-run",
    "--disable-default-apps",
    "--lang=en-US",
    "--window-position=-2000,-2000",
    "--window-size=1,1",
];

/// Logging verbosity for the extractor's structured logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Minimal,
    Medium,
    Detailed,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Medium
    }
}

/// Configuration values for one extractor instance.
///
/// Serde aliases accept the camelCase spellings used by the original tool's
/// options object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Overall per-query deadline wrapping the whole pipeline.
    #[serde(alias = "timeoutMs", alias = "timeout")]
    pub timeout_ms: u64,
    /// Informational only: the core performs a single attempt per call and
    /// leaves retry orchestration to the caller.
    pub retries: u32,
    /// Whether the underlying browser surfaces a window.
    pub headless: bool,
    /// Override identity string.
    #[serde(alias = "userAgent")]
    pub user_agent: String,
    /// Inter-call pacing for batch extraction.
    #[serde(alias = "delayMs", alias = "delay")]
    pub delay_ms: u64,
    /// Deadline for the initial navigation round trip.
    #[serde(alias = "navigationTimeoutMs")]
    pub navigation_timeout_ms: u64,
    /// Minimum duration of unchanged region text before content counts as
    /// finished generating.
    #[serde(alias = "quietPeriodMs")]
    pub quiet_period_ms: u64,
    /// Interval between region text samples.
    #[serde(alias = "pollIntervalMs")]
    pub poll_interval_ms: u64,
    /// Hard upper bound on the stability wait.
    #[serde(alias = "stabilityDeadlineMs")]
    pub stability_deadline_ms: u64,
    /// Explicit Chrome/Chromium binary; `None` lets the backend discover one.
    #[serde(alias = "chromeExecutable")]
    pub chrome_executable: Option<PathBuf>,
    pub verbose: Verbosity,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            timeout_ms: 60_000,
            retries: 1,
            headless: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            delay_ms: 0,
            navigation_timeout_ms: 30_000,
            quiet_period_ms: 2_000,
            poll_interval_ms: 500,
            stability_deadline_ms: 30_000,
            chrome_executable: None,
            verbose: Verbosity::default(),
        }
    }
}

/// Error surfaced while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid integer in {variable}: {source}")]
    InvalidInteger {
        variable: &'static str,
        #[source]
        source: ParseIntError,
    },
    #[error("invalid boolean in {variable}: expected true/false/1/0, got {value:?}")]
    InvalidBoolean {
        variable: &'static str,
        value: String,
    },
}

impl SearchConfig {
    /// Construct a configuration by reading `AISEARCH_*` environment
    /// variables, after loading a `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv();
        let mut config = SearchConfig::default();

        if let Some(value) = env_var("AISEARCH_TIMEOUT_MS") {
            config.timeout_ms = parse_u64("AISEARCH_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = env_var("AISEARCH_HEADLESS") {
            config.headless = parse_bool("AISEARCH_HEADLESS", &value)?;
        }
        if let Some(value) = env_var("AISEARCH_USER_AGENT") {
            config.user_agent = value;
        }
        if let Some(value) = env_var("AISEARCH_DELAY_MS") {
            config.delay_ms = parse_u64("AISEARCH_DELAY_MS", &value)?;
        }
        if let Some(value) = env_var("AISEARCH_CHROME_BIN") {
            config.chrome_executable = Some(PathBuf::from(value));
        }

        Ok(config)
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(variable: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|source| ConfigError::InvalidInteger { variable, source })
}

fn parse_bool(variable: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBoolean {
            variable,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SearchConfig::default();
        assert_eq!(config.timeout_ms, 60_000);
        assert_eq!(config.retries, 1);
        assert!(!config.headless);
        assert_eq!(config.quiet_period_ms, 2_000);
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.stability_deadline_ms, 30_000);
        assert!(config.user_agent.contains("Chrome/120"));
    }

    #[test]
    fn accepts_camel_case_aliases() {
        let config: SearchConfig = serde_json::from_str(
            r#"{"timeoutMs": 5000, "userAgent": "test-agent", "delay": 250}"#,
        )
        .unwrap();
        assert_eq!(config.timeout_ms, 5_000);
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.delay_ms, 250);
    }

    #[test]
    fn bool_parsing_rejects_garbage() {
        let err = parse_bool("AISEARCH_HEADLESS", "maybe").unwrap_err();
        assert!(err.to_string().contains("AISEARCH_HEADLESS"));
    }
}
