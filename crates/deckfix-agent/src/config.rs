// ABOUTME: Configuration loading and validation for the review loop.
// ABOUTME: Reads DECKFIX_* environment variables into iteration, timeout and retry limits.

use std::time::Duration;

use thiserror::Error;

use crate::runtime::ModelPolicy;

pub const DEFAULT_MAX_ITERATIONS: u32 = 20;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Limits for one review run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentConfig {
    pub max_iterations: u32,
    pub call_timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - DECKFIX_MAX_ITERATIONS: loop cap (default: 20, must be > 0)
    /// - DECKFIX_CALL_TIMEOUT_SECS: per model call timeout (default: 60, must be > 0)
    /// - DECKFIX_MAX_RETRIES: retries for transient provider errors (default: 2)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source. Unset and empty
    /// variables fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let read = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());

        let max_iterations = match read("DECKFIX_MAX_ITERATIONS") {
            Some(value) => parse_count("DECKFIX_MAX_ITERATIONS", &value, 1)?,
            None => defaults.max_iterations,
        };

        let call_timeout = match read("DECKFIX_CALL_TIMEOUT_SECS") {
            Some(value) => Duration::from_secs(parse_count("DECKFIX_CALL_TIMEOUT_SECS", &value, 1)?.into()),
            None => defaults.call_timeout,
        };

        let max_retries = match read("DECKFIX_MAX_RETRIES") {
            Some(value) => parse_count("DECKFIX_MAX_RETRIES", &value, 0)?,
            None => defaults.max_retries,
        };

        Ok(Self {
            max_iterations,
            call_timeout,
            max_retries,
            retry_backoff: defaults.retry_backoff,
        })
    }

    /// The timeout and retry rules for model calls.
    pub fn policy(&self) -> ModelPolicy {
        ModelPolicy {
            timeout: self.call_timeout,
            max_retries: self.max_retries,
            backoff: self.retry_backoff,
        }
    }
}

fn parse_count(name: &'static str, value: &str, min: u32) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(n) if n >= min => Ok(n),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn config_loads_defaults() {
        let config = AgentConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.max_iterations, 20);
        assert_eq!(config.call_timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn config_reads_overrides() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("DECKFIX_MAX_ITERATIONS", "5"),
            ("DECKFIX_CALL_TIMEOUT_SECS", " 15 "),
            ("DECKFIX_MAX_RETRIES", "0"),
        ]))
        .unwrap();

        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.call_timeout, Duration::from_secs(15));
        assert_eq!(config.max_retries, 0);

        let policy = config.policy();
        assert_eq!(policy.timeout, Duration::from_secs(15));
        assert_eq!(policy.max_retries, 0);
    }

    #[test]
    fn config_rejects_zero_and_garbage() {
        let err = AgentConfig::from_lookup(lookup(&[("DECKFIX_MAX_ITERATIONS", "0")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "DECKFIX_MAX_ITERATIONS",
                value: "0".to_string()
            }
        );

        let err = AgentConfig::from_lookup(lookup(&[("DECKFIX_CALL_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("DECKFIX_CALL_TIMEOUT_SECS"));

        assert!(AgentConfig::from_lookup(lookup(&[("DECKFIX_MAX_RETRIES", "-1")])).is_err());
    }

    #[test]
    fn config_treats_empty_as_unset() {
        let config = AgentConfig::from_lookup(lookup(&[("DECKFIX_MAX_ITERATIONS", "")])).unwrap();
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn config_reads_process_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        // SAFETY: test-only code, env access serialized by ENV_LOCK
        unsafe {
            std::env::set_var("DECKFIX_MAX_ITERATIONS", "7");
            std::env::remove_var("DECKFIX_CALL_TIMEOUT_SECS");
            std::env::remove_var("DECKFIX_MAX_RETRIES");
        }

        let result = AgentConfig::from_env();

        // Clean up before asserting
        // SAFETY: test-only code, env access serialized by ENV_LOCK
        unsafe {
            std::env::remove_var("DECKFIX_MAX_ITERATIONS");
        }

        let config = result.unwrap();
        assert_eq!(config.max_iterations, 7);
        assert_eq!(config.call_timeout, Duration::from_secs(60));
    }
}
