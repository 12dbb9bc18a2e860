//! # config — Execsim settings from environment variables

use std::time::Duration;
use anyhow::Context;

/// Everything the paper counterpart needs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where trade intents arrive (the pipeline's `RELAY_PUSH_ADDR`)
    pub intent_addr:     String,
    /// Where confirmations go (the pipeline's `RELAY_PULL_ADDR`)
    pub confirm_addr:    String,
    pub starting_cash:   f64,
    /// Pause after a failed connect before the next attempt
    pub retry_backoff:   Duration,
    pub connect_timeout: Duration,
    pub write_timeout:   Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let starting_cash: f64 = lookup("STARTING_CASH")
            .unwrap_or_else(|| "100000".to_string())
            .parse()
            .context("STARTING_CASH must be a number")?;

        let backoff_ms: u64 = lookup("RETRY_BACKOFF_MS")
            .unwrap_or_else(|| "1000".to_string())
            .parse()
            .context("RETRY_BACKOFF_MS must be a whole number of milliseconds")?;

        let connect_ms: u64 = lookup("CONNECT_TIMEOUT_MS")
            .unwrap_or_else(|| "2000".to_string())
            .parse()
            .context("CONNECT_TIMEOUT_MS must be a whole number of milliseconds")?;

        let write_ms: u64 = lookup("WRITE_TIMEOUT_MS")
            .unwrap_or_else(|| "2000".to_string())
            .parse()
            .context("WRITE_TIMEOUT_MS must be a whole number of milliseconds")?;

        Ok(Self {
            intent_addr:     lookup("INTENT_ADDR").unwrap_or_else(|| "0.0.0.0:5555".to_string()),
            confirm_addr:    lookup("CONFIRM_ADDR").unwrap_or_else(|| "127.0.0.1:5556".to_string()),
            starting_cash,
            retry_backoff:   Duration::from_millis(backoff_ms),
            connect_timeout: Duration::from_millis(connect_ms),
            write_timeout:   Duration::from_millis(write_ms),
        })
    }
}
