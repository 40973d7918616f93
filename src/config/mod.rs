//! Typed configuration from positional arguments and environment variables.
//!
//! Resolved once at startup; invalid values fail fast and never reach
//! callers at runtime. The database URL is wrapped in
//! `secrecy::SecretString` to keep credentials out of logs.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::{Error, Result};

/// Default SQLite file for the completion store.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://completedTasks.db";
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_RETRY_LIMIT: u32 = 3;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Execution strategy, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Each accepted task runs its own retry chain, overlapping in time.
    Concurrent,
    /// One worker drains a FIFO queue, one task at a time.
    Sequential,
}

impl std::str::FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "async" => Ok(Mode::Concurrent),
            "sync" => Ok(Mode::Sequential),
            other => Err(Error::Config(format!(
                "unknown mode '{other}', expected 'async' or 'sync'"
            ))),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mode::Concurrent => "async",
            Mode::Sequential => "sync",
        };
        write!(f, "{s}")
    }
}

/// Executor settings. Immutable once an executor is built from them.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub mode: Mode,
    /// Attempts whose draw is at or below this value fail. 0..=100.
    pub failure_threshold: u8,
    /// Retries allowed after the first failed attempt.
    pub retry_limit: u32,
    /// Bound on the concurrent work channel. Ignored by the sequential executor.
    pub queue_capacity: usize,
    /// Pause between a successful verdict and the terminal store write.
    pub finalize_delay: Duration,
}

impl ExecutorConfig {
    pub fn new(mode: Mode, failure_threshold: u8) -> Self {
        Self {
            mode,
            failure_threshold,
            retry_limit: DEFAULT_RETRY_LIMIT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            finalize_delay: Duration::ZERO,
        }
    }

    pub fn retry_limit(mut self, n: u32) -> Self {
        self.retry_limit = n;
        self
    }

    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }

    pub fn finalize_delay(mut self, delay: Duration) -> Self {
        self.finalize_delay = delay;
        self
    }
}

/// Parse a failure threshold. Must be an integer in 0..=100.
pub fn parse_threshold(raw: &str) -> Result<u8> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("invalid failure threshold '{raw}': {e}")))?;
    u8::try_from(value)
        .ok()
        .filter(|v| *v <= 100)
        .ok_or_else(|| {
            Error::Config(format!("failure threshold {value} out of range 0..=100"))
        })
}

/// Process configuration.
#[derive(Debug)]
pub struct Config {
    pub executor: ExecutorConfig,
    pub database_url: SecretString,
    pub bind: String,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Resolve the two positional values plus environment.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn resolve(mode: &str, threshold: &str) -> Result<Self> {
        let mode: Mode = mode.parse()?;
        let failure_threshold = parse_threshold(threshold)?;

        // The concurrent executor models a slow finalize step.
        let finalize_delay = match mode {
            Mode::Concurrent => Duration::from_secs(1),
            Mode::Sequential => Duration::ZERO,
        };

        Ok(Self {
            executor: ExecutorConfig::new(mode, failure_threshold)
                .finalize_delay(finalize_delay),
            database_url: SecretString::from(
                std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            ),
            bind: std::env::var("TASKQ_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string()),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}
