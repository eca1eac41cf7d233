//! Typed configuration.
//!
//! `Config` is process-level and loads once from environment variables.
//! `WorkerConfig` is per worker and can come from a TOML file; it carries
//! the run-loop policy knobs (poll interval, submit overflow policy).

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug)]
pub struct Config {
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    /// Optional path to a worker TOML file.
    pub worker_config_path: Option<PathBuf>,
    /// Optional override for every worker's poll interval.
    pub poll_interval_override: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let poll_interval_override = match std::env::var("SCIWORKER_POLL_INTERVAL_MS") {
            Ok(raw) => Some(parse_positive_ms("SCIWORKER_POLL_INTERVAL_MS", &raw)?),
            Err(_) => None,
        };

        Ok(Self {
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            worker_config_path: std::env::var("SCIWORKER_CONFIG").ok().map(PathBuf::from),
            poll_interval_override,
        })
    }

    /// Resolve the worker configuration: the TOML file if one is configured,
    /// defaults otherwise, with the env override applied on top.
    pub fn worker_config(&self) -> Result<WorkerConfig> {
        let mut config = match &self.worker_config_path {
            Some(path) => WorkerConfig::load(path)?,
            None => WorkerConfig::default(),
        };
        if let Some(interval) = self.poll_interval_override {
            config.poll_interval_ms = interval.as_millis() as u64;
        }
        Ok(config)
    }
}

fn parse_positive_ms(name: &str, raw: &str) -> Result<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(Error::Config(format!(
            "{name} must be a positive integer (milliseconds), got {raw:?}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Worker config
// ---------------------------------------------------------------------------

/// What `submit` does when a bounded input queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued item and hand it back to the caller.
    #[default]
    DropOldest,
    /// Wait up to `block_timeout_ms` for room, then fail with `QueueFull`.
    Block { block_timeout_ms: u64 },
}

/// Run-loop policy for a single worker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// Bounded wait on the input queue per iteration. Also the worst-case
    /// latency for a control message to take effect while running.
    pub poll_interval_ms: u64,
    /// Input queue capacity. `None` means unbounded.
    pub input_capacity: Option<usize>,
    pub overflow: OverflowPolicy,
    /// Stop after the first `process_data` call.
    pub oneshot: bool,
    /// Surface hook faults as error-tagged results on the output queue.
    pub report_faults: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            input_capacity: None,
            overflow: OverflowPolicy::default(),
            oneshot: false,
            report_faults: true,
        }
    }
}

impl WorkerConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: WorkerConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("bad worker config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read worker config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(
                "poll_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.input_capacity == Some(0) {
            return Err(Error::Config(
                "input_capacity must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_input_capacity(mut self, capacity: usize, overflow: OverflowPolicy) -> Self {
        self.input_capacity = Some(capacity);
        self.overflow = overflow;
        self
    }

    pub fn oneshot(mut self, oneshot: bool) -> Self {
        self.oneshot = oneshot;
        self
    }

    pub fn report_faults(mut self, report: bool) -> Self {
        self.report_faults = report;
        self
    }
}
