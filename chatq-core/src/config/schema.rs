//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for chatq
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Producer throttling thresholds
    #[serde(default)]
    pub backpressure: BackpressureConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Advisory backpressure applied by the event pump
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackpressureConfig {
    /// Pause pulling from the source once this many values are buffered
    #[serde(default = "default_high_watermark")]
    pub high_watermark: usize,
    /// Resume once the buffer has drained to this depth
    #[serde(default = "default_low_watermark")]
    pub low_watermark: usize,
    /// How often a paused pump rechecks the watermark
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Close the queue when the source is exhausted
    #[serde(default = "default_true")]
    pub close_on_exhaustion: bool,
}

fn default_high_watermark() -> usize {
    256
}

fn default_low_watermark() -> usize {
    64
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_true() -> bool {
    true
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            high_watermark: default_high_watermark(),
            low_watermark: default_low_watermark(),
            poll_interval_ms: default_poll_interval_ms(),
            close_on_exhaustion: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub dir: Option<String>,
    /// Days to keep rolled log files
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_retention_days() -> u64 {
    7
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: None,
            retention_days: default_retention_days(),
            overrides: HashMap::new(),
        }
    }
}
