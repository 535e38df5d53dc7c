//! Configuration validation rules.

use super::schema::Config;

const LOG_FORMATS: [&str; 2] = ["text", "json"];

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    let bp = &config.backpressure;
    if bp.high_watermark == 0 {
        errors.push("backpressure.high_watermark must be > 0".to_string());
    }
    if bp.low_watermark >= bp.high_watermark {
        errors.push(format!(
            "backpressure.low_watermark ({}) must be below high_watermark ({})",
            bp.low_watermark, bp.high_watermark
        ));
    }
    if bp.poll_interval_ms == 0 {
        errors.push("backpressure.poll_interval_ms must be > 0".to_string());
    }

    let logging = &config.logging;
    if logging.level.trim().is_empty() {
        errors.push("logging.level must not be empty".to_string());
    }
    if !LOG_FORMATS.contains(&logging.format.to_ascii_lowercase().as_str()) {
        errors.push(format!(
            "logging.format must be one of {:?}, got '{}'",
            LOG_FORMATS, logging.format
        ));
    }
    if logging.retention_days == 0 {
        errors.push("logging.retention_days must be > 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
