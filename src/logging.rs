//! Structured Logging for the OmniSweep Backend
//!
//! JSON output for log aggregation in production, pretty output for
//! development. Sweep lifecycle events carry the attempt id as a
//! correlation id so one sweep can be traced across steps.
//!
//! # Usage
//!
//! ```ignore
//! use omnisweep::logging::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, true)?; // JSON mode for production
//! ```

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Application log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

/// Event categories for structured logging
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// API request/response events
    Api,
    /// Quote fetches (incl. degraded fallback)
    Quote,
    /// Sweep attempt lifecycle
    Sweep,
    /// Transaction tracking
    Tracker,
    /// System events (startup, shutdown)
    System,
}

/// Structured log event
#[derive(Debug, Serialize)]
pub struct LogEvent {
    /// Event timestamp (ISO 8601)
    pub timestamp: String,
    /// Log level
    pub level: String,
    /// Event category
    pub category: EventCategory,
    /// Human-readable message
    pub message: String,
    /// Correlation ID (attempt id, tx hash, or request id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Additional structured data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl LogEvent {
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: format!("{:?}", level).to_uppercase(),
            category,
            message: message.into(),
            correlation_id: None,
            data: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!("{{\"error\": \"failed to serialize log\", \"message\": \"{}\"}}", self.message)
        })
    }
}

/// Log an API request/response pair
pub fn log_api_request(method: &str, path: &str, status: u16, correlation_id: &str) {
    let level = if status >= 500 {
        LogLevel::Error
    } else if status >= 400 {
        LogLevel::Warn
    } else {
        LogLevel::Info
    };

    let event = LogEvent::new(level, EventCategory::Api, format!("{} {} -> {}", method, path, status))
        .with_correlation_id(correlation_id)
        .with_data(serde_json::json!({
            "method": method,
            "path": path,
            "status": status,
        }));

    match level {
        LogLevel::Error => tracing::error!(target: "omnisweep::api", "{}", event.to_json()),
        LogLevel::Warn => tracing::warn!(target: "omnisweep::api", "{}", event.to_json()),
        _ => tracing::info!(target: "omnisweep::api", "{}", event.to_json()),
    }
}

/// Log a sweep attempt lifecycle event
pub fn log_sweep_event(
    event_type: &str,
    attempt_id: &str,
    step: Option<usize>,
    tx_hash: Option<&str>,
    error: Option<&str>,
) {
    let level = if error.is_some() { LogLevel::Error } else { LogLevel::Info };
    let event = LogEvent::new(level, EventCategory::Sweep, event_type)
        .with_correlation_id(attempt_id)
        .with_data(serde_json::json!({
            "attempt_id": attempt_id,
            "step": step,
            "tx_hash": tx_hash,
            "error": error,
        }));

    if error.is_some() {
        tracing::error!(target: "omnisweep::sweep", "{}", event.to_json());
    } else {
        tracing::info!(target: "omnisweep::sweep", "{}", event.to_json());
    }
}

/// Log a quote fetch, flagging degraded fallbacks
pub fn log_quote_event(token_in: &str, amount: &str, is_mock: bool) {
    let event = LogEvent::new(
        if is_mock { LogLevel::Warn } else { LogLevel::Info },
        EventCategory::Quote,
        if is_mock { "degraded mock quote served" } else { "aggregator quote served" },
    )
    .with_data(serde_json::json!({
        "token_in": token_in,
        "amount": amount,
        "is_mock": is_mock,
    }));

    if is_mock {
        tracing::warn!(target: "omnisweep::quote", "{}", event.to_json());
    } else {
        tracing::info!(target: "omnisweep::quote", "{}", event.to_json());
    }
}

/// Initialize the logging system
///
/// # Arguments
/// * `level` - Minimum log level to output
/// * `json_format` - Use JSON format (recommended for production)
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let lvl = format!("{:?}", level).to_lowercase();
        EnvFilter::new(format!("omnisweep={},tower_http={},axum={}", lvl, lvl, lvl))
    });

    if json_format {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        );
        subscriber.try_init().map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .pretty()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        );
        subscriber.try_init().map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

/// Initialize logging from OmniSweepConfig
pub fn init_from_config(config: &crate::config::OmniSweepConfig) -> Result<(), LoggingError> {
    init_logging(LogLevel::from(config.log_level.as_str()), config.log_json)
}

/// Logging errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}

/// Generate a unique correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_serialization() {
        let event = LogEvent::new(LogLevel::Info, EventCategory::Sweep, "step complete")
            .with_correlation_id("attempt-123")
            .with_data(serde_json::json!({"step": 1}));

        let json = event.to_json();
        assert!(json.contains("step complete"));
        assert!(json.contains("attempt-123"));
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::from("WARNING"), LogLevel::Warn);
        assert_eq!(LogLevel::from("unknown"), LogLevel::Info);
    }

    #[test]
    fn test_correlation_ids_unique() {
        assert_ne!(generate_correlation_id(), generate_correlation_id());
    }
}
