use log::{info, warn, error, debug, trace};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::LoggingConfig;
use crate::error::{ErrorSeverity, MovekitError};

/// Structured logging context
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub metadata: HashMap<String, Value>,
}

impl LogContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_version(self, version: u64) -> Self {
        self.with_metadata("version", json!(version))
    }

    pub fn with_address(self, address: &str) -> Self {
        self.with_metadata("address", json!(address))
    }

    pub fn with_endpoint(self, endpoint: &str) -> Self {
        self.with_metadata("endpoint", json!(endpoint))
    }

    pub fn with_duration_ms(self, duration_ms: u64) -> Self {
        self.with_metadata("duration_ms", json!(duration_ms))
    }

    fn format_message(&self, level: &str, message: &str) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut log_entry = json!({
            "timestamp": timestamp,
            "level": level,
            "component": self.component,
            "operation": self.operation,
            "message": message,
        });

        for (key, value) in &self.metadata {
            log_entry[key] = value.clone();
        }

        log_entry.to_string()
    }

    pub fn info(&self, message: &str) {
        info!("{}", self.format_message("INFO", message));
    }

    pub fn warn(&self, message: &str) {
        warn!("{}", self.format_message("WARN", message));
    }

    pub fn error(&self, message: &str) {
        error!("{}", self.format_message("ERROR", message));
    }

    pub fn debug(&self, message: &str) {
        debug!("{}", self.format_message("DEBUG", message));
    }

    pub fn trace(&self, message: &str) {
        trace!("{}", self.format_message("TRACE", message));
    }
}

/// Measures how long an operation takes
pub struct PerformanceMonitor {
    pub start_time: SystemTime,
    operation: String,
    metadata: HashMap<String, Value>,
}

impl PerformanceMonitor {
    pub fn new(operation: &str) -> Self {
        Self {
            start_time: SystemTime::now(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    fn elapsed_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or_default()
            .as_millis() as u64
    }

    pub fn finish_with_result<T, E>(self, result: &Result<T, E>) -> u64
    where
        E: std::fmt::Display,
    {
        let duration = self.elapsed_ms();

        let mut context = LogContext::new("performance", &self.operation)
            .with_duration_ms(duration);

        for (key, value) in self.metadata {
            context = context.with_metadata(&key, value);
        }

        match result {
            Ok(_) => {
                context.trace(&format!("Operation completed successfully in {}ms", duration));
            }
            Err(e) => {
                context = context.with_metadata("error", json!(e.to_string()));
                context.debug(&format!("Operation failed after {}ms: {}", duration, e));
            }
        }

        duration
    }
}

/// Error logging utilities
pub struct ErrorLogger;

impl ErrorLogger {
    pub fn log_error(error: &MovekitError, context: Option<LogContext>) {
        let severity = error.severity();

        let log_context = context
            .unwrap_or_else(|| LogContext::new("error", "unknown"))
            .with_metadata("error_type", json!(format!("{:?}", error)))
            .with_metadata("severity", json!(format!("{:?}", severity)))
            .with_metadata("recoverable", json!(error.is_recoverable()));

        let message = format!("Error occurred: {}", error);

        match severity {
            ErrorSeverity::Critical | ErrorSeverity::High => log_context.error(&message),
            ErrorSeverity::Medium => log_context.warn(&message),
            ErrorSeverity::Low => log_context.debug(&message),
        }
    }
}

/// Tracker and gateway metrics
pub struct MetricsLogger;

impl MetricsLogger {
    pub fn log_rpc_call(method: &str, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "rpc_call")
            .with_metadata("method", json!(method))
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.debug(&format!("RPC call {} completed in {}ms", method, duration_ms));
        } else {
            context.debug(&format!("RPC call {} failed after {}ms", method, duration_ms));
        }
    }

    pub fn log_poll_cycle(
        address: &str,
        transactions_seen: usize,
        events_emitted: usize,
        watermark: Option<u64>,
        duration_ms: u64,
    ) {
        let context = LogContext::new("metrics", "poll_cycle")
            .with_address(address)
            .with_metadata("transactions_seen", json!(transactions_seen))
            .with_metadata("events_emitted", json!(events_emitted))
            .with_metadata("watermark", json!(watermark))
            .with_duration_ms(duration_ms);

        context.debug(&format!(
            "Poll cycle saw {} transactions, emitted {} events",
            transactions_seen, events_emitted
        ));
    }

    pub fn log_tracker_summary(address: &str, cycles: u64, failed_cycles: u64, events_emitted: u64) {
        let context = LogContext::new("metrics", "tracker_summary")
            .with_address(address)
            .with_metadata("cycles", json!(cycles))
            .with_metadata("failed_cycles", json!(failed_cycles))
            .with_metadata("events_emitted", json!(events_emitted));

        context.info(&format!(
            "Tracker stopped after {} cycles ({} failed), {} events emitted",
            cycles, failed_cycles, events_emitted
        ));
    }
}

/// Initialize logging for the CLI. RUST_LOG takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<(), log::SetLoggerError> {
    let json_output = config.format == "json";

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.level.as_str()))
        .format(move |buf, record| {
            use std::io::Write;

            let message = record.args().to_string();
            let structured = serde_json::from_str::<Value>(&message).ok();

            match (json_output, structured) {
                (true, Some(value)) => writeln!(buf, "{}", value),
                (true, None) => writeln!(
                    buf,
                    "{}",
                    json!({
                        "timestamp": chrono::Utc::now().to_rfc3339(),
                        "level": record.level().to_string(),
                        "target": record.target(),
                        "message": message,
                    })
                ),
                (false, Some(value)) => writeln!(
                    buf,
                    "{} [{}] {}: {}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    value["component"].as_str().unwrap_or(record.target()),
                    value["message"].as_str().unwrap_or(message.as_str())
                ),
                (false, None) => writeln!(
                    buf,
                    "{} [{}] {}: {}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    message
                ),
            }
        })
        .try_init()?;

    debug!("Logging initialized at level {}", config.level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GatewayError, TrackError};

    #[test]
    fn test_log_context_creation() {
        let context = LogContext::new("tracker", "poll");
        assert_eq!(context.component, "tracker");
        assert_eq!(context.operation, "poll");
        assert!(context.metadata.is_empty());
    }

    #[test]
    fn test_log_context_with_metadata() {
        let context = LogContext::new("test", "test")
            .with_version(42)
            .with_address("0xabc")
            .with_endpoint("http://localhost:8080/v1");

        assert_eq!(context.metadata.get("version"), Some(&json!(42)));
        assert_eq!(context.metadata.get("address"), Some(&json!("0xabc")));
        assert_eq!(context.metadata.get("endpoint"), Some(&json!("http://localhost:8080/v1")));
    }

    #[test]
    fn test_log_context_format_message() {
        let context = LogContext::new("gateway", "fetch").with_metadata("key", json!("value"));

        let message = context.format_message("WARN", "fetch failed");

        let parsed: Value = serde_json::from_str(&message).expect("Should be valid JSON");
        assert_eq!(parsed["level"], "WARN");
        assert_eq!(parsed["component"], "gateway");
        assert_eq!(parsed["operation"], "fetch");
        assert_eq!(parsed["message"], "fetch failed");
        assert_eq!(parsed["key"], "value");
    }

    #[test]
    fn test_performance_monitor_with_result() {
        let monitor = PerformanceMonitor::new("test_operation").with_metadata("k", json!(1));
        let result: std::result::Result<(), String> = Err("boom".to_string());

        let duration = monitor.finish_with_result(&result);
        assert!(duration < 60_000);
    }

    #[test]
    fn test_error_logging_does_not_panic() {
        let gateway = MovekitError::Gateway(GatewayError::Network {
            url: "http://localhost:1".to_string(),
            reason: "refused".to_string(),
        });
        ErrorLogger::log_error(&gateway, Some(LogContext::new("tracker", "poll")));
        ErrorLogger::log_error(&MovekitError::Track(TrackError::MissingAddress), None);
    }

    #[test]
    fn test_metrics_logging() {
        MetricsLogger::log_rpc_call("get_account_transactions", 120, true);
        MetricsLogger::log_poll_cycle("0xabc", 3, 1, Some(12), 130);
        MetricsLogger::log_tracker_summary("0xabc", 10, 2, 7);
    }
}
