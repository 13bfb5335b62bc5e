use thiserror::Error;

/// Main error type for the movekit CLI
#[derive(Error, Debug)]
pub enum MovekitError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Tracker error: {0}")]
    Track(#[from] TrackError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cursor store error: {0}")]
    Cursor(#[from] crate::database::CursorError),

    #[error("System error: {0}")]
    System(#[from] SystemError),
}

/// Errors raised while talking to the network RPC
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Unknown network '{name}', valid networks: {}", .available.join(", "))]
    UnknownNetwork { name: String, available: Vec<String> },

    #[error("No response from {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("RPC request failed with status {status}: {message}")]
    Rpc { status: u16, message: String },

    #[error("Unexpected response body: {0}")]
    Decode(String),
}

/// Event classification errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("Malformed event type '{0}', expected <address>::<module>::<name>")]
    Malformed(String),
}

/// Startup validation errors for the `track` command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    #[error("Missing required --address <ADDRESS>. Usage: movekit track --address 0x... [--module <NAME>] [--batch <ID>] [--network <NAME>] [--interval <MS>]")]
    MissingAddress,

    #[error("Polling interval must be a positive number of milliseconds, got {0}")]
    InvalidInterval(u64),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// System-level errors
#[derive(Error, Debug)]
pub enum SystemError {
    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Invalid transaction file {path}: {reason}")]
    InvalidInput { path: String, reason: String },

    #[error("Signal handling failed: {0}")]
    Signal(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, MovekitError>;

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Errors that stop the command
    Critical,
    /// Errors that affect functionality but not the process
    High,
    /// Transient errors expected to clear on the next attempt
    Medium,
    /// Mostly informational
    Low,
}

impl MovekitError {
    /// Get the severity level of an error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            MovekitError::Config(_) => ErrorSeverity::Critical,
            MovekitError::Track(_) => ErrorSeverity::Critical,
            MovekitError::System(_) => ErrorSeverity::Critical,

            MovekitError::Gateway(GatewayError::UnknownNetwork { .. }) => ErrorSeverity::High,
            MovekitError::Gateway(GatewayError::Decode(_)) => ErrorSeverity::High,
            MovekitError::Cursor(_) => ErrorSeverity::High,

            MovekitError::Gateway(GatewayError::Network { .. }) => ErrorSeverity::Medium,
            MovekitError::Gateway(GatewayError::Rpc { .. }) => ErrorSeverity::Medium,

            MovekitError::Event(_) => ErrorSeverity::Low,
        }
    }

    /// Check if the error can clear by itself on a later attempt
    pub fn is_recoverable(&self) -> bool {
        match self {
            MovekitError::Gateway(GatewayError::Network { .. }) => true,
            MovekitError::Gateway(GatewayError::Rpc { .. }) => true,
            MovekitError::Gateway(GatewayError::Decode(_)) => true,
            MovekitError::Event(_) => true,
            MovekitError::Cursor(_) => true,

            MovekitError::Gateway(GatewayError::UnknownNetwork { .. }) => false,
            MovekitError::Track(_) => false,
            MovekitError::Config(_) => false,
            MovekitError::System(_) => false,
        }
    }
}
