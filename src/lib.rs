pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod models;
pub mod tracker;

pub use config::{AppConfig, LoggingConfig, NetworkConfig, RpcConfig, TrackerConfig};
pub use error::{MovekitError, Result};
pub use gateway::{NetworkRegistry, RpcClient};
pub use logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
pub use models::{classify, format_event, parse_event_type, EventKind, EventRecord, TransactionRecord};
pub use tracker::{FilterCriteria, Poller, PollerConfig, Watermark};
