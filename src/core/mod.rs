//! Core engine types: message model, transport, registry and configuration

pub mod config;
pub mod error;
pub mod event_id;
pub mod log_level;
pub mod logger;
pub mod manager;
pub mod message;
pub mod metrics;
pub mod overflow_policy;
pub mod pool;
pub mod processor;
pub mod properties;
pub mod queue;
pub mod resolver;
pub mod scope;
pub mod timestamp;
pub mod writer;

pub use config::{LogManagerConfig, LogWriterBinding, LoggerConfig, DEFAULT_QUEUE_CAPACITY};
pub use error::{LoggerError, Result};
pub use event_id::LogEventId;
pub use log_level::{LevelFormat, LogLevel};
pub use logger::Logger;
pub use manager::{LogManager, LogManagerDiagnostics};
pub use message::{ExceptionFormat, LogException, LogMessage, ThreadInfo};
pub use metrics::LoggerMetrics;
pub use overflow_policy::{OverflowCallback, OverflowMode};
pub use pool::{BufferPool, ObjectPool, PoolSlot, Recyclable, ScratchBuffer};
pub use processor::{ProcessorKind, DEFAULT_SHUTDOWN_TIMEOUT};
pub use properties::{LogProperties, LogProperty, PropertyValue};
pub use resolver::ComputedLoggerState;
pub use scope::{LogScope, LogScopeGuard, ScopeSnapshot};
pub use timestamp::{Clock, ManualClock, SystemClock, TimestampFormat};
pub use writer::{FrozenFilters, LogFilter, LogWriter, LogWriterCore};
