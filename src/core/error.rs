//! Error types for the logging engine

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Logger names must be non-empty dot-separated identifiers
    #[error("Invalid logger name '{name}': {message}")]
    InvalidLoggerName { name: String, message: String },

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Archive naming function returned something that is not a bare file name
    #[error("Invalid archive file name '{name}': {message}")]
    InvalidArchiveName { name: String, message: String },

    /// Template compilation failure
    #[error("Invalid template at position {position}: {message}")]
    Template { position: usize, message: String },

    /// Rendering needed more room than the scratch buffer is allowed to grow to
    #[error("Formatted message exceeds the maximum buffer size of {max} bytes")]
    BufferTooLarge { max: usize },

    /// File writer error with path
    #[error("File writer error for '{path}': {message}")]
    FileWriterError { path: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// File lock error
    #[error("Failed to acquire file lock on '{path}'")]
    FileLockError { path: String },

    /// Writer error (generic)
    #[error("Writer error: {0}")]
    WriterError(String),

    /// Operation requires an initialized manager
    #[error("Log manager is not initialized")]
    NotInitialized,

    /// `initialize` was called twice
    #[error("Log manager is already initialized")]
    AlreadyInitialized,

    /// Manager was shut down
    #[error("Log manager already stopped")]
    ManagerStopped,

    /// The consumer did not drain and stop before the shutdown timeout
    #[error("Shutdown timed out after {timeout_ms} ms with {pending} message(s) still queued")]
    ShutdownTimeout { timeout_ms: u64, pending: usize },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid logger name error
    pub fn logger_name(name: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidLoggerName {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create an invalid archive name error
    pub fn archive_name(name: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidArchiveName {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a template compilation error
    pub fn template(position: usize, message: impl Into<String>) -> Self {
        LoggerError::Template {
            position,
            message: message.into(),
        }
    }

    /// Create a file writer error
    pub fn file_writer(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileWriterError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file lock error
    pub fn file_lock(path: impl Into<String>) -> Self {
        LoggerError::FileLockError { path: path.into() }
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        LoggerError::WriterError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }

    /// Whether this error reports caller misuse rather than a runtime condition
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            LoggerError::InvalidLoggerName { .. }
                | LoggerError::InvalidConfiguration { .. }
                | LoggerError::InvalidArchiveName { .. }
                | LoggerError::Template { .. }
                | LoggerError::AlreadyInitialized
        )
    }
}
