//! Output destinations

#[cfg(feature = "console")]
pub mod console;
#[cfg(feature = "file")]
pub mod file;
pub mod memory;
pub mod stream;

#[cfg(feature = "console")]
pub use console::ConsoleWriter;
#[cfg(feature = "file")]
pub use file::{
    ArchiveNameContext, FileFailure, FileFailureMode, FileLogWriter, FileLogWriterOptions,
    RollingInterval,
};
pub use memory::{CapturedMessage, MemoryWriter};
pub use stream::StreamWriter;
