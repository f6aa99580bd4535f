//! Overflow modes for the async message queue
//!
//! When the async queue holds `capacity` messages, the overflow mode decides what a
//! producer does with the next one. The check is made before the message is enqueued,
//! so a dropped message never reaches the queue.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Policy applied when the async queue is full
///
/// # Example
///
/// ```
/// use rust_log_engine::core::overflow_policy::OverflowMode;
///
/// assert_eq!(OverflowMode::default(), OverflowMode::DropAndNotify);
/// assert_eq!("block".parse::<OverflowMode>(), Ok(OverflowMode::Block));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OverflowMode {
    /// Wait until the consumer frees capacity
    ///
    /// Warning: this applies backpressure to the application.
    Block,

    /// Discard the message and count it
    Drop,

    /// Discard the message, count it, and notify
    ///
    /// Notification calls the manager's overflow callback (if any) with the cumulative
    /// drop count and prints a warning to stderr on the first drop and every 1000th.
    #[default]
    DropAndNotify,

    /// Skip the capacity check; the queue grows without bound
    Allocate,
}

impl fmt::Display for OverflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowMode::Block => write!(f, "Block"),
            OverflowMode::Drop => write!(f, "Drop"),
            OverflowMode::DropAndNotify => write!(f, "DropAndNotify"),
            OverflowMode::Allocate => write!(f, "Allocate"),
        }
    }
}

impl std::str::FromStr for OverflowMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "block" => Ok(OverflowMode::Block),
            "drop" => Ok(OverflowMode::Drop),
            "dropandnotify" | "drop_and_notify" => Ok(OverflowMode::DropAndNotify),
            "allocate" | "grow" => Ok(OverflowMode::Allocate),
            _ => Err(format!("Invalid overflow mode: '{}'", s)),
        }
    }
}

/// Callback type for overflow notifications
///
/// Called when a message is dropped under [`OverflowMode::DropAndNotify`].
/// The parameter is the total count of dropped messages so far.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;
