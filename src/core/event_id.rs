//! Event identifiers attached to log messages

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Numeric identifier with an optional name.
///
/// An event id is empty when `id == 0` and it has no name. Cloning only bumps the
/// reference count of the name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogEventId {
    id: i32,
    name: Option<Arc<str>>,
}

static EMPTY: LogEventId = LogEventId::EMPTY;

impl LogEventId {
    pub const EMPTY: LogEventId = LogEventId { id: 0, name: None };

    /// Shared empty event id
    pub fn empty() -> &'static LogEventId {
        &EMPTY
    }

    pub const fn new(id: i32) -> Self {
        Self { id, name: None }
    }

    pub fn with_name(id: i32, name: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }

    #[inline]
    pub fn id(&self) -> i32 {
        self.id
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.id == 0 && self.name.is_none()
    }
}

impl From<i32> for LogEventId {
    fn from(id: i32) -> Self {
        LogEventId::new(id)
    }
}

impl fmt::Display for LogEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}:{}", self.id, name),
            None => write!(f, "{}", self.id),
        }
    }
}
