//! Per-thread nested scopes
//!
//! Each thread keeps an immutable `Arc<[ScopeEntry]>`; beginning or ending a scope replaces
//! it with a new array (copy-on-write), so capturing a snapshot for a message is a
//! reference-count bump. Guards remember the id of their entry rather than its position,
//! so scopes can be ended in any order.

use super::properties::{LogProperties, LogProperty};
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static SCOPES: RefCell<ScopeSnapshot> = const { RefCell::new(ScopeSnapshot::empty()) };
}

#[derive(Clone)]
struct ScopeEntry {
    id: u64,
    properties: Arc<LogProperties>,
}

/// Immutable view of the scopes that were active when it was captured, outermost first
#[derive(Clone, Default)]
pub struct ScopeSnapshot {
    entries: Option<Arc<[ScopeEntry]>>,
}

impl ScopeSnapshot {
    pub const fn empty() -> Self {
        Self { entries: None }
    }

    fn entries(&self) -> &[ScopeEntry] {
        self.entries.as_deref().unwrap_or(&[])
    }

    /// Number of active scopes
    #[inline]
    pub fn depth(&self) -> usize {
        self.entries().len()
    }

    /// `true` when there is no scope or every scope is empty
    pub fn is_empty(&self) -> bool {
        self.entries().iter().all(|e| e.properties.is_empty())
    }

    /// Property sets, outermost first
    pub fn iter(&self) -> impl Iterator<Item = &LogProperties> + '_ {
        self.entries().iter().map(|e| e.properties.as_ref())
    }

    /// Every property of every scope, outermost first
    pub fn properties(&self) -> impl Iterator<Item = LogProperty<'_>> + '_ {
        self.iter().flat_map(|p| p.iter())
    }

    /// Whether any active scope has a matching entry
    pub fn contains<'v>(
        &self,
        name: &str,
        value: impl Into<super::properties::PropertyValue<'v>>,
    ) -> bool {
        let value = value.into();
        self.iter().any(|p| p.contains(name, value))
    }
}

impl fmt::Debug for ScopeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Entry point for beginning scopes on the current thread
pub struct LogScope;

impl LogScope {
    /// Push a copy of `properties` onto this thread's scope stack.
    ///
    /// The scope stays active until the returned guard is dropped.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_engine::core::properties::LogProperties;
    /// use rust_log_engine::core::scope::LogScope;
    ///
    /// let outer = LogScope::begin(&LogProperties::new().with("RequestId", 7));
    /// let inner = LogScope::begin(&LogProperties::new().with("Step", "auth"));
    /// assert_eq!(LogScope::depth(), 2);
    ///
    /// drop(outer); // out of order is fine
    /// assert_eq!(LogScope::depth(), 1);
    /// assert!(LogScope::current().contains("Step", "auth"));
    /// drop(inner);
    /// ```
    pub fn begin(properties: &LogProperties) -> LogScopeGuard {
        let id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
        let entry = ScopeEntry {
            id,
            properties: Arc::new(properties.clone()),
        };

        SCOPES.with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            let mut entries = Vec::with_capacity(scopes.depth() + 1);
            entries.extend_from_slice(scopes.entries());
            entries.push(entry);
            scopes.entries = Some(entries.into());
        });

        LogScopeGuard {
            id,
            _not_send: PhantomData,
        }
    }

    /// Number of scopes active on this thread
    pub fn depth() -> usize {
        SCOPES.try_with(|s| s.borrow().depth()).unwrap_or(0)
    }

    /// Snapshot of this thread's scopes
    pub fn current() -> ScopeSnapshot {
        SCOPES
            .try_with(|s| s.borrow().clone())
            .unwrap_or_default()
    }

    fn end(id: u64) {
        let _ = SCOPES.try_with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            if !scopes.entries().iter().any(|e| e.id == id) {
                return;
            }
            let remaining: Vec<ScopeEntry> = scopes
                .entries()
                .iter()
                .filter(|e| e.id != id)
                .cloned()
                .collect();
            scopes.entries = if remaining.is_empty() {
                None
            } else {
                Some(remaining.into())
            };
        });
    }
}

/// Ends its scope when dropped; bound to the thread that created it
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct LogScopeGuard {
    id: u64,
    _not_send: PhantomData<*const ()>,
}

impl fmt::Debug for LogScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogScopeGuard").field("id", &self.id).finish()
    }
}

impl Drop for LogScopeGuard {
    fn drop(&mut self) {
        LogScope::end(self.id);
    }
}
