//! Message processors: synchronous dispatch or an async queue with one consumer thread

use super::config::LogManagerConfig;
use super::error::{LoggerError, Result};
use super::message::{LogMessage, LogMessageSlot};
use super::metrics::LoggerMetrics;
use super::overflow_policy::{OverflowCallback, OverflowMode};
use super::pool::ObjectPool;
use super::queue::{Dequeue, MpscQueue, QueueConsumer};
use super::resolver::ComputedLoggerState;
use super::timestamp::Clock;
use chrono::{DateTime, Utc};
use crossbeam_utils::{Backoff, CachePadded};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, Thread};
use std::time::{Duration, Instant};

/// Default time to wait for the consumer to drain on shutdown
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Slice a blocked producer waits before re-checking capacity and shutdown
const BLOCK_SLICE: Duration = Duration::from_millis(10);

/// Upper bound on how long the idle consumer sleeps between checks
const PARK_TIMEOUT: Duration = Duration::from_millis(50);

/// Report on the first dropped message and then every this many
const DROP_REPORT_INTERVAL: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProcessorKind {
    /// Writers run on the logging thread
    Sync,
    /// Messages are queued and written by a background consumer thread
    #[default]
    Async,
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorKind::Sync => write!(f, "Sync"),
            ProcessorKind::Async => write!(f, "Async"),
        }
    }
}

/// Moves messages from loggers to writers.
///
/// Also owns the clock and the sequence counter shared by every logger of a manager.
pub struct LogProcessor {
    kind: ProcessorKind,
    clock: Arc<dyn Clock>,
    sequence: CachePadded<AtomicU64>,
    metrics: Arc<LoggerMetrics>,
    transport: Option<Arc<AsyncTransport>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl LogProcessor {
    /// Create the processor described by `config`, spawning the consumer thread for
    /// [`ProcessorKind::Async`].
    pub fn start(config: &LogManagerConfig, metrics: Arc<LoggerMetrics>) -> Result<Self> {
        let mut processor = Self {
            kind: config.processor,
            clock: Arc::clone(&config.clock),
            sequence: CachePadded::new(AtomicU64::new(0)),
            metrics: Arc::clone(&metrics),
            transport: None,
            consumer: Mutex::new(None),
        };

        if config.processor == ProcessorKind::Async {
            if config.queue_capacity == 0 {
                return Err(LoggerError::config(
                    "LogProcessor",
                    "queue capacity must be greater than zero",
                ));
            }

            let transport = Arc::new(AsyncTransport::new(
                config.queue_capacity,
                metrics,
                config.on_overflow.clone(),
            ));
            let consumer = transport.queue.consumer().ok_or_else(|| {
                LoggerError::other("queue consumer already taken")
            })?;

            let worker = Arc::clone(&transport);
            let handle = thread::Builder::new()
                .name("log-consumer".to_string())
                .spawn(move || worker.run(consumer))
                .map_err(|e| {
                    LoggerError::io_operation("spawning consumer thread", "cannot start async processor", e)
                })?;

            let _ = transport.consumer_thread.set(handle.thread().clone());
            *processor.consumer.get_mut() = Some(handle);
            processor.transport = Some(transport);
        }

        Ok(processor)
    }

    #[inline]
    pub fn kind(&self) -> ProcessorKind {
        self.kind
    }

    #[inline]
    pub fn is_async(&self) -> bool {
        self.transport.is_some()
    }

    /// Messages reserved or queued but not yet taken by the consumer
    pub fn queue_length(&self) -> usize {
        self.transport
            .as_ref()
            .map_or(0, |t| t.pending.load(Ordering::Acquire))
    }

    /// Configured capacity; zero for the sync processor
    pub fn queue_capacity(&self) -> usize {
        self.transport.as_ref().map_or(0, |t| t.capacity)
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    #[inline]
    pub(crate) fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[inline]
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Hand a message to the writers of `state`
    pub(crate) fn submit(
        &self,
        state: &Arc<ComputedLoggerState>,
        logger_name: &Arc<str>,
        message: &LogMessage<'_>,
    ) {
        match &self.transport {
            None => dispatch(state, message, &self.metrics),
            Some(transport) => transport.enqueue(state, logger_name, message),
        }
    }

    /// Wait until every submitted message has been dispatched.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let Some(transport) = &self.transport else {
            return true;
        };
        let start = Instant::now();
        loop {
            if transport.is_idle() {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            if let Some(consumer) = transport.consumer_thread.get() {
                consumer.unpark();
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Stop accepting messages, drain the queue and join the consumer.
    ///
    /// Returns `false` if the consumer did not finish within `timeout`. Calling it again
    /// is a no-op.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let Some(transport) = &self.transport else {
            return true;
        };
        transport.stopping.store(true, Ordering::SeqCst);
        transport.wake_blocked();

        let Some(handle) = self.consumer.lock().take() else {
            return true;
        };
        if handle.thread().id() == thread::current().id() {
            // Dropped from inside a writer; the loop exits on its own once drained
            return true;
        }
        handle.thread().unpark();

        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    eprintln!(
                        "[LOGGER ERROR] Consumer thread panicked during shutdown: {}",
                        panic_message(&e)
                    );
                    return false;
                }
                return true;
            }

            if start.elapsed() >= timeout {
                eprintln!(
                    "[LOGGER WARNING] Consumer thread did not finish within {:?} timeout. \
                     Some messages may be lost.",
                    timeout
                );
                return false;
            }

            handle.thread().unpark();
            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl Drop for LogProcessor {
    fn drop(&mut self) {
        self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
    }
}

impl fmt::Debug for LogProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogProcessor")
            .field("kind", &self.kind)
            .field("queue_length", &self.queue_length())
            .field("queue_capacity", &self.queue_capacity())
            .finish()
    }
}

/// Shared state of the async processor
struct AsyncTransport {
    queue: Arc<MpscQueue<LogMessageSlot>>,
    pool: ObjectPool<LogMessageSlot>,
    capacity: usize,
    /// Reservations not yet taken by the consumer
    pending: CachePadded<AtomicUsize>,
    submitted: AtomicU64,
    dispatched: AtomicU64,
    stopping: AtomicBool,
    blocked_producers: AtomicUsize,
    space_lock: Mutex<()>,
    space: Condvar,
    consumer_thread: OnceLock<Thread>,
    metrics: Arc<LoggerMetrics>,
    on_overflow: Option<OverflowCallback>,
}

impl AsyncTransport {
    fn new(capacity: usize, metrics: Arc<LoggerMetrics>, on_overflow: Option<OverflowCallback>) -> Self {
        Self {
            queue: Arc::new(MpscQueue::new()),
            // One extra slot covers the message the consumer is dispatching
            pool: ObjectPool::new(capacity.saturating_add(1)),
            capacity,
            pending: CachePadded::new(AtomicUsize::new(0)),
            submitted: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            stopping: AtomicBool::new(false),
            blocked_producers: AtomicUsize::new(0),
            space_lock: Mutex::new(()),
            space: Condvar::new(),
            consumer_thread: OnceLock::new(),
            metrics,
            on_overflow,
        }
    }

    fn enqueue(&self, state: &Arc<ComputedLoggerState>, logger_name: &Arc<str>, message: &LogMessage<'_>) {
        if !self.reserve(state.overflow_mode()) {
            return;
        }

        // Reservations made after shutdown began are withdrawn
        if self.stopping.load(Ordering::SeqCst) {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            self.unpark_consumer();
            return;
        }

        let slot = self.pool.rent_or_allocate();
        slot.lock().fill(state, logger_name, message);
        self.submitted.fetch_add(1, Ordering::AcqRel);
        self.queue.enqueue(slot);
        self.unpark_consumer();
    }

    /// Claim room for one message, applying `mode` when the queue is full
    fn reserve(&self, mode: OverflowMode) -> bool {
        if mode == OverflowMode::Allocate {
            self.pending.fetch_add(1, Ordering::SeqCst);
            return true;
        }
        if self.try_reserve() {
            return true;
        }

        self.metrics.record_queue_full();
        match mode {
            OverflowMode::Block => self.reserve_blocking(),
            OverflowMode::Drop => {
                self.metrics.record_dropped();
                false
            }
            OverflowMode::DropAndNotify => {
                self.drop_and_notify();
                false
            }
            OverflowMode::Allocate => {
                self.pending.fetch_add(1, Ordering::SeqCst);
                true
            }
        }
    }

    fn try_reserve(&self) -> bool {
        let mut current = self.pending.load(Ordering::SeqCst);
        loop {
            if current >= self.capacity {
                return false;
            }
            match self.pending.compare_exchange_weak(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn reserve_blocking(&self) -> bool {
        self.metrics.record_block();
        let mut guard = self.space_lock.lock();
        self.blocked_producers.fetch_add(1, Ordering::SeqCst);
        let reserved = loop {
            if self.try_reserve() {
                break true;
            }
            if self.stopping.load(Ordering::SeqCst) {
                break false;
            }
            self.space.wait_for(&mut guard, BLOCK_SLICE);
        };
        self.blocked_producers.fetch_sub(1, Ordering::SeqCst);
        drop(guard);

        if !reserved {
            self.metrics.record_dropped();
        }
        reserved
    }

    fn drop_and_notify(&self) {
        let dropped = self.metrics.record_dropped() + 1;

        if dropped == 1 || dropped % DROP_REPORT_INTERVAL == 0 {
            eprintln!(
                "[LOGGER WARNING] Queue full, {} messages dropped. \
                 Consider increasing the queue capacity or using a different overflow mode.",
                dropped
            );
        }

        if let Some(callback) = &self.on_overflow {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(dropped))) {
                eprintln!(
                    "[LOGGER ERROR] Overflow callback panicked: {}",
                    panic_message(&panic)
                );
            }
        }
    }

    fn wake_blocked(&self) {
        if self.blocked_producers.load(Ordering::SeqCst) > 0 {
            let _guard = self.space_lock.lock();
            self.space.notify_all();
        }
    }

    fn unpark_consumer(&self) {
        if let Some(consumer) = self.consumer_thread.get() {
            consumer.unpark();
        }
    }

    fn is_idle(&self) -> bool {
        self.pending.load(Ordering::SeqCst) == 0
            && self.dispatched.load(Ordering::Acquire) >= self.submitted.load(Ordering::Acquire)
    }

    /// Consumer loop; exits once shutdown was requested and every reservation is drained
    fn run(&self, mut consumer: QueueConsumer<LogMessageSlot>) {
        let backoff = Backoff::new();
        loop {
            match consumer.dequeue() {
                Dequeue::Item(slot) => {
                    backoff.reset();
                    self.pending.fetch_sub(1, Ordering::SeqCst);
                    self.wake_blocked();

                    {
                        let message = slot.lock();
                        if let Some(state) = message.state() {
                            dispatch(state, &message.as_message(), &self.metrics);
                        }
                    }
                    self.pool.give_back(&slot);
                    self.dispatched.fetch_add(1, Ordering::AcqRel);
                }
                Dequeue::Inconsistent => backoff.snooze(),
                Dequeue::Empty => {
                    backoff.reset();
                    if self.stopping.load(Ordering::SeqCst)
                        && self.pending.load(Ordering::SeqCst) == 0
                    {
                        break;
                    }
                    thread::park_timeout(PARK_TIMEOUT);
                }
            }
        }
    }
}

/// Run every writer bound to `message.level`.
///
/// Each writer is isolated: its filters and `log` run under `catch_unwind`, and errors or
/// panics are counted and reported without affecting the other writers.
pub(crate) fn dispatch(state: &ComputedLoggerState, message: &LogMessage<'_>, metrics: &LoggerMetrics) {
    for entry in state.writers_for(message.level) {
        let result = catch_unwind(AssertUnwindSafe(|| {
            if entry.filters.allows(message) {
                entry.writer.log(message)
            } else {
                Ok(())
            }
        }));

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                metrics.record_error();
                eprintln!("[LOGGER ERROR] Writer '{}' failed: {}", entry.writer.name(), e);
            }
            Err(panic) => {
                metrics.record_error();
                eprintln!(
                    "[LOGGER CRITICAL] Writer '{}' panicked: {}. \
                     Other writers continue to function.",
                    entry.writer.name(),
                    panic_message(&panic)
                );
            }
        }
    }
    metrics.record_processed();
}

pub(crate) fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
