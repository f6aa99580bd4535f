//! Stress tests for the async transport
//!
//! These tests verify:
//! - Overflow modes under a stalled consumer
//! - Shutdown drains every reserved message
//! - No loss or duplication with many concurrent producers

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use rust_log_engine::core::{
    LogLevel, LogManager, LogManagerConfig, LogMessage, LogWriter, LogWriterCore, LoggerConfig,
    LoggerError, OverflowMode, ProcessorKind, Result,
};
use rust_log_engine::writers::MemoryWriter;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

/// Holds the consumer inside `log` until a release token arrives (or the sender is gone)
struct GateWriter {
    core: LogWriterCore,
    entered: Sender<String>,
    release: Receiver<()>,
    seen: parking_lot::Mutex<Vec<String>>,
    disposed: AtomicBool,
    /// When set, every dispatch also calls back into the manager
    manager: OnceLock<&'static LogManager>,
}

impl GateWriter {
    fn new() -> (Arc<Self>, Receiver<String>, Sender<()>) {
        let (entered_tx, entered_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        let writer = Arc::new(Self {
            core: LogWriterCore::new(),
            entered: entered_tx,
            release: release_rx,
            seen: parking_lot::Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            manager: OnceLock::new(),
        });
        (writer, entered_rx, release_tx)
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

impl LogWriter for GateWriter {
    fn core(&self) -> &LogWriterCore {
        &self.core
    }

    fn log(&self, message: &LogMessage<'_>) -> Result<()> {
        let _ = self.entered.send(message.text.to_string());
        let _ = self.release.recv();
        if let Some(manager) = self.manager.get() {
            manager.get_logger(&format!("late.n{}", message.text))?;
            let _ = manager.diagnostics();
        }
        self.seen.lock().push(message.text.to_string());
        Ok(())
    }

    fn dispose(&self) -> Result<()> {
        self.disposed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "gate"
    }
}

fn async_manager(capacity: usize, mode: OverflowMode, writer: Arc<dyn LogWriter>) -> LogManager {
    LogManager::with_config(
        LogManagerConfig::new()
            .with_processor(ProcessorKind::Async)
            .with_queue_capacity(capacity)
            .with_overflow_mode(mode)
            .with_root(LoggerConfig::root().with_writer(writer)),
    )
    .expect("valid configuration")
}

#[test]
fn test_block_waits_for_consumer() {
    let (gate, entered, release) = GateWriter::new();
    let manager = async_manager(1, OverflowMode::Block, gate.clone());
    let logger = manager.get_logger("app").unwrap();

    // The consumer takes the first message and stalls; the second fills the queue
    logger.info("1");
    assert_eq!(
        entered.recv_timeout(Duration::from_secs(5)).unwrap(),
        "1"
    );
    logger.info("2");

    let (done_tx, done_rx) = bounded(1);
    thread::scope(|scope| {
        let producer = logger.clone();
        scope.spawn(move || {
            producer.info("3");
            let _ = done_tx.send(());
        });

        thread::sleep(Duration::from_millis(150));
        assert!(done_rx.try_recv().is_err(), "third message must wait");
        assert!(manager.metrics().block_events() >= 1);

        release.send(()).unwrap();
        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("producer released once the consumer frees capacity");
    });

    drop(release);
    manager.flush().unwrap();
    assert_eq!(gate.seen(), vec!["1", "2", "3"]);
    assert_eq!(manager.metrics().dropped_count(), 0);
}

#[test]
fn test_drop_discards_when_consumer_stalls() {
    let (gate, entered, release) = GateWriter::new();
    let manager = async_manager(16, OverflowMode::Drop, gate.clone());
    let logger = manager.get_logger("app").unwrap();

    logger.info("first");
    entered.recv_timeout(Duration::from_secs(5)).unwrap();
    for i in 0..10_000 {
        logger.log_fmt(LogLevel::Info, format_args!("message {}", i));
    }
    let dropped = manager.metrics().dropped_count();

    drop(release);
    manager.flush().unwrap();

    let received = gate.seen().len() as u64;
    assert!(dropped > 0);
    assert!(received < 10_001);
    assert!(received <= 17, "capacity 16 plus the stalled message");
    assert_eq!(received + dropped, 10_001);
}

#[test]
fn test_drop_and_notify_invokes_callback() {
    let (gate, entered, release) = GateWriter::new();
    let notified = Arc::new(AtomicUsize::new(0));
    let last_total = Arc::new(AtomicUsize::new(0));

    let counter = notified.clone();
    let total = last_total.clone();
    let manager = LogManager::with_config(
        LogManagerConfig::new()
            .with_queue_capacity(2)
            .with_overflow_mode(OverflowMode::DropAndNotify)
            .with_overflow_callback(move |dropped| {
                counter.fetch_add(1, Ordering::SeqCst);
                total.store(dropped as usize, Ordering::SeqCst);
            })
            .with_root(LoggerConfig::root().with_writer(gate.clone())),
    )
    .unwrap();
    let logger = manager.get_logger("app").unwrap();

    logger.info("first");
    entered.recv_timeout(Duration::from_secs(5)).unwrap();
    for _ in 0..10 {
        logger.info("burst");
    }

    assert_eq!(notified.load(Ordering::SeqCst), 8);
    assert_eq!(last_total.load(Ordering::SeqCst), 8);

    drop(release);
    manager.flush().unwrap();
    assert_eq!(gate.seen().len(), 3);
}

#[test]
fn test_per_logger_overflow_mode() {
    let (gate, entered, release) = GateWriter::new();
    let manager = LogManager::with_config(
        LogManagerConfig::new()
            .with_queue_capacity(1)
            .with_overflow_mode(OverflowMode::Drop)
            .with_logger(LoggerConfig::new("audit").with_overflow_mode(OverflowMode::Allocate))
            .with_root(LoggerConfig::root().with_writer(gate.clone())),
    )
    .unwrap();
    let app = manager.get_logger("app").unwrap();
    let audit = manager.get_logger("audit").unwrap();

    app.info("stall");
    entered.recv_timeout(Duration::from_secs(5)).unwrap();
    for i in 0..20 {
        app.log_fmt(LogLevel::Info, format_args!("app {}", i));
        audit.log_fmt(LogLevel::Info, format_args!("audit {}", i));
    }

    drop(release);
    manager.flush().unwrap();
    let seen = gate.seen();
    let audits = seen.iter().filter(|line| line.starts_with("audit")).count();
    assert_eq!(audits, 20);
    assert!(manager.metrics().dropped_count() >= 19);
}

#[test]
fn test_shutdown_drains_allocate_queue() {
    let (gate, entered, release) = GateWriter::new();
    let manager = async_manager(1, OverflowMode::Allocate, gate.clone());
    let logger = manager.get_logger("app").unwrap();

    logger.info("0");
    entered.recv_timeout(Duration::from_secs(5)).unwrap();
    for i in 1..50 {
        logger.log_fmt(LogLevel::Info, format_args!("{}", i));
    }
    assert!(manager.diagnostics().queue_length >= 40);

    drop(release);
    manager.shutdown().unwrap();

    let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
    assert_eq!(gate.seen(), expected);
    assert_eq!(manager.metrics().dropped_count(), 0);
}

#[test]
fn test_concurrent_producers_no_loss() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 2_000;

    let writer = Arc::new(MemoryWriter::new());
    let manager = async_manager(64, OverflowMode::Block, writer.clone());

    thread::scope(|scope| {
        for t in 0..THREADS {
            let logger = manager.get_logger(&format!("worker.{}", t)).unwrap();
            scope.spawn(move || {
                for i in 0..PER_THREAD {
                    logger.log_fmt(LogLevel::Info, format_args!("{}:{}", t, i));
                }
            });
        }
    });
    manager.shutdown().unwrap();

    let lines = writer.lines();
    assert_eq!(lines.len(), THREADS * PER_THREAD);
    let unique: HashSet<&String> = lines.iter().collect();
    assert_eq!(unique.len(), lines.len());

    // Per-producer FIFO
    let mut next = vec![0usize; THREADS];
    for line in &lines {
        let (t, i) = line.split_once(':').unwrap();
        let t: usize = t.parse().unwrap();
        let i: usize = i.parse().unwrap();
        assert_eq!(i, next[t]);
        next[t] += 1;
    }

    let sequence_ids: HashSet<u64> = writer.messages().iter().map(|m| m.sequence_id).collect();
    assert_eq!(sequence_ids.len(), THREADS * PER_THREAD);
}

#[test]
fn test_logging_during_shutdown_does_not_hang() {
    let writer = Arc::new(MemoryWriter::new());
    let manager = async_manager(8, OverflowMode::Block, writer.clone());
    let logger = manager.get_logger("app").unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..5_000 {
                logger.log_fmt(LogLevel::Info, format_args!("{}", i));
            }
        });
        thread::sleep(Duration::from_millis(5));
        manager.shutdown().unwrap();
    });

    assert!(!logger.is_enabled(LogLevel::Fatal));
    assert!(writer.len() <= 5_000);
}

#[test]
fn test_shutdown_timeout_is_reported() {
    let (gate, entered, release) = GateWriter::new();
    let manager = async_manager(8, OverflowMode::Block, gate.clone());
    let logger = manager.get_logger("app").unwrap();

    logger.info("1");
    entered.recv_timeout(Duration::from_secs(5)).unwrap();
    logger.info("2");

    let result = manager.shutdown_with_timeout(Duration::from_millis(50));
    match result {
        Err(LoggerError::ShutdownTimeout { timeout_ms, pending }) => {
            assert_eq!(timeout_ms, 50);
            assert_eq!(pending, 1);
        }
        other => panic!("expected a shutdown timeout, got {:?}", other),
    }
    assert!(!gate.disposed.load(Ordering::SeqCst));
    assert!(!logger.is_enabled(LogLevel::Fatal));

    // The consumer keeps draining after the timeout
    drop(release);
    let deadline = Instant::now() + Duration::from_secs(5);
    while gate.seen().len() < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(gate.seen(), vec!["1", "2"]);
    assert!(!gate.disposed.load(Ordering::SeqCst));
    assert!(manager.shutdown().is_ok());
}

#[test]
fn test_writer_can_call_manager_during_shutdown() {
    let (gate, entered, release) = GateWriter::new();
    let manager: &'static LogManager =
        Box::leak(Box::new(async_manager(64, OverflowMode::Block, gate.clone())));
    let _ = gate.manager.set(manager);
    let logger = manager.get_logger("app").unwrap();

    for i in 0..5 {
        logger.log_fmt(LogLevel::Info, format_args!("{}", i));
    }
    entered.recv_timeout(Duration::from_secs(5)).unwrap();

    let started = Instant::now();
    thread::scope(|scope| {
        scope.spawn(move || {
            thread::sleep(Duration::from_millis(50));
            drop(release);
        });
        manager
            .shutdown_with_timeout(Duration::from_secs(10))
            .expect("drain completes while writers use the manager");
    });

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(gate.seen(), vec!["0", "1", "2", "3", "4"]);
    assert!(gate.disposed.load(Ordering::SeqCst));
    assert_eq!(manager.metrics().error_count(), 0);
    assert_eq!(manager.diagnostics().logger_count, 6);
}
