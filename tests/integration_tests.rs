//! Integration tests for the log engine
//!
//! These tests verify:
//! - Hierarchical configuration resolution
//! - Writer filters and per-binding levels
//! - Manager lifecycle (early loggers, apply_changes, shutdown)
//! - Structured output through template and JSON formatters
//! - File writer wiring through the manager

use rust_log_engine::core::{
    LogEventId, LogException, LogLevel, LogManager, LogManagerConfig, LogProperties, LogScope,
    LogWriter, LoggerConfig, LoggerError, ProcessorKind,
};
use rust_log_engine::formatters::{JsonFormatter, LogTemplate, TemplateFormatter};
#[cfg(feature = "file")]
use rust_log_engine::writers::{FileLogWriter, FileLogWriterOptions};
use rust_log_engine::writers::MemoryWriter;
use rust_log_engine::{info, warn};
use std::sync::Arc;

fn memory() -> Arc<MemoryWriter> {
    Arc::new(MemoryWriter::new())
}

fn sync_manager(config: LogManagerConfig) -> LogManager {
    LogManager::with_config(config.with_processor(ProcessorKind::Sync))
        .expect("valid configuration")
}

#[test]
fn test_hierarchical_resolution() {
    let root = memory();
    let db = memory();
    let pool = memory();

    let manager = sync_manager(
        LogManagerConfig::new()
            .with_root(LoggerConfig::root().with_writer(root.clone()))
            .with_logger(
                LoggerConfig::new("app.db")
                    .with_minimum_level(LogLevel::Warn)
                    .with_writer(db.clone()),
            )
            .with_logger(
                LoggerConfig::new("app.db.pool")
                    .with_include_parent_writers(false)
                    .with_writer(pool.clone()),
            ),
    );

    let http = manager.get_logger("app.http").unwrap();
    let database = manager.get_logger("app.db").unwrap();
    let connections = manager.get_logger("app.db.pool").unwrap();
    let lookalike = manager.get_logger("app.dbx").unwrap();

    http.info("http info");
    database.info("db info");
    database.warn("db warn");
    connections.warn("pool warn");
    connections.info("pool info");
    lookalike.info("dbx info");

    assert_eq!(root.lines(), vec!["http info", "db warn", "dbx info"]);
    assert_eq!(db.lines(), vec!["db warn"]);
    assert_eq!(pool.lines(), vec!["pool warn"]);
    assert_eq!(connections.minimum_level(), LogLevel::Warn);
}

#[test]
fn test_more_specific_config_overrides_level() {
    let writer = memory();
    let manager = sync_manager(
        LogManagerConfig::new()
            .with_root(
                LoggerConfig::root()
                    .with_minimum_level(LogLevel::Error)
                    .with_writer(writer.clone()),
            )
            .with_logger(LoggerConfig::new("noisy").with_minimum_level(LogLevel::Trace)),
    );

    let noisy = manager.get_logger("noisy.child").unwrap();
    let quiet = manager.get_logger("quiet").unwrap();
    assert!(noisy.is_enabled(LogLevel::Trace));
    assert!(!quiet.is_enabled(LogLevel::Warn));

    noisy.trace("from noisy");
    quiet.warn("from quiet");
    assert_eq!(writer.lines(), vec!["from noisy"]);
}

#[test]
fn test_binding_and_writer_levels() {
    let all = memory();
    let errors_only = memory();
    let writer_level = Arc::new(MemoryWriter::new().with_minimum_level(LogLevel::Warn));

    let manager = sync_manager(
        LogManagerConfig::new().with_root(
            LoggerConfig::root()
                .with_minimum_level(LogLevel::Debug)
                .with_writer(all.clone())
                .with_writer_at(errors_only.clone(), LogLevel::Error)
                .with_writer(writer_level.clone()),
        ),
    );

    let logger = manager.get_logger("app").unwrap();
    logger.debug("debug");
    logger.warn("warn");
    logger.error("error");

    assert_eq!(all.lines(), vec!["debug", "warn", "error"]);
    assert_eq!(errors_only.lines(), vec!["error"]);
    assert_eq!(writer_level.lines(), vec!["warn", "error"]);
}

#[test]
fn test_same_writer_bound_twice_receives_once() {
    let writer = memory();
    let manager = sync_manager(
        LogManagerConfig::new()
            .with_root(LoggerConfig::root().with_writer(writer.clone()))
            .with_logger(LoggerConfig::new("app").with_writer(writer.clone())),
    );

    manager.get_logger("app").unwrap().info("once");
    assert_eq!(writer.lines(), vec!["once"]);
}

#[test]
fn test_writer_filters() {
    let writer = memory();
    writer.core().add_accept_filter(|m| m.logger_name.starts_with("app"));
    writer.core().add_reject_filter(|m| m.text.contains("password"));

    let manager = sync_manager(
        LogManagerConfig::new().with_root(LoggerConfig::root().with_writer(writer.clone())),
    );

    manager.get_logger("app.auth").unwrap().info("login ok");
    manager.get_logger("app.auth").unwrap().info("password=hunter2");
    manager.get_logger("system").unwrap().info("boot");

    assert_eq!(writer.lines(), vec!["login ok"]);
}

#[test]
fn test_filter_edits_wait_for_apply_changes() {
    let writer = memory();
    let manager = sync_manager(
        LogManagerConfig::new().with_root(LoggerConfig::root().with_writer(writer.clone())),
    );
    let logger = manager.get_logger("app").unwrap();

    writer.core().add_reject_filter(|_| true);
    logger.info("still delivered");
    manager.apply_changes().unwrap();
    logger.info("rejected");

    assert_eq!(writer.lines(), vec!["still delivered"]);
}

#[test]
fn test_logger_before_initialize_becomes_live() {
    let writer = memory();
    let manager = LogManager::new();
    let logger = manager.get_logger("early").unwrap();

    assert!(!logger.is_enabled(LogLevel::Fatal));
    logger.fatal("lost");

    manager
        .initialize(
            LogManagerConfig::new()
                .with_processor(ProcessorKind::Sync)
                .with_root(LoggerConfig::root().with_writer(writer.clone())),
        )
        .unwrap();

    assert!(logger.is_enabled(LogLevel::Info));
    logger.info("kept");
    assert_eq!(writer.lines(), vec!["kept"]);
}

#[test]
fn test_apply_changes_reconfigures_live_loggers() {
    let writer = memory();
    let manager = sync_manager(
        LogManagerConfig::new().with_root(LoggerConfig::root().with_writer(writer.clone())),
    );
    let logger = manager.get_logger("app.db").unwrap();
    let before = logger.version();

    logger.debug("hidden");
    manager
        .config()
        .loggers
        .push(LoggerConfig::new("app.db").with_minimum_level(LogLevel::Debug));
    manager.apply_changes().unwrap();

    assert!(logger.version() > before);
    logger.debug("visible");
    assert_eq!(writer.lines(), vec!["visible"]);
}

#[test]
fn test_invalid_logger_names() {
    let manager = LogManager::new();
    assert!(matches!(
        manager.get_logger(""),
        Err(LoggerError::InvalidLoggerName { .. })
    ));
    assert!(manager.get_logger("app..db").is_err());
    assert!(manager.get_logger(".app").is_err());

    let bad = LogManagerConfig::new().with_logger(LoggerConfig::new("a."));
    assert!(matches!(
        LogManager::with_config(bad),
        Err(LoggerError::InvalidLoggerName { .. })
    ));
}

#[test]
fn test_logging_after_shutdown_is_ignored() {
    let writer = memory();
    let manager = sync_manager(
        LogManagerConfig::new().with_root(LoggerConfig::root().with_writer(writer.clone())),
    );
    let logger = manager.get_logger("app").unwrap();
    logger.info("before");

    manager.shutdown().unwrap();
    assert!(writer.is_disposed());
    assert!(!logger.is_enabled(LogLevel::Fatal));
    logger.fatal("after");

    assert_eq!(writer.lines(), vec!["before"]);
    assert!(matches!(
        manager.apply_changes(),
        Err(LoggerError::ManagerStopped)
    ));
}

#[test]
fn test_structured_template_output() {
    let writer = Arc::new(MemoryWriter::new().with_formatter(TemplateFormatter::new(
        LogTemplate::parse("{Level:tri} {LoggerName}{? [{EventId}]?}: {Text}{? {{{Properties}}}?}{? <{Scope}>?}")
            .unwrap(),
    )));
    let manager = sync_manager(
        LogManagerConfig::new().with_root(LoggerConfig::root().with_writer(writer.clone())),
    );
    let logger = manager.get_logger("app.orders").unwrap();

    let request = LogProperties::new().with("RequestId", "r-17");
    let _scope = LogScope::begin(&request);
    let props = LogProperties::new().with("UserId", 42).with("Name", "Ada");
    logger.log_with(
        LogLevel::Warn,
        &LogEventId::with_name(7, "OrderRejected"),
        "order rejected",
        &props,
        None,
    );
    logger.info("plain");

    assert_eq!(
        writer.lines(),
        vec![
            "WRN app.orders [7:OrderRejected]: order rejected {UserId=42, Name=Ada} <RequestId=r-17>",
            "INF app.orders: plain <RequestId=r-17>",
        ]
    );
}

#[test]
fn test_scope_ends_with_guard() {
    let writer = Arc::new(MemoryWriter::new().with_formatter(TemplateFormatter::new(
        LogTemplate::parse("{Text}{? ({Scope})?}").unwrap(),
    )));
    let manager = sync_manager(
        LogManagerConfig::new().with_root(LoggerConfig::root().with_writer(writer.clone())),
    );
    let logger = manager.get_logger("app").unwrap();

    {
        let _outer = logger.begin_scope(&LogProperties::new().with("Tenant", "acme"));
        let inner = logger.begin_scope(&LogProperties::new().with("Job", 3));
        info!(logger, "inside {}", "both");
        drop(inner);
        info!(logger, "inside outer");
    }
    info!(logger, "outside");

    assert_eq!(
        writer.lines(),
        vec![
            "inside both (Tenant=acme, Job=3)",
            "inside outer (Tenant=acme)",
            "outside",
        ]
    );
}

#[derive(Debug, thiserror::Error)]
#[error("connection refused")]
struct ConnectError;

#[test]
fn test_json_output_parses() {
    let writer = Arc::new(MemoryWriter::new().with_formatter(JsonFormatter::new()));
    let manager = sync_manager(
        LogManagerConfig::new().with_root(LoggerConfig::root().with_writer(writer.clone())),
    );
    let logger = manager.get_logger("app.net").unwrap();

    let text = "quote \" backslash \\ newline \n tab \t bell \u{7}";
    let props = LogProperties::new()
        .with("attempt", 3)
        .with("ratio", f64::NAN)
        .with("host", "db\"1");
    let exception = LogException::new(ConnectError);
    logger.log_with(
        LogLevel::Error,
        &LogEventId::new(12),
        text,
        &props,
        Some(&exception),
    );

    let line = &writer.lines()[0];
    assert!(!line.contains('\n'));
    let value: serde_json::Value = serde_json::from_str(line).expect("valid JSON");
    assert_eq!(value["message"], text);
    assert_eq!(value["logger"], "app.net");
    assert_eq!(value["level"], "ERROR");
    assert_eq!(value["event_id"]["id"], 12);
    assert_eq!(value["properties"]["attempt"], 3);
    assert_eq!(value["properties"]["ratio"], "NaN");
    assert_eq!(value["properties"]["host"], "db\"1");
    assert_eq!(value["exception"]["message"], "connection refused");
    assert!(value["sequence_id"].as_u64().unwrap() >= 1);
}

#[test]
fn test_sequence_ids_increase_per_manager() {
    let writer = memory();
    let manager = sync_manager(
        LogManagerConfig::new().with_root(LoggerConfig::root().with_writer(writer.clone())),
    );
    let a = manager.get_logger("a").unwrap();
    let b = manager.get_logger("b").unwrap();
    a.info("1");
    b.info("2");
    a.info("3");

    let ids: Vec<u64> = writer.messages().iter().map(|m| m.sequence_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_failing_writer_is_isolated() {
    struct Broken {
        core: rust_log_engine::core::LogWriterCore,
    }

    impl LogWriter for Broken {
        fn core(&self) -> &rust_log_engine::core::LogWriterCore {
            &self.core
        }

        fn log(&self, message: &rust_log_engine::core::LogMessage<'_>) -> rust_log_engine::Result<()> {
            if message.text == "panic" {
                panic!("writer exploded");
            }
            Err(LoggerError::writer("always fails"))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    let healthy = memory();
    let broken = Arc::new(Broken {
        core: Default::default(),
    });
    let manager = sync_manager(
        LogManagerConfig::new().with_root(
            LoggerConfig::root()
                .with_writer(broken)
                .with_writer(healthy.clone()),
        ),
    );
    let logger = manager.get_logger("app").unwrap();
    logger.info("error");
    logger.info("panic");

    assert_eq!(healthy.lines(), vec!["error", "panic"]);
    assert_eq!(manager.metrics().error_count(), 2);
    assert_eq!(manager.diagnostics().error_count, 2);
}

#[test]
fn test_async_manager_delivers_everything_on_flush() {
    let writer = memory();
    let manager = LogManager::with_config(
        LogManagerConfig::new()
            .with_queue_capacity(4096)
            .with_root(LoggerConfig::root().with_writer(writer.clone())),
    )
    .unwrap();
    let logger = manager.get_logger("app").unwrap();

    for i in 0..500 {
        info!(logger, "message {}", i);
    }
    manager.flush().unwrap();

    let lines = writer.lines();
    assert_eq!(lines.len(), 500);
    assert_eq!(lines[0], "message 0");
    assert_eq!(lines[499], "message 499");
    assert!(writer.flush_count() >= 1);

    let diagnostics = manager.diagnostics();
    assert!(diagnostics.is_async);
    assert_eq!(diagnostics.queue_length, 0);
    assert_eq!(diagnostics.processed_messages, 500);
    assert_eq!(diagnostics.logger_count, 1);
}

#[cfg(feature = "file")]
#[test]
fn test_file_writer_through_manager() {
    use std::fs;
    use tempfile::TempDir;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("service.log");
    let file = Arc::new(
        FileLogWriter::new(
            FileLogWriterOptions::new(&path)
                .with_formatter(JsonFormatter::new())
                .with_max_file_size(4096)
                .with_retained_file_count(3),
        )
        .expect("Failed to create file writer"),
    );

    let manager = LogManager::with_config(
        LogManagerConfig::new().with_root(LoggerConfig::root().with_writer(file.clone())),
    )
    .unwrap();
    let logger = manager.get_logger("service").unwrap();
    for i in 0..100 {
        warn!(logger, "disk usage at {}%", i);
    }
    manager.shutdown().unwrap();

    let mut total = 0;
    for archive in file.archives().iter().chain(std::iter::once(&path)) {
        let content = fs::read_to_string(archive).expect("Failed to read log file");
        for line in content.lines() {
            let value: serde_json::Value = serde_json::from_str(line).expect("valid JSON line");
            assert_eq!(value["level"], "WARN");
            total += 1;
        }
        assert!(content.len() <= 4096);
    }
    assert!(file.archives().len() <= 3);
    assert!(total > 0 && total <= 100);
}
