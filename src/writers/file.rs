//! Durable file writer with size and interval rotation
//!
//! The active file is always the configured path. On rotation it is renamed to an archive
//! next to it, optionally gzip-compressed, and archives beyond the retention count are
//! deleted oldest first. Archives an earlier run left under the same naming scheme count
//! toward retention; other files are never deleted, and existing files are never
//! overwritten.

use crate::core::error::{LoggerError, Result};
use crate::core::log_level::LogLevel;
use crate::core::message::LogMessage;
use crate::core::timestamp::{is_valid_pattern, Clock, SystemClock};
use crate::core::writer::{LogWriter, LogWriterCore};
use crate::formatters::{LogFormatter, RenderBuffer, TemplateFormatter};
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, Timelike, Utc};
use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Default archive timestamp pattern
pub const DEFAULT_ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

const COMPRESSION_CHUNK: usize = 64 * 1024;

/// Calendar period after which the active file is rotated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RollingInterval {
    #[default]
    None,
    Hourly,
    Daily,
    Monthly,
}

impl RollingInterval {
    /// Start of the period containing `now`, in UTC or local wall time
    pub fn period_start(self, now: DateTime<Utc>, local_time: bool) -> Option<NaiveDateTime> {
        let wall = if local_time {
            now.with_timezone(&Local).naive_local()
        } else {
            now.naive_utc()
        };
        let date = wall.date();
        match self {
            RollingInterval::None => None,
            RollingInterval::Hourly => date.and_hms_opt(wall.hour(), 0, 0),
            RollingInterval::Daily => date.and_hms_opt(0, 0, 0),
            RollingInterval::Monthly => {
                NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?.and_hms_opt(0, 0, 0)
            }
        }
    }
}

/// What a write failure does to the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FileFailureMode {
    /// Return the error so it is counted as a processing error
    #[default]
    Propagate,
    /// Drop the message, close the file and reopen it for the next message
    Ignore,
}

/// Passed to the failure callback
#[derive(Debug)]
pub struct FileFailure<'a> {
    pub path: &'a Path,
    pub error: &'a LoggerError,
    /// `true` when the writer will reopen the file for the next message
    pub will_retry: bool,
}

pub type FileFailureCallback = Arc<dyn Fn(&FileFailure<'_>) + Send + Sync>;

/// Inputs to a custom archive naming function
#[derive(Debug, Clone)]
pub struct ArchiveNameContext<'a> {
    /// The active file path
    pub path: &'a Path,
    /// Active file name without its extension
    pub stem: &'a str,
    pub extension: Option<&'a str>,
    /// 1 for the first rotation of this writer
    pub rotation: u64,
    pub timestamp: DateTime<Utc>,
    /// Start of the period being closed, for interval rotation
    pub period_start: Option<NaiveDateTime>,
}

/// Returns a bare archive file name, placed next to the active file
pub type ArchiveNameFn = Arc<dyn Fn(&ArchiveNameContext<'_>) -> String + Send + Sync>;

/// Configuration of a [`FileLogWriter`]
///
/// # Example
///
/// ```
/// use rust_log_engine::writers::file::{FileFailureMode, FileLogWriterOptions, RollingInterval};
///
/// let options = FileLogWriterOptions::new("logs/app.log")
///     .with_max_file_size(10 * 1024 * 1024)
///     .with_rolling_interval(RollingInterval::Daily)
///     .with_retained_file_count(7)
///     .with_compression(true)
///     .with_failure_mode(FileFailureMode::Ignore);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct FileLogWriterOptions {
    pub path: PathBuf,
    /// Rotate before a write would push a non-empty file past this size
    pub max_file_size: Option<u64>,
    pub rolling_interval: RollingInterval,
    /// Archives kept; `None` keeps every archive
    pub retained_file_count: Option<usize>,
    /// strftime pattern for archive names; `None` numbers archives instead
    pub archive_timestamp_format: Option<String>,
    pub archive_name: Option<ArchiveNameFn>,
    pub failure_mode: FileFailureMode,
    pub on_failure: Option<FileFailureCallback>,
    /// `sync_data` after every flush
    pub durable_flush: bool,
    /// Flush after every message
    pub auto_flush: bool,
    /// Use local time for periods and archive timestamps
    pub local_time: bool,
    pub clock: Arc<dyn Clock>,
    pub formatter: Arc<dyn LogFormatter>,
    /// Gzip archives after rotation
    pub compress_archives: bool,
    /// Hold an exclusive advisory lock on the active file
    pub exclusive_lock: bool,
}

impl FileLogWriterOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_file_size: None,
            rolling_interval: RollingInterval::None,
            retained_file_count: None,
            archive_timestamp_format: Some(DEFAULT_ARCHIVE_TIMESTAMP_FORMAT.to_string()),
            archive_name: None,
            failure_mode: FileFailureMode::Propagate,
            on_failure: None,
            durable_flush: false,
            auto_flush: true,
            local_time: false,
            clock: Arc::new(SystemClock),
            formatter: Arc::new(TemplateFormatter::default()),
            compress_archives: false,
            exclusive_lock: false,
        }
    }

    #[must_use]
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    #[must_use]
    pub fn with_rolling_interval(mut self, interval: RollingInterval) -> Self {
        self.rolling_interval = interval;
        self
    }

    #[must_use]
    pub fn with_retained_file_count(mut self, count: usize) -> Self {
        self.retained_file_count = Some(count);
        self
    }

    /// Archive timestamp pattern, or `None` for `<stem>.<rotation>.<ext>` names
    #[must_use]
    pub fn with_archive_timestamp_format(mut self, pattern: Option<&str>) -> Self {
        self.archive_timestamp_format = pattern.map(str::to_string);
        self
    }

    #[must_use]
    pub fn with_archive_name<F>(mut self, name: F) -> Self
    where
        F: Fn(&ArchiveNameContext<'_>) -> String + Send + Sync + 'static,
    {
        self.archive_name = Some(Arc::new(name));
        self
    }

    #[must_use]
    pub fn with_failure_mode(mut self, mode: FileFailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    #[must_use]
    pub fn with_failure_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&FileFailure<'_>) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn with_durable_flush(mut self, durable: bool) -> Self {
        self.durable_flush = durable;
        self
    }

    #[must_use]
    pub fn with_auto_flush(mut self, auto_flush: bool) -> Self {
        self.auto_flush = auto_flush;
        self
    }

    #[must_use]
    pub fn with_local_time(mut self, local_time: bool) -> Self {
        self.local_time = local_time;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: impl LogFormatter + 'static) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress_archives = compress;
        self
    }

    #[must_use]
    pub fn with_exclusive_lock(mut self, lock: bool) -> Self {
        self.exclusive_lock = lock;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.path.file_name().is_none() {
            return Err(LoggerError::config(
                "FileLogWriter",
                format!("'{}' does not name a file", self.path.display()),
            ));
        }
        if self.max_file_size == Some(0) {
            return Err(LoggerError::config(
                "FileLogWriter",
                "max file size must be greater than zero",
            ));
        }
        if let Some(pattern) = &self.archive_timestamp_format {
            if pattern.is_empty() || !is_valid_pattern(pattern) {
                return Err(LoggerError::config(
                    "FileLogWriter",
                    format!("invalid archive timestamp format '{}'", pattern),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FileLogWriterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLogWriterOptions")
            .field("path", &self.path)
            .field("max_file_size", &self.max_file_size)
            .field("rolling_interval", &self.rolling_interval)
            .field("retained_file_count", &self.retained_file_count)
            .field("archive_timestamp_format", &self.archive_timestamp_format)
            .field("failure_mode", &self.failure_mode)
            .field("durable_flush", &self.durable_flush)
            .field("auto_flush", &self.auto_flush)
            .field("compress_archives", &self.compress_archives)
            .field("exclusive_lock", &self.exclusive_lock)
            .finish()
    }
}

/// Writes formatted lines to a file, rotating by size and calendar period
///
/// # Examples
///
/// ```no_run
/// use rust_log_engine::writers::file::{FileLogWriter, FileLogWriterOptions};
///
/// let writer = FileLogWriter::new(
///     FileLogWriterOptions::new("/var/log/app.log")
///         .with_max_file_size(50 * 1024 * 1024)
///         .with_retained_file_count(5),
/// )
/// .unwrap();
/// ```
pub struct FileLogWriter {
    core: LogWriterCore,
    options: FileLogWriterOptions,
    state: Mutex<FileState>,
}

struct FileState {
    render: RenderBuffer,
    output: FileOutput,
    disposed: bool,
}

struct FileOutput {
    active: Option<ActiveFile>,
    rotations: u64,
    archives: VecDeque<PathBuf>,
}

struct ActiveFile {
    writer: BufWriter<File>,
    size: u64,
    period: Option<NaiveDateTime>,
}

impl FileLogWriter {
    /// Validate `options` and open the file.
    ///
    /// # Errors
    ///
    /// Invalid options, and with [`FileFailureMode::Propagate`] any failure to open the
    /// file. A held exclusive lock is always reported as [`LoggerError::FileLockError`].
    pub fn new(options: FileLogWriterOptions) -> Result<Self> {
        options.validate()?;

        let (archives, rotations) = existing_archives(&options);
        let mut output = FileOutput {
            active: None,
            rotations,
            archives,
        };
        let now = options.clock.now();
        if let Err(e) = output.open(&options, now) {
            if options.failure_mode == FileFailureMode::Propagate
                || matches!(e, LoggerError::FileLockError { .. })
            {
                return Err(e);
            }
            report_failure(&options, &e, true);
        }

        Ok(Self {
            core: LogWriterCore::new(),
            options,
            state: Mutex::new(FileState {
                render: RenderBuffer::new(),
                output,
                disposed: false,
            }),
        })
    }

    #[must_use]
    pub fn with_minimum_level(self, level: LogLevel) -> Self {
        self.core.set_minimum_level(level);
        self
    }

    pub fn options(&self) -> &FileLogWriterOptions {
        &self.options
    }

    pub fn path(&self) -> &Path {
        &self.options.path
    }

    /// Bytes in the active file, including buffered ones
    pub fn current_size(&self) -> u64 {
        self.state
            .lock()
            .output
            .active
            .as_ref()
            .map_or(0, |active| active.size)
    }

    /// Archives created by this writer and still retained, oldest first
    pub fn archives(&self) -> Vec<PathBuf> {
        self.state.lock().output.archives.iter().cloned().collect()
    }

    pub fn rotation_count(&self) -> u64 {
        self.state.lock().output.rotations
    }

    /// Rotate now if the active file has content
    pub fn rotate(&self) -> Result<()> {
        let mut state = self.state.lock();
        let now = self.options.clock.now();
        state.output.ensure_open(&self.options, now)?;
        if state.output.active.as_ref().is_some_and(|a| a.size > 0) {
            state.output.rotate(&self.options, now)?;
        }
        Ok(())
    }

    fn handle_failure(&self, output: &mut FileOutput, error: LoggerError) -> Result<()> {
        let retry = self.options.failure_mode == FileFailureMode::Ignore
            && !matches!(error, LoggerError::InvalidArchiveName { .. });
        report_failure(&self.options, &error, retry);

        if retry {
            output.close();
            Ok(())
        } else {
            Err(error)
        }
    }
}

fn report_failure(options: &FileLogWriterOptions, error: &LoggerError, will_retry: bool) {
    if let Some(callback) = &options.on_failure {
        callback(&FileFailure {
            path: &options.path,
            error,
            will_retry,
        });
    }
}

impl LogWriter for FileLogWriter {
    fn core(&self) -> &LogWriterCore {
        &self.core
    }

    fn log(&self, message: &LogMessage<'_>) -> Result<()> {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(LoggerError::file_writer(
                self.options.path.display().to_string(),
                "writer is disposed",
            ));
        }

        let FileState { render, output, .. } = &mut *state;
        let line = render.render(self.options.formatter.as_ref(), message)?;
        match output.write_line(&self.options, line) {
            Ok(()) => Ok(()),
            Err(e) => self.handle_failure(output, e),
        }
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        match state.output.flush(&self.options) {
            Ok(()) => Ok(()),
            Err(e) => self.handle_failure(&mut state.output, e),
        }
    }

    fn dispose(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.disposed {
            return Ok(());
        }
        state.disposed = true;
        let result = state.output.flush(&self.options);
        state.output.close();
        result
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileLogWriter {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(active) = state.output.active.as_mut() {
            if let Err(e) = active.writer.flush() {
                eprintln!(
                    "[LOGGER ERROR] Failed to flush '{}' on drop: {}",
                    self.options.path.display(),
                    e
                );
            }
        }
    }
}

impl FileOutput {
    fn open(&mut self, options: &FileLogWriterOptions, now: DateTime<Utc>) -> Result<()> {
        let path = &options.path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "create log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                LoggerError::file_writer(path.display().to_string(), format!("Failed to open: {}", e))
            })?;

        if options.exclusive_lock && file.try_lock_exclusive().is_err() {
            return Err(LoggerError::file_lock(path.display().to_string()));
        }

        let size = file
            .metadata()
            .map_err(|e| {
                LoggerError::file_writer(
                    path.display().to_string(),
                    format!("Cannot access file metadata: {}", e),
                )
            })?
            .len();

        self.active = Some(ActiveFile {
            writer: BufWriter::new(file),
            size,
            period: options.rolling_interval.period_start(now, options.local_time),
        });
        Ok(())
    }

    fn ensure_open(&mut self, options: &FileLogWriterOptions, now: DateTime<Utc>) -> Result<()> {
        if self.active.is_none() {
            self.open(options, now)?;
        }
        Ok(())
    }

    fn needs_rotation(&self, options: &FileLogWriterOptions, incoming: u64, now: DateTime<Utc>) -> bool {
        let Some(active) = &self.active else {
            return false;
        };
        let over_size = options
            .max_file_size
            .is_some_and(|max| active.size > 0 && active.size + incoming > max);
        let new_period = options.rolling_interval != RollingInterval::None
            && options.rolling_interval.period_start(now, options.local_time) != active.period;
        over_size || new_period
    }

    fn write_line(&mut self, options: &FileLogWriterOptions, line: &[u8]) -> Result<()> {
        let now = options.clock.now();
        let incoming = line.len() as u64 + 1;

        self.ensure_open(options, now)?;
        if self.needs_rotation(options, incoming, now) {
            self.rotate(options, now)?;
        }

        let path = &options.path;
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| LoggerError::writer("File writer not initialized"))?;
        active
            .writer
            .write_all(line)
            .and_then(|()| active.writer.write_all(b"\n"))
            .map_err(|e| {
                LoggerError::file_writer(
                    path.display().to_string(),
                    format!("Failed to write log entry: {}", e),
                )
            })?;
        active.size += incoming;

        if options.auto_flush {
            self.flush(options)?;
        }
        Ok(())
    }

    fn flush(&mut self, options: &FileLogWriterOptions) -> Result<()> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        let path = &options.path;
        active.writer.flush().map_err(|e| {
            LoggerError::file_writer(path.display().to_string(), format!("Failed to flush: {}", e))
        })?;
        if options.durable_flush {
            active.writer.get_ref().sync_data().map_err(|e| {
                LoggerError::file_writer(path.display().to_string(), format!("Failed to sync: {}", e))
            })?;
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut active) = self.active.take() {
            let _ = active.writer.flush();
        }
    }

    /// Archive the active file and open a fresh one
    fn rotate(&mut self, options: &FileLogWriterOptions, now: DateTime<Utc>) -> Result<()> {
        let path = &options.path;
        let Some(active) = self.active.as_ref() else {
            return self.open(options, now);
        };
        if active.size == 0 {
            // Nothing to archive, only the period changed
            self.close();
            return self.open(options, now);
        }

        let rotation = self.rotations + 1;
        let file_name = archive_file_name(options, rotation, now, active.period)?;
        let directory = path.parent().unwrap_or_else(|| Path::new(""));
        let archive = free_archive_path(directory, &file_name);

        if let Some(mut active) = self.active.take() {
            active.writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        fs::rename(path, &archive).map_err(|e| {
            LoggerError::file_rotation(
                path.display().to_string(),
                format!("Failed to rotate current log file: {}", e),
            )
        })?;
        self.rotations = rotation;

        let archive = if options.compress_archives {
            match compress_file(&archive) {
                Ok(compressed) => compressed,
                Err(e) => {
                    eprintln!(
                        "[WARN] Failed to compress archive {}: {}. Keeping it uncompressed.",
                        archive.display(),
                        e
                    );
                    archive
                }
            }
        } else {
            archive
        };
        self.archives.push_back(archive);
        self.enforce_retention(options);

        self.open(options, now)
    }

    fn enforce_retention(&mut self, options: &FileLogWriterOptions) {
        let Some(retained) = options.retained_file_count else {
            return;
        };
        while self.archives.len() > retained {
            let Some(oldest) = self.archives.pop_front() else {
                break;
            };
            if let Err(e) = fs::remove_file(&oldest) {
                eprintln!("[WARN] Failed to remove old archive {}: {}", oldest.display(), e);
            }
        }
    }
}

fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, Some(extension)),
        _ => (name, None),
    }
}

fn join_name(stem: &str, middle: &str, extension: Option<&str>) -> String {
    match extension {
        Some(extension) => format!("{}.{}.{}", stem, middle, extension),
        None => format!("{}.{}", stem, middle),
    }
}

fn archive_file_name(
    options: &FileLogWriterOptions,
    rotation: u64,
    now: DateTime<Utc>,
    period_start: Option<NaiveDateTime>,
) -> Result<String> {
    let file_name = options
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("app.log");
    let (stem, extension) = split_name(file_name);

    if let Some(name_fn) = &options.archive_name {
        let name = name_fn(&ArchiveNameContext {
            path: &options.path,
            stem,
            extension,
            rotation,
            timestamp: now,
            period_start,
        });
        validate_archive_name(&name)?;
        return Ok(name);
    }

    let middle = match &options.archive_timestamp_format {
        Some(pattern) if options.local_time => {
            now.with_timezone(&Local).format(pattern).to_string()
        }
        Some(pattern) => now.format(pattern).to_string(),
        None => rotation.to_string(),
    };
    Ok(join_name(stem, &middle, extension))
}

/// Archives an earlier run left next to the active file, oldest first, plus the highest
/// rotation number among them.
///
/// Only names the default scheme could have produced are picked up: `<stem>.<middle>.<ext>`
/// with an optional collision suffix and `.gz`, where the middle is a rotation number or
/// has the shape of the timestamp pattern. Nothing is discovered with a custom naming
/// function.
fn existing_archives(options: &FileLogWriterOptions) -> (VecDeque<PathBuf>, u64) {
    let mut archives = VecDeque::new();
    if options.archive_name.is_some() {
        return (archives, 0);
    }
    let Some(file_name) = options.path.file_name().and_then(|n| n.to_str()) else {
        return (archives, 0);
    };
    let (stem, extension) = split_name(file_name);
    let directory = match options.path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let Ok(entries) = fs::read_dir(directory) else {
        return (archives, 0);
    };

    let reference = options.archive_timestamp_format.as_deref().map(|pattern| {
        NaiveDate::from_ymd_opt(2000, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|t| t.format(pattern).to_string())
            .unwrap_or_default()
    });

    let mut highest = 0;
    let mut found: Vec<(SystemTime, String)> = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(middle) = archive_middle(name, stem, extension) else {
            continue;
        };
        let matched = match &reference {
            Some(reference) => {
                same_shape(middle, reference)
                    || same_shape(strip_collision_suffix(middle), reference)
            }
            None => match strip_collision_suffix(middle).parse::<u64>() {
                Ok(rotation) => {
                    highest = highest.max(rotation);
                    true
                }
                Err(_) => false,
            },
        };
        if !matched || !entry.file_type().is_ok_and(|t| t.is_file()) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        found.push((modified, name.to_string()));
    }

    found.sort();
    archives.extend(found.into_iter().map(|(_, name)| directory.join(name)));
    (archives, highest)
}

/// `middle` of `<stem>.<middle>.<ext>`, with or without a trailing `.gz`
fn archive_middle<'n>(name: &'n str, stem: &str, extension: Option<&str>) -> Option<&'n str> {
    let name = name.strip_suffix(".gz").unwrap_or(name);
    let rest = name.strip_prefix(stem)?.strip_prefix('.')?;
    let middle = match extension {
        Some(extension) => rest.strip_suffix(extension)?.strip_suffix('.')?,
        None => rest,
    };
    (!middle.is_empty()).then_some(middle)
}

/// `<middle>.<n>` back to `<middle>`
fn strip_collision_suffix(middle: &str) -> &str {
    match middle.rsplit_once('.') {
        Some((base, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => middle,
    }
}

/// Digits where `reference` has digits, identical bytes elsewhere
fn same_shape(text: &str, reference: &str) -> bool {
    !reference.is_empty()
        && text.len() == reference.len()
        && text.bytes().zip(reference.bytes()).all(|(t, r)| {
            if r.is_ascii_digit() {
                t.is_ascii_digit()
            } else {
                t == r
            }
        })
}

/// Archive names must be bare file names
pub fn validate_archive_name(name: &str) -> Result<()> {
    let problem = if name.is_empty() {
        Some("must not be empty")
    } else if name == "." || name == ".." {
        Some("must not be a relative directory")
    } else if name.contains(['/', '\\', '\0']) {
        Some("must not contain path separators")
    } else {
        None
    };
    match problem {
        Some(message) => Err(LoggerError::archive_name(name, message)),
        None => Ok(()),
    }
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".gz");
    PathBuf::from(name)
}

/// First of `name`, `<stem>.1.<ext>`, `<stem>.2.<ext>`, ... where neither the file nor its
/// `.gz` variant exists
fn free_archive_path(directory: &Path, name: &str) -> PathBuf {
    let taken = |candidate: &Path| candidate.exists() || gz_path(candidate).exists();

    let candidate = directory.join(name);
    if !taken(&candidate) {
        return candidate;
    }
    let (stem, extension) = split_name(name);
    let mut suffix = 1u64;
    loop {
        let candidate = directory.join(join_name(stem, &suffix.to_string(), extension));
        if !taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Gzip `path` into `<path>.gz`, streaming through a temporary file.
///
/// The original is removed only after the compressed file is complete.
fn compress_file(path: &Path) -> Result<PathBuf> {
    use std::io::{BufReader, Read};

    let gz = gz_path(path);
    let mut temp_name = OsString::from(gz.as_os_str());
    temp_name.push(".tmp");
    let temp = PathBuf::from(temp_name);

    let input = File::open(path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to open file for compression: {}", path.display()),
            e,
        )
    })?;
    let mut reader = BufReader::with_capacity(COMPRESSION_CHUNK, input);

    let output = File::create(&temp).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to create temporary compressed file: {}", temp.display()),
            e,
        )
    })?;
    let mut encoder = flate2::write::GzEncoder::new(
        BufWriter::with_capacity(COMPRESSION_CHUNK, output),
        flate2::Compression::default(),
    );

    let copied = (|| -> std::io::Result<()> {
        let mut chunk = vec![0u8; COMPRESSION_CHUNK];
        loop {
            let read = reader.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            encoder.write_all(&chunk[..read])?;
        }
        encoder.finish()?.flush()
    })();
    if let Err(e) = copied {
        let _ = fs::remove_file(&temp);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress {}", path.display()),
            e,
        ));
    }

    fs::rename(&temp, &gz).map_err(|e| {
        let _ = fs::remove_file(&temp);
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to rename compressed file to: {}", gz.display()),
            e,
        )
    })?;

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[WARN] Compression succeeded but failed to remove original file {}: {}. \
             Both compressed and uncompressed versions exist.",
            path.display(),
            e
        );
    }
    Ok(gz)
}
