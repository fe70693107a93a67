//! Rolling Logger
//!
//! Daily rolling file logger with a circular buffer of recent lines.
//! Installs itself as the global `tracing` subscriber; everything logged
//! through `tracing` macros lands in `{app_name}-{YYYY-MM-DD}.log` and in
//! the in-memory buffer returned by `recent_lines()`.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use chrono::{Local, NaiveDate};
use thiserror::Error;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Number of daily log files kept on disk
pub const MAX_LOG_FILES: usize = 7;

/// Number of lines kept in memory
pub const RECENT_CAPACITY: usize = 500;

/// Logger errors
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Log I/O failed for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Logger already initialized")]
    AlreadyInitialized,

    #[error("Logger not initialized")]
    NotInitialized,
}

/// Circular buffer of recent log lines
#[derive(Debug)]
pub struct RecentLines {
    lines: VecDeque<String>,
    capacity: usize,
    /// Bytes of a line not yet terminated by '\n'
    partial: String,
}

impl RecentLines {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            partial: String::new(),
        }
    }

    pub fn push_bytes(&mut self, buf: &[u8]) {
        self.partial.push_str(&String::from_utf8_lossy(buf));
        while let Some(idx) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=idx).collect();
            self.push_line(line.trim_end_matches(['\n', '\r']).to_string());
        }
    }

    fn push_line(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }
}

/// Writer shared by every formatted event: tees into the log file and the
/// recent-lines buffer
#[derive(Clone, Debug)]
pub struct RollingWriter {
    file: Arc<Mutex<File>>,
    recent: Arc<Mutex<RecentLines>>,
}

impl RollingWriter {
    pub fn new(file: File, capacity: usize) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
            recent: Arc::new(Mutex::new(RecentLines::new(capacity))),
        }
    }

    pub fn recent(&self) -> Vec<String> {
        self.recent
            .lock()
            .map(|recent| recent.lines())
            .unwrap_or_default()
    }
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut recent) = self.recent.lock() {
            recent.push_bytes(buf);
        }
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        file.flush()
    }
}

impl<'a> MakeWriter<'a> for RollingWriter {
    type Writer = RollingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

struct LoggerHandle {
    writer: RollingWriter,
}

static LOGGER: OnceLock<LoggerHandle> = OnceLock::new();

/// File name of the log for `app_name` on `date`
pub fn log_file_name(app_name: &str, date: NaiveDate) -> String {
    format!("{}-{}.log", app_name, date.format("%Y-%m-%d"))
}

/// Open (append) today's log file and wrap it in a writer
pub fn open_writer(log_dir: &Path, app_name: &str, capacity: usize) -> Result<(RollingWriter, PathBuf), LoggerError> {
    fs::create_dir_all(log_dir).map_err(|source| LoggerError::Io {
        path: log_dir.to_path_buf(),
        source,
    })?;

    let path = log_dir.join(log_file_name(app_name, Local::now().date_naive()));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| LoggerError::Io { path: path.clone(), source })?;

    Ok((RollingWriter::new(file, capacity), path))
}

/// Delete all but the newest `keep` log files of `app_name`.
/// Returns the removed paths.
pub fn prune_old_logs(log_dir: &Path, app_name: &str, keep: usize) -> Result<Vec<PathBuf>, LoggerError> {
    let entries = fs::read_dir(log_dir).map_err(|source| LoggerError::Io {
        path: log_dir.to_path_buf(),
        source,
    })?;

    let prefix = format!("{}-", app_name);
    let mut logs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(&prefix) && name.ends_with(".log"))
                .unwrap_or(false)
        })
        .collect();

    // Dates in the names sort lexicographically
    logs.sort();

    let excess = logs.len().saturating_sub(keep);
    let removed: Vec<PathBuf> = logs.into_iter().take(excess).collect();
    for path in &removed {
        fs::remove_file(path).map_err(|source| LoggerError::Io {
            path: path.clone(),
            source,
        })?;
    }
    Ok(removed)
}

/// Install the rolling logger as the global tracing subscriber.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`.
/// Returns the path of today's log file.
pub fn init_logger(log_dir: PathBuf, app_name: &str) -> Result<PathBuf, LoggerError> {
    if LOGGER.get().is_some() {
        return Err(LoggerError::AlreadyInitialized);
    }

    let (writer, path) = open_writer(&log_dir, app_name, RECENT_CAPACITY)?;
    prune_old_logs(&log_dir, app_name, MAX_LOG_FILES)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(writer.clone()))
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialized)?;

    LOGGER
        .set(LoggerHandle { writer })
        .map_err(|_| LoggerError::AlreadyInitialized)?;

    tracing::info!(log_file = %path.display(), "Rolling logger initialized");
    Ok(path)
}

pub fn info(msg: &str) -> Result<(), LoggerError> {
    LOGGER.get().ok_or(LoggerError::NotInitialized)?;
    tracing::info!("{}", msg);
    Ok(())
}

pub fn error(msg: &str) -> Result<(), LoggerError> {
    LOGGER.get().ok_or(LoggerError::NotInitialized)?;
    tracing::error!("{}", msg);
    Ok(())
}

/// Most recent log lines, oldest first
pub fn recent_lines() -> Vec<String> {
    LOGGER
        .get()
        .map(|handle| handle.writer.recent())
        .unwrap_or_default()
}
