//! Append-only event log trait and implementations.
//!
//! Provides the `EventLog` trait for abstracting the metrics log, a
//! `FileEventLog` backed by a newline-delimited JSON file, and an
//! `InMemoryEventLog` for development and testing.
//!
//! Readers are best-effort: blank, unparsable or structurally invalid lines
//! are skipped without error.

use crate::models::{LogRecord, RecordValidationError};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors that can occur during event log operations.
#[derive(Debug, Error)]
pub enum EventLogError {
    /// The log is missing or cannot be opened for reading.
    #[error("Failed to read event log {path}: {source}")]
    Read {
        /// Path of the log file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The record could not be written.
    #[error("Failed to append to event log {path}: {source}")]
    Write {
        /// Path of the log file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The record could not be serialized.
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The record would not read back, e.g. a non-finite value.
    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] RecordValidationError),

    /// Failed to acquire lock on the log.
    #[error("Failed to acquire lock on event log")]
    LockError,
}

/// A lazy, finite sequence of parsed records in log order.
///
/// Each call to [`EventLog::read_all`] starts a fresh pass over the log.
pub struct Records {
    inner: Box<dyn Iterator<Item = LogRecord> + Send>,
}

impl Records {
    fn new(inner: impl Iterator<Item = LogRecord> + Send + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }

    /// A sequence with no records.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }
}

impl Iterator for Records {
    type Item = LogRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl std::fmt::Debug for Records {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Records").finish_non_exhaustive()
    }
}

/// Trait for event log implementations.
///
/// Implementations must be thread-safe (Send + Sync) and must never let two
/// concurrent appends produce a merged or split line.
pub trait EventLog: Send + Sync {
    /// Appends one record as a single line.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is invalid or cannot be serialized or written.
    fn append(&self, record: &LogRecord) -> Result<(), EventLogError>;

    /// Returns every parseable record, in log order.
    ///
    /// # Errors
    ///
    /// Returns an error if the log is missing or unreadable.
    fn read_all(&self) -> Result<Records, EventLogError>;
}

/// Serializes a valid record to its single-line form, without the newline.
fn encode_record(record: &LogRecord) -> Result<String, EventLogError> {
    record.validate_record()?;
    Ok(serde_json::to_string(record)?)
}

/// File-backed event log.
///
/// Appends open the file in append mode and write each line with a single
/// `write_all` while holding the writer lock.
#[derive(Debug)]
pub struct FileEventLog {
    path: PathBuf,
    writer: Mutex<Option<File>>,
}

impl FileEventLog {
    /// Creates an event log for the file at `path`. Nothing is opened until first use.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(None),
        }
    }

    /// Creates a new file event log wrapped in an Arc.
    #[must_use]
    pub fn new_shared(path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self::new(path))
    }

    /// The path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_for_append(&self) -> std::io::Result<File> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new().create(true).append(true).open(&self.path)
    }
}

impl EventLog for FileEventLog {
    fn append(&self, record: &LogRecord) -> Result<(), EventLogError> {
        let mut line = encode_record(record)?;
        line.push('\n');
        let write_err = |source| EventLogError::Write {
            path: self.path.clone(),
            source,
        };

        let mut writer = self.writer.lock().map_err(|_| EventLogError::LockError)?;
        if writer.is_none() {
            *writer = Some(self.open_for_append().map_err(write_err)?);
        }
        if let Some(file) = writer.as_mut() {
            file.write_all(line.as_bytes()).map_err(write_err)?;
            file.flush().map_err(write_err)?;
        }
        Ok(())
    }

    fn read_all(&self) -> Result<Records, EventLogError> {
        let file = File::open(&self.path).map_err(|source| EventLogError::Read {
            path: self.path.clone(),
            source,
        })?;

        let lines = BufReader::new(file).split(b'\n').map_while(Result::ok);
        Ok(Records::new(
            lines.filter_map(|line| LogRecord::parse_line(&line)),
        ))
    }
}

/// In-memory event log implementation.
///
/// Stores raw lines so that foreign or malformed lines can be replayed
/// through the same best-effort reader as the file log.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl InMemoryEventLog {
    /// Creates a new empty in-memory event log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory event log wrapped in an Arc.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Appends a raw line verbatim, without validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn append_raw(&self, line: impl Into<String>) -> Result<(), EventLogError> {
        let mut lines = self.lines.lock().map_err(|_| EventLogError::LockError)?;
        lines.push(line.into());
        Ok(())
    }

    /// Returns the number of stored lines, including malformed ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn line_count(&self) -> Result<usize, EventLogError> {
        Ok(self
            .lines
            .lock()
            .map_err(|_| EventLogError::LockError)?
            .len())
    }
}

impl EventLog for InMemoryEventLog {
    fn append(&self, record: &LogRecord) -> Result<(), EventLogError> {
        self.append_raw(encode_record(record)?)
    }

    fn read_all(&self) -> Result<Records, EventLogError> {
        let lines = self
            .lines
            .lock()
            .map_err(|_| EventLogError::LockError)?
            .clone();
        Ok(Records::new(
            lines
                .into_iter()
                .filter_map(|line| LogRecord::parse_line(line.as_bytes())),
        ))
    }
}
