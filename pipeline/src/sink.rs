//! Result Sink: the append-only record of fully handled messages.
//!
//! Each line is `<RFC 3339 UTC timestamp, nanoseconds> | <payload>`. A line in
//! this file is the only evidence that a message made it through the pipeline.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;
use tokio::fs;

const SEPARATOR: &str = " | ";

/// Errors raised by a Result Sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to prepare output directory {path}: {source}")]
    Prepare { path: PathBuf, source: io::Error },

    #[error("failed to append to {path}: {source}")]
    Append { path: PathBuf, source: io::Error },

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("malformed record line: {0:?}")]
    Malformed(String),
}

/// A message that completed processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedRecord {
    pub received_at: DateTime<Utc>,
    pub payload: String,
}

impl ProcessedRecord {
    /// Stamp `payload` with the current time.
    pub fn now(payload: impl Into<String>) -> Self {
        Self {
            received_at: Utc::now(),
            payload: payload.into(),
        }
    }
}

impl fmt::Display for ProcessedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.received_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            SEPARATOR,
            self.payload
        )
    }
}

impl FromStr for ProcessedRecord {
    type Err = SinkError;

    /// Parse one sink line. The timestamp never contains the separator, so
    /// the payload is everything after its first occurrence.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (timestamp, payload) = line
            .split_once(SEPARATOR)
            .ok_or_else(|| SinkError::Malformed(line.to_string()))?;

        let received_at = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|_| SinkError::Malformed(line.to_string()))?
            .with_timezone(&Utc);

        Ok(Self {
            received_at,
            payload: payload.to_string(),
        })
    }
}

/// Durable, append-only destination for processed records.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Append one record. A failure here is final for that message.
    async fn append(&self, record: &ProcessedRecord) -> Result<(), SinkError>;
}

/// Plain-text file sink.
///
/// Every append opens the file in append mode and issues a single write of
/// the whole line, so several worker processes can share one file without
/// interleaving lines.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    /// Prepare the parent directory of `path`. The file itself is created on
    /// first append and never truncated.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| SinkError::Prepare {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResultSink for FileSink {
    async fn append(&self, record: &ProcessedRecord) -> Result<(), SinkError> {
        let path = self.path.clone();
        let mut line = record.to_string();
        line.push('\n');

        // One write(2) per line on an O_APPEND descriptor
        let written = tokio::task::spawn_blocking(move || {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            file.write_all(line.as_bytes())
        })
        .await
        .unwrap_or_else(|e| Err(io::Error::other(e)));

        written.map_err(|source| SinkError::Append {
            path: self.path.clone(),
            source,
        })
    }
}

/// Read every record in a sink file, skipping blank lines.
pub async fn read_records(path: impl AsRef<Path>) -> Result<Vec<ProcessedRecord>, SinkError> {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(SinkError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    contents
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn record(payload: &str) -> ProcessedRecord {
        ProcessedRecord {
            received_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
                + chrono::Duration::nanoseconds(123_456_789),
            payload: payload.to_string(),
        }
    }

    #[test]
    fn test_record_line_format() {
        let line = record("hello from curl").to_string();
        assert_eq!(line, "2024-05-01T12:30:00.123456789Z | hello from curl");
    }

    #[test]
    fn test_record_parse_keeps_separator_in_payload() {
        let line = "2024-05-01T12:30:00.123456789Z | a | b";
        let parsed: ProcessedRecord = line.parse().unwrap();

        assert_eq!(parsed.payload, "a | b");
        assert_eq!(parsed, record("a | b"));
    }

    #[test]
    fn test_record_parse_rejects_garbage() {
        assert!("no separator here".parse::<ProcessedRecord>().is_err());
        assert!("yesterday | hello".parse::<ProcessedRecord>().is_err());
    }

    #[tokio::test]
    async fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/processed.log");

        let sink = FileSink::open(&path).await.unwrap();
        sink.append(&record("hello")).await.unwrap();

        let records = read_records(&path).await.unwrap();
        assert_eq!(records, vec![record("hello")]);
    }

    #[tokio::test]
    async fn test_append_preserves_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.log");

        FileSink::open(&path).await.unwrap().append(&record("one")).await.unwrap();
        // A fresh sink on the same file behaves like a restarted worker
        FileSink::open(&path).await.unwrap().append(&record("two")).await.unwrap();

        let payloads: Vec<_> = read_records(&path)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.payload)
            .collect();
        assert_eq!(payloads, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.log");
        let sink = Arc::new(FileSink::open(&path).await.unwrap());
        let big = "x".repeat(2048);

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let sink = Arc::clone(&sink);
                let payload = format!("{}-{}", i, big);
                tokio::spawn(async move { sink.append(&ProcessedRecord::now(payload)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let records = read_records(&path).await.unwrap();
        assert_eq!(records.len(), 32);
        assert!(records.iter().all(|r| r.payload.ends_with(&big)));
    }

    #[tokio::test]
    async fn test_append_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone/processed.log");
        let sink = FileSink::open(&path).await.unwrap();
        fs::remove_dir(dir.path().join("gone")).await.unwrap();

        let err = sink.append(&record("lost")).await.unwrap_err();
        assert!(matches!(err, SinkError::Append { .. }));
    }

    #[tokio::test]
    async fn test_read_records_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let records = read_records(dir.path().join("absent.log")).await.unwrap();
        assert!(records.is_empty());
    }
}
