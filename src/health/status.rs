//! Health status record and its on-disk form.
//!
//! External liveness scripts read a two-line `key=value` file:
//!
//! ```text
//! status=success
//! message=Health check completed successfully
//! ```
//!
//! The file is replaced atomically (write `<path>.tmp`, fsync, rename) so a
//! reader never observes a partial record.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Outcome of one health cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthOutcome {
    Success,
    Failure,
}

impl HealthOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthOutcome::Success => "success",
            HealthOutcome::Failure => "failure",
        }
    }

    /// Gauge value: success=1, failure=0.
    pub fn gauge_value(&self) -> f64 {
        match self {
            HealthOutcome::Success => 1.0,
            HealthOutcome::Failure => 0.0,
        }
    }
}

impl fmt::Display for HealthOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one probe, as recorded for external readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub outcome: HealthOutcome,
    pub message: String,
}

impl HealthStatus {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            outcome: HealthOutcome::Success,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            outcome: HealthOutcome::Failure,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == HealthOutcome::Success
    }

    /// Render the two-line record. Line breaks inside the message are
    /// flattened so the record always has exactly two lines.
    pub fn to_record(&self) -> String {
        let message: String = self
            .message
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        format!("status={}\nmessage={}\n", self.outcome, message)
    }

    /// Parse a record produced by [`HealthStatus::to_record`].
    ///
    /// Returns `None` unless both keys are present with a known status.
    pub fn parse_record(raw: &str) -> Option<Self> {
        let mut outcome = None;
        let mut message = None;
        for line in raw.lines() {
            if let Some(value) = line.strip_prefix("status=") {
                outcome = match value {
                    "success" => Some(HealthOutcome::Success),
                    "failure" => Some(HealthOutcome::Failure),
                    _ => None,
                };
            } else if let Some(value) = line.strip_prefix("message=") {
                message = Some(value.to_string());
            }
        }
        Some(Self {
            outcome: outcome?,
            message: message?,
        })
    }
}

/// Error type for status file writes.
#[derive(Debug, Error)]
pub enum StatusWriteError {
    #[error("failed to write temporary status file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to move status file into place at {path}: {source}")]
    Rename {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Atomically replaced status file.
#[derive(Debug, Clone)]
pub struct StatusFile {
    path: PathBuf,
    temp_path: PathBuf,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut temp = path.clone().into_os_string();
        temp.push(".tmp");
        Self {
            path,
            temp_path: PathBuf::from(temp),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file with `status`.
    pub async fn write(&self, status: &HealthStatus) -> Result<(), StatusWriteError> {
        if let Err(source) = self.write_temp(status).await {
            let _ = fs::remove_file(&self.temp_path).await;
            return Err(StatusWriteError::Write {
                path: self.temp_path.clone(),
                source,
            });
        }

        if let Err(source) = fs::rename(&self.temp_path, &self.path).await {
            let _ = fs::remove_file(&self.temp_path).await;
            return Err(StatusWriteError::Rename {
                path: self.path.clone(),
                source,
            });
        }
        Ok(())
    }

    async fn write_temp(&self, status: &HealthStatus) -> std::io::Result<()> {
        let mut file = fs::File::create(&self.temp_path).await?;
        file.write_all(status.to_record().as_bytes()).await?;
        file.sync_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn temp_status_path() -> PathBuf {
        std::env::temp_dir().join(format!("health-status-{}.txt", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_record_format() {
        let status = HealthStatus::success("Health check completed successfully");
        assert_eq!(
            status.to_record(),
            "status=success\nmessage=Health check completed successfully\n"
        );
    }

    #[test]
    fn test_multiline_message_is_flattened() {
        let status = HealthStatus::failure("connect error\ncaused by: refused");
        let record = status.to_record();
        assert_eq!(record.lines().count(), 2);
        assert_eq!(HealthStatus::parse_record(&record).unwrap().outcome, HealthOutcome::Failure);
    }

    #[test]
    fn test_parse_rejects_partial_record() {
        assert!(HealthStatus::parse_record("status=success\n").is_none());
        assert!(HealthStatus::parse_record("message=hello\n").is_none());
        assert!(HealthStatus::parse_record("status=maybe\nmessage=x\n").is_none());
    }

    #[tokio::test]
    async fn test_write_replaces_and_leaves_no_temp_file() {
        let path = temp_status_path();
        let file = StatusFile::new(&path);

        file.write(&HealthStatus::success("First write")).await.unwrap();
        file.write(&HealthStatus::failure("Second write")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "status=failure\nmessage=Second write\n");
        assert!(!file.temp_path.exists());

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let path = std::env::temp_dir()
            .join(format!("missing-{}", uuid::Uuid::new_v4()))
            .join("health-status.txt");
        let err = StatusFile::new(&path)
            .write(&HealthStatus::success("ok"))
            .await
            .unwrap_err();
        assert!(matches!(err, StatusWriteError::Write { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_reader_never_sees_partial_record() {
        let path = temp_status_path();
        let file = StatusFile::new(&path);
        file.write(&HealthStatus::success("seed")).await.unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let path = path.clone();
            let done = done.clone();
            tokio::task::spawn_blocking(move || {
                let mut reads = 0usize;
                loop {
                    let content = std::fs::read_to_string(&path).unwrap();
                    assert!(
                        HealthStatus::parse_record(&content).is_some(),
                        "partial record observed: {:?}",
                        content
                    );
                    reads += 1;
                    if done.load(Ordering::SeqCst) {
                        break reads;
                    }
                }
            })
        };

        for i in 0..200 {
            let status = if i % 2 == 0 {
                HealthStatus::success(format!("cycle {}", i))
            } else {
                HealthStatus::failure(format!("cycle {} timed out", i))
            };
            file.write(&status).await.unwrap();
        }
        done.store(true, Ordering::SeqCst);

        assert!(reader.await.unwrap() > 0);
        std::fs::remove_file(&path).unwrap_or_default();
    }
}
