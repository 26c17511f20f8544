//! Persistence sinks for the log artifacts.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::error::SnapshotError;

use super::types::SnapshotKind;

/// Receives a rendered log and reports where it went.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Persist `body` as the artifact for `kind`.
    async fn persist(&self, kind: SnapshotKind, body: &str) -> Result<PathBuf, SnapshotError>;
}

/// Writes each artifact to `<dir>/<fixed file name>`, replacing the previous one.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    /// Create a sink rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the artifact for `kind`.
    pub fn path_for(&self, kind: SnapshotKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }
}

#[async_trait]
impl SnapshotSink for FileSink {
    async fn persist(&self, kind: SnapshotKind, body: &str) -> Result<PathBuf, SnapshotError> {
        let path = self.path_for(kind);

        tokio::fs::write(&path, body)
            .await
            .map_err(|source| SnapshotError::Sink {
                path: path.clone(),
                source,
            })?;

        info!(kind = %kind, path = %path.display(), bytes = body.len(), "Snapshot log written");
        Ok(path)
    }
}

/// Keeps artifacts in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    written: Mutex<Vec<(SnapshotKind, String)>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent body written for `kind`.
    pub fn last(&self, kind: SnapshotKind) -> Option<String> {
        self.written
            .lock()
            .ok()?
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, body)| body.clone())
    }

    /// Number of artifacts written.
    pub fn count(&self) -> usize {
        self.written.lock().map(|w| w.len()).unwrap_or(0)
    }
}

#[async_trait]
impl SnapshotSink for MemorySink {
    async fn persist(&self, kind: SnapshotKind, body: &str) -> Result<PathBuf, SnapshotError> {
        if let Ok(mut written) = self.written.lock() {
            written.push((kind, body.to_string()));
        }
        Ok(PathBuf::from(kind.file_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_sink_writes_fixed_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        let path = sink.persist(SnapshotKind::TeamNames, "first").await.unwrap();
        sink.persist(SnapshotKind::TeamNames, "second").await.unwrap();

        assert_eq!(path, dir.path().join("LatestSnapshotTeamNames.log"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }

    #[tokio::test]
    async fn file_sink_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("missing"));

        let err = sink.persist(SnapshotKind::Market, "body").await.unwrap_err();

        assert!(matches!(err, SnapshotError::Sink { .. }));
    }

    #[tokio::test]
    async fn memory_sink_keeps_latest_body_per_kind() {
        let sink = MemorySink::new();
        sink.persist(SnapshotKind::Market, "a").await.unwrap();
        sink.persist(SnapshotKind::Market, "b").await.unwrap();

        assert_eq!(sink.last(SnapshotKind::Market).as_deref(), Some("b"));
        assert_eq!(sink.last(SnapshotKind::SportNames), None);
        assert_eq!(sink.count(), 2);
    }
}
