//! Log sink capability — one append-only file per node id.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::fleet::NodeId;

/// Where instance output goes. The file for a node must exist and be
/// writable before its container starts, and is never truncated by the
/// manager, so it survives restarts of the same instance.
pub trait LogSink {
    /// Deterministic log path for a node id. Pure; no filesystem effect.
    fn path_for(&self, node_id: NodeId) -> PathBuf;
    /// Create the log file for `node_id` if needed; idempotent.
    fn ensure(&self, node_id: NodeId) -> Result<PathBuf>;
    fn append(&self, path: &Path, text: &str) -> Result<()>;
}

/// Filesystem-backed sink rooted at the configured log directory.
#[derive(Debug, Clone)]
pub struct FsLogSink {
    dir: PathBuf,
}

impl FsLogSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl LogSink for FsLogSink {
    fn path_for(&self, node_id: NodeId) -> PathBuf {
        self.dir.join(format!("node-{node_id}.log"))
    }

    fn ensure(&self, node_id: NodeId) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create log dir {}", self.dir.display()))?;
        let path = self.path_for(node_id);
        // Open for append rather than write so an existing file is kept.
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to create log file {}", path.display()))?;
        Ok(path)
    }

    fn append(&self, path: &Path, text: &str) -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        file.write_all(text.as_bytes())
            .with_context(|| format!("failed to append to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> NodeId {
        NodeId::parse(id).unwrap()
    }

    #[test]
    fn ensure_creates_dir_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FsLogSink::new(tmp.path().join("logs"));
        let path = sink.ensure(node("101")).unwrap();
        assert!(path.exists());
        assert!(path.ends_with("node-101.log"));
    }

    #[test]
    fn ensure_is_idempotent_and_keeps_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FsLogSink::new(tmp.path());
        let path = sink.ensure(node("7")).unwrap();
        sink.append(&path, "first run\n").unwrap();

        // A restart calls ensure again; the file must not be truncated.
        let again = sink.ensure(node("7")).unwrap();
        assert_eq!(path, again);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first run\n");
    }

    #[test]
    fn append_accumulates() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FsLogSink::new(tmp.path());
        let path = sink.ensure(node("9")).unwrap();
        sink.append(&path, "a\n").unwrap();
        sink.append(&path, "b\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\n");
    }
}
