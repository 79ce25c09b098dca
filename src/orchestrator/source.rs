//! Snapshot sources
//!
//! Downloading and extracting archives happens outside ipsnap; a source only
//! has to hand back the extracted CSV path and its modification time.

use crate::datasets::DatasetKind;
use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::time::SystemTime;

/// An extracted snapshot file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    pub path: PathBuf,
    /// Modification time; its date is the release date
    pub modified: SystemTime,
}

/// Provides the snapshot file of a dataset kind
pub trait SnapshotSource {
    fn locate(&self, kind: DatasetKind) -> Result<SnapshotFile>;
}

/// Snapshots extracted side by side into one directory under their
/// published file names
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SnapshotSource for DirectorySource {
    fn locate(&self, kind: DatasetKind) -> Result<SnapshotFile> {
        let path = self.dir.join(kind.schema().csv_file);
        let metadata = std::fs::metadata(&path)
            .map_err(|e| anyhow!("{}: snapshot {} not found: {}", kind, path.display(), e))?;
        let modified = metadata
            .modified()
            .map_err(|e| anyhow!("{}: cannot read mtime of {}: {}", kind, path.display(), e))?;

        Ok(SnapshotFile { path, modified })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("IP2PROXY-LITE-PX11.CSV"), "").unwrap();

        let source = DirectorySource::new(dir.path());
        let file = source.locate(DatasetKind::ProxyV4).unwrap();
        assert_eq!(file.path, dir.path().join("IP2PROXY-LITE-PX11.CSV"));

        let err = source.locate(DatasetKind::ProxyV6).unwrap_err();
        assert!(err.to_string().contains("proxy-v6"));
    }
}
