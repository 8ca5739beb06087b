use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

/// Where raw metrics snapshot documents come from
#[async_trait]
pub trait SnapshotSource: Send {
    /// Fetches the current snapshot document
    async fn fetch(&mut self) -> Result<String>;

    /// Short description for log messages
    fn describe(&self) -> String;
}

/// Reads a snapshot file that the metrics source rewrites in place
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl SnapshotSource for FileSource {
    async fn fetch(&mut self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read snapshot file: {}", self.path.display()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
