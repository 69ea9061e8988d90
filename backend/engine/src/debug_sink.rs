use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use ponder_core::{DebugRecord, DebugSink};
use ponder_logging::redact_sensitive_data;

/// Writes each transport call to `call_NNN.json` in a directory.
pub struct FileDebugSink {
    dir: PathBuf,
}

impl FileDebugSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_for(&self, call_number: u64) -> PathBuf {
        self.dir.join(format!("call_{call_number:03}.json"))
    }
}

#[async_trait]
impl DebugSink for FileDebugSink {
    async fn record(&self, record: &DebugRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create debug directory: {}", self.dir.display()))?;

        let json = serde_json::to_string_pretty(record).context("Failed to serialize debug record")?;
        let path = self.file_for(record.call_number);
        fs::write(&path, redact_sensitive_data(&json))
            .await
            .with_context(|| format!("Failed to write debug record: {}", path.display()))?;

        debug!(path = %path.display(), "Wrote debug record");
        Ok(())
    }
}
