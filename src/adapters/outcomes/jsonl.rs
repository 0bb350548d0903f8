//! JSON-lines outcome log

use super::{Outcome, OutcomeRecorder};
use crate::domain::{BridgeError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends one JSON object per processed file
pub struct JsonlOutcomeRecorder {
    path: PathBuf,
    // serializes appends from concurrent workers
    write_lock: Mutex<()>,
}

impl JsonlOutcomeRecorder {
    /// Creates the recorder, creating the parent directory if needed
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                BridgeError::Outcome(format!(
                    "Failed to create outcome log directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OutcomeRecorder for JsonlOutcomeRecorder {
    async fn record(&self, outcome: &Outcome) -> Result<()> {
        let mut line = serde_json::to_string(outcome)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                BridgeError::Outcome(format!(
                    "Failed to open outcome log {}: {e}",
                    self.path.display()
                ))
            })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| BridgeError::Outcome(format!("Failed to write outcome: {e}")))?;
        file.flush()
            .await
            .map_err(|e| BridgeError::Outcome(format!("Failed to flush outcome log: {e}")))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}
