//! Moves processed source files into their pass/fail bucket
//!
//! Destination: `<processed|errored>/<fiscal>/<quarter>/<file name>`. A
//! missing or blank fiscal or quarter lands in an `Unknown` directory.

use crate::domain::{AdminMetadata, BridgeError, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};

/// Bucket name used when a routing key is absent
pub const UNKNOWN_BUCKET: &str = "Unknown";

/// Pass/fail destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Processed,
    Errored,
}

/// Routes files between the queue and the processed/errored trees
#[derive(Debug, Clone)]
pub struct FileRouter {
    processed: PathBuf,
    errored: PathBuf,
}

/// Path component for a routing key; separators are replaced
fn bucket(value: Option<&str>) -> String {
    let sanitized = value
        .unwrap_or_default()
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') || c.is_control() { '_' } else { c })
        .collect::<String>();
    match sanitized.trim_matches('.') {
        "" => UNKNOWN_BUCKET.to_string(),
        component => component.to_string(),
    }
}

impl FileRouter {
    pub fn new(processed: impl Into<PathBuf>, errored: impl Into<PathBuf>) -> Self {
        Self {
            processed: processed.into(),
            errored: errored.into(),
        }
    }

    /// Directory a file with these routing keys goes to
    pub fn directory_for(
        &self,
        destination: Destination,
        fiscal: Option<&str>,
        quarter: Option<&str>,
    ) -> PathBuf {
        let root = match destination {
            Destination::Processed => &self.processed,
            Destination::Errored => &self.errored,
        };
        root.join(bucket(fiscal)).join(bucket(quarter))
    }

    /// Moves `source` to its destination and returns the new path
    ///
    /// `admin` is `None` when the file could not be parsed far enough to
    /// read its routing keys.
    pub async fn route(
        &self,
        source: &Path,
        destination: Destination,
        admin: Option<&AdminMetadata>,
    ) -> Result<PathBuf> {
        let directory = self.directory_for(
            destination,
            admin.and_then(|a| a.fiscal.as_deref()),
            admin.and_then(|a| a.quarter.as_deref()),
        );
        tokio::fs::create_dir_all(&directory).await.map_err(|e| {
            BridgeError::Routing(format!(
                "Failed to create directory {}: {e}",
                directory.display()
            ))
        })?;

        let file_name = source.file_name().ok_or_else(|| {
            BridgeError::Routing(format!("Source path has no file name: {}", source.display()))
        })?;
        let target = free_target(&directory, Path::new(file_name)).await;

        move_file(source, &target).await?;
        tracing::info!(
            file = %source.display(),
            destination = %target.display(),
            "Routed source file"
        );
        Ok(target)
    }
}

/// First name in `directory` not already taken
async fn free_target(directory: &Path, file_name: &Path) -> PathBuf {
    let candidate = directory.join(file_name);
    if !exists(&candidate).await {
        return candidate;
    }

    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = file_name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");

    let mut counter = 0;
    loop {
        let suffix = if counter == 0 {
            stamp.to_string()
        } else {
            format!("{stamp}-{counter}")
        };
        let candidate = directory.join(format!("{stem}.{suffix}{extension}"));
        if !exists(&candidate).await {
            return candidate;
        }
        counter += 1;
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Renames, falling back to copy and delete across file systems
async fn move_file(source: &Path, target: &Path) -> Result<()> {
    if tokio::fs::rename(source, target).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(source, target).await.map_err(|e| {
        BridgeError::Routing(format!(
            "Failed to move {} to {}: {e}",
            source.display(),
            target.display()
        ))
    })?;
    tokio::fs::remove_file(source).await.map_err(|e| {
        BridgeError::Routing(format!(
            "Copied {} but failed to remove it: {e}",
            source.display()
        ))
    })
}
