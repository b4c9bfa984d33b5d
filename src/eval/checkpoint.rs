//! On-disk checkpoint container.
//!
//! A checkpoint is a single bincode file holding two sections, the encoded
//! model record and the optimizer section (global step plus the encoded
//! optimizer record). Files are named `"{prefix}-{step}"` and written through a
//! temporary sibling so a crash never leaves a truncated checkpoint behind.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Format tag checked on load
pub const CHECKPOINT_FORMAT: &str = "mdgru-checkpoint/1";

/// Optimizer half of a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerSection {
    pub step: u64,
    pub state: Vec<u8>,
}

/// Model and optimizer state persisted together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format: String,
    pub model: Vec<u8>,
    pub optimizer: OptimizerSection,
}

impl Checkpoint {
    pub fn new(model: Vec<u8>, step: u64, optimizer_state: Vec<u8>) -> Self {
        Self {
            format: CHECKPOINT_FORMAT.to_string(),
            model,
            optimizer: OptimizerSection {
                step,
                state: optimizer_state,
            },
        }
    }

    /// Path the checkpoint for `step` gets under `prefix`
    pub fn path_for(prefix: &Path, step: u64) -> PathBuf {
        append(prefix, &format!("-{}", step))
    }

    /// Write to `"{prefix}-{step}"` and return that path
    pub fn write(&self, prefix: &Path) -> Result<PathBuf> {
        let path = Self::path_for(prefix, self.optimizer.step);
        let tmp = append(&path, ".tmp");

        let bytes = bincode::serialize(self).map_err(|e| Error::Record(e.to_string()))?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;

        Ok(path)
    }

    /// Read and validate the container layout
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let checkpoint: Checkpoint =
            bincode::deserialize(&bytes).map_err(|e| format_error(path, e.to_string()))?;

        if checkpoint.format != CHECKPOINT_FORMAT {
            return Err(format_error(
                path,
                format!(
                    "unknown format tag {:?}, expected {:?}",
                    checkpoint.format, CHECKPOINT_FORMAT
                ),
            ));
        }
        Ok(checkpoint)
    }
}

pub(crate) fn format_error(path: &Path, reason: impl Into<String>) -> Error {
    Error::CheckpointFormat {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn append(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_keeps_sections() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::new(vec![1, 2, 3], 12, vec![9, 8]);

        let path = checkpoint.write(&dir.path().join("model")).unwrap();
        assert!(path.to_string_lossy().ends_with("model-12"));
        assert!(!append(&path, ".tmp").exists());

        let restored = Checkpoint::read(&path).unwrap();
        assert_eq!(restored.model, vec![1, 2, 3]);
        assert_eq!(restored.optimizer.step, 12);
        assert_eq!(restored.optimizer.state, vec![9, 8]);
    }

    #[test]
    fn test_garbage_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage");
        fs::write(&path, b"definitely not a checkpoint").unwrap();

        assert!(matches!(
            Checkpoint::read(&path).unwrap_err(),
            Error::CheckpointFormat { .. }
        ));
    }

    #[test]
    fn test_wrong_tag_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut checkpoint = Checkpoint::new(vec![], 1, vec![]);
        checkpoint.format = "something-else/2".to_string();
        let path = checkpoint.write(&dir.path().join("tagged")).unwrap();

        assert!(matches!(
            Checkpoint::read(&path).unwrap_err(),
            Error::CheckpointFormat { .. }
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Checkpoint::read(&dir.path().join("absent-3")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
