//! Error type shared by every stage of model construction, training and
//! checkpointing.

use std::path::PathBuf;

use thiserror::Error;

/// The result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by model assembly, the loss head and the evaluation harness.
#[derive(Debug, Error)]
pub enum Error {
    /// The layer specification is malformed or internally inconsistent.
    #[error("layer configuration mismatch: {0}")]
    ConfigMismatch(String),

    /// A batch (or label array) cannot be fed to the model.
    #[error("input shape {got:?} is incompatible with the model: {reason}")]
    InputShape { got: Vec<usize>, reason: String },

    /// A checkpoint does not have the expected (model, optimizer) layout.
    #[error("malformed checkpoint {}: {reason}", path.display())]
    CheckpointFormat { path: PathBuf, reason: String },

    /// A label value falls outside `0..num_classes`.
    #[error("label {value} is outside the {num_classes} model classes")]
    InvalidLabel { value: i64, num_classes: usize },

    /// The region overlap loss got a batch without any foreground voxel.
    #[error("batch contains no foreground voxels, region overlap is undefined")]
    DegenerateBatch,

    /// Tensor data could not be converted to host memory.
    #[error("tensor data conversion failed: {0}")]
    TensorData(String),

    /// Model or optimizer state could not be encoded.
    #[error("failed to record state: {0}")]
    Record(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

impl Error {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Error::ConfigMismatch(reason.into())
    }

    pub(crate) fn input(got: &[usize], reason: impl Into<String>) -> Self {
        Error::InputShape {
            got: got.to_vec(),
            reason: reason.into(),
        }
    }
}
