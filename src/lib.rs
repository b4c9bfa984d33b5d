//! # MDGRU - Multi-Dimensional Gated Recurrent Units (Rust)
//!
//! Volumetric segmentation networks built from multi-dimensional GRUs on top
//! of the Burn framework.
//!
//! ## Features
//!
//! - **MdRnn**: bidirectional GRU scans along every spatial axis of a volume
//! - **MdgruBlock**: an MdRnn followed by an optional per-voxel projection
//! - **Layer resolution**: parallel channel/projection/stride lists checked
//!   and turned into a chain of blocks
//! - **Loss heads**: cross-entropy, or a Dice term mixed with a
//!   foreground/background cross-entropy
//! - **Seeded initialization**: identical configurations build identical models
//! - **Harness**: training steps, evaluation, channel-last prediction and
//!   step-keyed checkpoints
//!
//! ## Quick Start
//!
//! ```rust
//! use mdgru::prelude::*;
//!
//! let config = MdgruConfig::new(3);
//! let layers = config.resolve(1, 3).unwrap();
//!
//! assert_eq!(layers.len(), 3);
//! assert_eq!(layers[2].output_channels(), 3);
//! assert!(layers[2].is_final);
//! ```
//!
//! ## Training
//!
//! ```ignore
//! use burn::backend::{Autodiff, NdArray};
//! use mdgru::prelude::*;
//!
//! type Backend = Autodiff<NdArray<f32>>;
//!
//! let config = TrainingConfig::new(MdgruConfig::new(2));
//! let mut harness = supervised_evaluation::<Backend>(&config, &[1, 1, 16, 16, 16], &device)?;
//!
//! let loss = harness.fit(&batch, &labels)?;
//! let path = harness.save("checkpoints/mdgru")?; // checkpoints/mdgru-1
//! let prediction = harness.predict(&batch)?;     // [1, 16, 16, 16, 2]
//! ```

pub mod activation;
pub mod cells;
pub mod config;
pub mod error;
pub mod eval;
pub mod layout;
pub mod model;
pub mod rnn;

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::activation::{Activation, LeCun};
    pub use crate::config::{LayerConfig, MdgruConfig, StrideSpec, TrainingConfig};
    pub use crate::error::{Error, Result};
    pub use crate::eval::{supervised_evaluation, SupervisedEvaluation};
    pub use crate::model::{LossHead, MdgruClassifier, NetworkPipeline};
    pub use crate::rnn::{MdRnn, MdgruBlock};
}
