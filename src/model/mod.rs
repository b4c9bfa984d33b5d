//! # MDGRU Classification Model
//!
//! [`MdgruClassifier`] ties together the pieces of a segmentation network:
//!
//! 1. the [`MdgruConfig`] lists are resolved into per-layer configurations,
//! 2. a [`NetworkPipeline`] of MDGRU blocks is assembled from them,
//! 3. every layer is reinitialized by the seeded [`WeightInit`],
//! 4. a [`LossHead`] turns raw scores into probabilities and losses.
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape | Layout |
//! |--------|-------|--------|
//! | input | `[batch, channels, d0, d1, d2]` | channel-first |
//! | scores / prediction | `[batch, classes, d0, d1, d2]` | channel-first |
//! | labels | `[batch, d0, d1, d2]` | integer classes |
//!
//! Unused spatial axes have size 1 (see [`crate::layout`]). Strided layers
//! scan a subsampled grid but restore the extent, so scores, predictions and
//! labels always share the spatial shape of the input.
//!
//! ## Example
//!
//! ```rust
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//! use mdgru::config::MdgruConfig;
//! use mdgru::model::MdgruClassifier;
//!
//! type Backend = NdArray<f32>;
//! let device = Default::default();
//!
//! let config = MdgruConfig::new(3)
//!     .with_mdgru_channels(vec![4, 4])
//!     .with_fc_channels(Some(vec![Some(5), Some(3)]));
//! let model = MdgruClassifier::<Backend>::new(&config, &[1, 1, 4, 4], &device).unwrap();
//!
//! let input = Tensor::<Backend, 5>::zeros([1, 1, 4, 4, 1], &device);
//! assert_eq!(model.predict(input).dims(), [1, 3, 4, 4, 1]);
//! ```

mod head;
mod init;
mod pipeline;

pub use head::{cross_entropy, region_overlap_score, LossHead};
pub use init::{Initialize, WeightInit};
pub use pipeline::NetworkPipeline;

use burn::module::{Ignored, Module};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use log::info;

use crate::config::MdgruConfig;
use crate::error::{Error, Result};
use crate::layout::{channels_first, channels_last, MAX_SPATIAL_RANK};

/// MDGRU network with its prediction and loss head
///
/// # Type Parameters
/// * `B` - The backend type
#[derive(Module, Debug)]
pub struct MdgruClassifier<B: Backend> {
    pipeline: NetworkPipeline<B>,
    head: Ignored<LossHead>,
    num_classes: usize,
}

impl<B: Backend> MdgruClassifier<B> {
    /// Build and initialize a classifier for data of the given shape
    ///
    /// # Arguments
    /// * `config` - Model configuration
    /// * `data_shape` - `[batch, channels, spatial...]` shape of the training data
    /// * `device` - Device to create the module on
    pub fn new(config: &MdgruConfig, data_shape: &[usize], device: &B::Device) -> Result<Self> {
        if data_shape.len() < 3 || data_shape.len() > MAX_SPATIAL_RANK + 2 {
            return Err(Error::config(format!(
                "data shape {:?} must be [batch, channels, spatial...] with 1 to {} spatial axes",
                data_shape, MAX_SPATIAL_RANK
            )));
        }
        let input_channels = data_shape[1];
        let spatial_rank = data_shape.len() - 2;

        let head = LossHead::from_config(config)?;
        let layers = config.resolve(input_channels, spatial_rank)?;
        let pipeline = NetworkPipeline::assemble(&layers, input_channels, spatial_rank, device)?
            .initialize(&mut WeightInit::new(config.seed));

        info!(
            "assembled MDGRU classifier ({:?} head)\n{}",
            head,
            pipeline.summary()
        );

        Ok(Self {
            pipeline,
            head: Ignored(head),
            num_classes: config.num_classes,
        })
    }

    pub fn pipeline(&self) -> &NetworkPipeline<B> {
        &self.pipeline
    }

    pub fn head(&self) -> LossHead {
        self.head.0
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn input_channels(&self) -> usize {
        self.pipeline.input_channels()
    }

    pub fn spatial_rank(&self) -> usize {
        self.pipeline.spatial_rank()
    }

    /// Raw per-class scores, channel-first
    pub fn forward(&self, input: Tensor<B, 5>) -> Tensor<B, 5> {
        let hidden = self.pipeline.forward(channels_last(input));
        channels_first(hidden)
    }

    /// Per-voxel class distribution, channel-first
    pub fn predict(&self, input: Tensor<B, 5>) -> Tensor<B, 5> {
        self.head.0.predict(self.forward(input))
    }

    /// Loss of raw scores (output of [`MdgruClassifier::forward`]) against labels
    pub fn loss(&self, scores: Tensor<B, 5>, labels: Tensor<B, 4, Int>) -> Result<Tensor<B, 1>> {
        self.head.0.loss(scores, labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrideSpec;
    use burn::backend::NdArray;
    use burn::tensor::backend::Backend as BurnBackend;

    type TestBackend = NdArray<f32>;
    type TestDevice = <TestBackend as BurnBackend>::Device;

    fn get_test_device() -> TestDevice {
        Default::default()
    }

    fn small_config() -> MdgruConfig {
        MdgruConfig::new(2)
            .with_mdgru_channels(vec![3, 4])
            .with_fc_channels(Some(vec![Some(5), Some(2)]))
            .with_dropout_rate(0.0)
    }

    #[test]
    fn test_classifier_creation() {
        let device = get_test_device();
        let model = MdgruClassifier::<TestBackend>::new(&small_config(), &[1, 2, 3, 3, 3], &device)
            .unwrap();

        assert_eq!(model.num_classes(), 2);
        assert_eq!(model.input_channels(), 2);
        assert_eq!(model.spatial_rank(), 3);
        assert_eq!(model.pipeline().len(), 2);
        assert_eq!(model.head(), LossHead::CrossEntropy);
    }

    #[test]
    fn test_classifier_rejects_bad_data_shape() {
        let device = get_test_device();
        let err = MdgruClassifier::<TestBackend>::new(&small_config(), &[1, 2], &device).unwrap_err();
        assert!(matches!(err, Error::ConfigMismatch(_)));
    }

    #[test]
    fn test_classifier_forward_shapes() {
        let device = get_test_device();
        let model =
            MdgruClassifier::<TestBackend>::new(&small_config(), &[1, 1, 4, 3], &device).unwrap();

        let input = Tensor::<TestBackend, 5>::zeros([2, 1, 4, 3, 1], &device);
        assert_eq!(model.forward(input).dims(), [2, 2, 4, 3, 1]);
    }

    #[test]
    fn test_classifier_strided_output() {
        let device = get_test_device();
        let config = small_config().with_strides(Some(vec![Some(StrideSpec::Uniform(2)), None]));
        let model = MdgruClassifier::<TestBackend>::new(&config, &[1, 1, 4, 5], &device).unwrap();

        let input = Tensor::<TestBackend, 5>::zeros([1, 1, 4, 5, 1], &device);
        assert_eq!(model.forward(input).dims(), [1, 2, 4, 5, 1]);
    }

    #[test]
    fn test_same_seed_same_prediction() {
        let device = get_test_device();
        let a = MdgruClassifier::<TestBackend>::new(&small_config(), &[1, 1, 3, 3], &device).unwrap();
        let b = MdgruClassifier::<TestBackend>::new(&small_config(), &[1, 1, 3, 3], &device).unwrap();

        let input = Tensor::<TestBackend, 5>::random(
            [1, 1, 3, 3, 1],
            burn::tensor::Distribution::Uniform(-1.0, 1.0),
            &device,
        );
        let diff = (a.predict(input.clone()) - b.predict(input))
            .abs()
            .max()
            .into_scalar();
        assert!(diff < 1e-6);
    }
}
