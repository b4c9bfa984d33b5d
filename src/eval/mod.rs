//! # Training and Evaluation Harness
//!
//! [`SupervisedEvaluation`] owns a [`MdgruClassifier`], its optimizer and the
//! staging buffers batches are copied through. It runs training steps,
//! loss evaluation and inference, and persists model and optimizer state
//! together in checkpoints named after the global step.
//!
//! | Operation | Gradients | Output |
//! |-----------|-----------|--------|
//! | [`fit`](SupervisedEvaluation::fit) | yes, one optimizer step | loss |
//! | [`evaluate_with_loss`](SupervisedEvaluation::evaluate_with_loss) | no | loss, `[batch, classes, spatial...]` |
//! | [`predict`](SupervisedEvaluation::predict) | no | `[batch, spatial..., classes]` |
//!
//! Host arrays carry their true spatial rank; the padding to the rank-5
//! engine layout happens in the buffers.

mod buffer;
mod checkpoint;

pub use buffer::{InputBuffer, LabelBuffer, StagingBuffer};
pub use checkpoint::{Checkpoint, OptimizerSection, CHECKPOINT_FORMAT};

use std::path::{Path, PathBuf};

use burn::module::{AutodiffModule, Module};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};
use log::{debug, info};
use ndarray::{ArrayD, IxDyn};

use crate::config::TrainingConfig;
use crate::error::{Error, Result};
use crate::layout::channels_last;
use crate::model::MdgruClassifier;

use checkpoint::format_error;

type ModelRecord<B> = <MdgruClassifier<B> as Module<B>>::Record;

/// Build a harness with an Adam optimizer
///
/// The configured momentum drives Adam's first-moment decay.
///
/// # Arguments
/// * `config` - Model and optimizer configuration
/// * `data_shape` - Canonical `[batch, channels, spatial...]` shape of the data
/// * `device` - Device every tensor of the harness lives on
pub fn supervised_evaluation<B: AutodiffBackend>(
    config: &TrainingConfig,
    data_shape: &[usize],
    device: &B::Device,
) -> Result<SupervisedEvaluation<B, impl Optimizer<MdgruClassifier<B>, B> + Clone>> {
    let optimizer = AdamConfig::new()
        .with_beta_1(config.momentum)
        .init::<B, MdgruClassifier<B>>();
    SupervisedEvaluation::<B, _>::with_optimizer(config, data_shape, optimizer, device)
}

/// Model, optimizer, step counter and staging buffers of one training run
///
/// # Type Parameters
/// * `B` - Autodiff backend used for training
/// * `O` - Optimizer over the classifier
pub struct SupervisedEvaluation<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<MdgruClassifier<B>, B> + Clone,
{
    model: MdgruClassifier<B>,
    optimizer: O,
    step: usize,
    learning_rate: f64,
    inputs: InputBuffer<B>,
    labels: LabelBuffer<B>,
    device: B::Device,
}

impl<B, O> SupervisedEvaluation<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<MdgruClassifier<B>, B> + Clone,
{
    /// Build and initialize the model, then size the buffers for one sample
    pub fn with_optimizer(
        config: &TrainingConfig,
        data_shape: &[usize],
        optimizer: O,
        device: &B::Device,
    ) -> Result<Self> {
        let model = MdgruClassifier::new(&config.model, data_shape, device)?;
        let inputs = InputBuffer::new(data_shape, device)?;
        let labels = LabelBuffer::new(data_shape, model.num_classes(), model.head(), device)?;

        Ok(Self {
            model,
            optimizer,
            step: 0,
            learning_rate: config.learning_rate,
            inputs,
            labels,
            device: device.clone(),
        })
    }

    pub fn model(&self) -> &MdgruClassifier<B> {
        &self.model
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Number of completed optimizer steps
    pub fn global_step(&self) -> usize {
        self.step
    }

    pub fn input_buffer(&self) -> &InputBuffer<B> {
        &self.inputs
    }

    pub fn label_buffer(&self) -> &LabelBuffer<B> {
        &self.labels
    }

    /// One training iteration: forward, loss, backward and one optimizer step
    ///
    /// Returns the loss before the update.
    pub fn fit(&mut self, batch: &ArrayD<f32>, labels: &ArrayD<i64>) -> Result<f32> {
        let input = self.inputs.load(batch)?;
        let targets = self.labels.load(labels, self.model.spatial_rank())?;

        let scores = self.model.forward(input);
        let loss = self.model.loss(scores, targets)?;
        let value = loss.clone().into_scalar().elem::<f32>();

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self
            .optimizer
            .step(self.learning_rate, self.model.clone(), grads);
        self.step += 1;

        debug!("step {}: loss {:.6}", self.step, value);
        Ok(value)
    }

    /// Loss and channel-first class distribution without touching the weights
    pub fn evaluate_with_loss(
        &mut self,
        batch: &ArrayD<f32>,
        labels: &ArrayD<i64>,
    ) -> Result<(f32, ArrayD<f32>)> {
        let model = self.model.valid();
        let input = self.inputs.load(batch)?.inner();
        let targets = self.labels.load(labels, model.spatial_rank())?.inner();

        let scores = model.forward(input);
        let loss = model.loss(scores.clone(), targets)?;
        let prediction = model.head().predict(scores);

        let [batch_size, classes, d0, d1, d2] = prediction.dims();
        let mut shape = vec![batch_size, classes];
        shape.extend_from_slice(&[d0, d1, d2][..model.spatial_rank()]);

        Ok((loss.into_scalar().elem::<f32>(), to_host(prediction, &shape)?))
    }

    /// Channel-last class distribution `[batch, spatial..., classes]` on the host
    pub fn predict(&mut self, batch: &ArrayD<f32>) -> Result<ArrayD<f32>> {
        let model = self.model.valid();
        let input = self.inputs.load(batch)?.inner();

        let prediction = channels_last(model.predict(input));
        let [batch_size, d0, d1, d2, classes] = prediction.dims();
        let mut shape = vec![batch_size];
        shape.extend_from_slice(&[d0, d1, d2][..model.spatial_rank()]);
        shape.push(classes);

        to_host(prediction, &shape)
    }

    /// Write model and optimizer state to `"{prefix}-{step}"`
    pub fn save(&self, prefix: impl AsRef<Path>) -> Result<PathBuf> {
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let model = Recorder::<B>::record(&recorder, self.model.clone().into_record(), ())
            .map_err(|e| Error::Record(format!("{:?}", e)))?;
        let optimizer = Recorder::<B>::record(&recorder, self.optimizer.to_record(), ())
            .map_err(|e| Error::Record(format!("{:?}", e)))?;

        let path = Checkpoint::new(model, self.step as u64, optimizer).write(prefix.as_ref())?;
        info!("saved checkpoint {} at step {}", path.display(), self.step);
        Ok(path)
    }

    /// Restore model, optimizer and step from a checkpoint
    ///
    /// Both records are decoded before either is applied, so a malformed
    /// checkpoint leaves the harness untouched.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let checkpoint = Checkpoint::read(path)?;
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();

        let model: ModelRecord<B> = Recorder::<B>::load(&recorder, checkpoint.model, &self.device)
            .map_err(|e| format_error(path, format!("model section: {:?}", e)))?;
        let optimizer: O::Record =
            Recorder::<B>::load(&recorder, checkpoint.optimizer.state, &self.device)
                .map_err(|e| format_error(path, format!("optimizer section: {:?}", e)))?;

        self.model = self.model.clone().load_record(model);
        self.optimizer = self.optimizer.clone().load_record(optimizer);
        self.step = checkpoint.optimizer.step as usize;

        info!("restored checkpoint {} at step {}", path.display(), self.step);
        Ok(())
    }
}

/// Move a tensor to host memory with the given shape
fn to_host<B: Backend, const D: usize>(tensor: Tensor<B, D>, shape: &[usize]) -> Result<ArrayD<f32>> {
    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| Error::TensorData(format!("{:?}", e)))?;
    Ok(ArrayD::from_shape_vec(IxDyn(shape), values)?)
}
