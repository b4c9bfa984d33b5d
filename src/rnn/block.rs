//! Composite MDGRU block
//!
//! A block is a multi-dimensional GRU optionally followed by a per-voxel
//! fully connected projection.

use crate::activation::Activation;
use crate::config::LayerConfig;
use crate::rnn::MdRnn;
use burn::module::{Ignored, Module};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Multi-dimensional GRU followed by an optional voxel-wise projection
///
/// # Type Parameters
/// * `B` - The backend type
#[derive(Module, Debug)]
pub struct MdgruBlock<B: Backend> {
    pub(crate) mdrnn: MdRnn<B>,
    /// Per-voxel projection (a 1x1 convolution)
    pub(crate) fc: Option<Linear<B>>,
    dropout: Dropout,
    activation: Ignored<Activation>,
    /// Final blocks hand raw scores to the loss head
    no_activation: bool,
    input_channels: usize,
    output_channels: usize,
    spatial_rank: usize,
}

impl<B: Backend> MdgruBlock<B> {
    /// Build a block from a resolved layer configuration
    pub fn new(layer: &LayerConfig, spatial_rank: usize, device: &B::Device) -> Self {
        let mut mdrnn = MdRnn::new(
            layer.input_channels,
            layer.recurrent_channels,
            spatial_rank,
            device,
        );
        if let Some(stride) = &layer.stride {
            mdrnn = mdrnn.with_strides(stride.clone());
        }

        let fc = layer.fc_channels.map(|channels| {
            LinearConfig::new(layer.recurrent_channels, channels)
                .with_bias(true)
                .init(device)
        });

        Self {
            mdrnn,
            fc,
            dropout: DropoutConfig::new(layer.options.dropout_rate).init(),
            activation: Ignored(layer.options.activation),
            no_activation: layer.is_final,
            input_channels: layer.input_channels,
            output_channels: layer.output_channels(),
            spatial_rank,
        }
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    /// Width of the recurrent stage
    pub fn recurrent_channels(&self) -> usize {
        self.mdrnn.hidden_channels()
    }

    pub fn spatial_rank(&self) -> usize {
        self.spatial_rank
    }

    pub fn has_projection(&self) -> bool {
        self.fc.is_some()
    }

    pub fn strides(&self) -> &[usize] {
        self.mdrnn.strides()
    }

    /// Whether the projection output is passed through the activation
    pub fn is_activated(&self) -> bool {
        self.fc.is_some() && !self.no_activation
    }

    /// Forward pass on a channel-last volume `[batch, d0, d1, d2, input_channels]`
    pub fn forward(&self, input: Tensor<B, 5>) -> Tensor<B, 5> {
        let input = self.dropout.forward(input);
        let hidden = self.mdrnn.forward(input);

        match &self.fc {
            Some(fc) => {
                let projected = fc.forward(hidden);
                if self.no_activation {
                    projected
                } else {
                    self.activation.0.forward(projected)
                }
            }
            None => hidden,
        }
    }
}
