//! Typed network configuration and the per-layer resolver.
//!
//! The raw configuration holds three parallel lists, `mdgru_channels`,
//! `fc_channels` and `strides`. [`resolve_layers`] validates them once and
//! turns them into one [`LayerConfig`] per layer, with the input width of
//! every layer and the final-layer flag already filled in.

use burn::config::Config;
use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::error::Error;
use crate::layout::MAX_SPATIAL_RANK;

/// Stride of one recurrent layer
///
/// Serialized either as a bare integer (used for every spatial axis) or as a
/// list with one entry per spatial axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StrideSpec {
    Uniform(usize),
    PerAxis(Vec<usize>),
}

impl StrideSpec {
    /// Expand to one stride per spatial axis.
    pub fn expand(&self, spatial_rank: usize) -> crate::error::Result<Vec<usize>> {
        let strides = match self {
            StrideSpec::Uniform(stride) => vec![*stride; spatial_rank],
            StrideSpec::PerAxis(strides) => {
                if strides.len() != spatial_rank {
                    return Err(Error::config(format!(
                        "stride {:?} has {} entries but the data has {} spatial axes",
                        strides,
                        strides.len(),
                        spatial_rank
                    )));
                }
                strides.clone()
            }
        };
        if strides.contains(&0) {
            return Err(Error::config(format!("stride {:?} contains a zero", strides)));
        }
        Ok(strides)
    }
}

impl From<usize> for StrideSpec {
    fn from(stride: usize) -> Self {
        StrideSpec::Uniform(stride)
    }
}

impl From<Vec<usize>> for StrideSpec {
    fn from(strides: Vec<usize>) -> Self {
        StrideSpec::PerAxis(strides)
    }
}

/// Options shared by every block of a network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockOptions {
    /// Probability of zeroing a block input during training.
    pub dropout_rate: f64,
    /// Nonlinearity after the per-voxel projection.
    pub activation: Activation,
}

impl Default for BlockOptions {
    fn default() -> Self {
        Self {
            dropout_rate: 0.0,
            activation: Activation::Tanh,
        }
    }
}

/// Fully resolved configuration of one network layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerConfig {
    /// Width of the tensor entering the layer.
    pub input_channels: usize,
    /// Width of the multi-dimensional GRU output.
    pub recurrent_channels: usize,
    /// Width of the per-voxel projection, if the layer has one.
    pub fc_channels: Option<usize>,
    /// One stride per spatial axis; `None` means unit stride.
    pub stride: Option<Vec<usize>>,
    /// The last layer feeds the prediction head and skips its activation.
    pub is_final: bool,
    pub options: BlockOptions,
}

impl LayerConfig {
    /// Width of the tensor leaving the layer.
    pub fn output_channels(&self) -> usize {
        self.fc_channels.unwrap_or(self.recurrent_channels)
    }
}

/// Expand the parallel per-layer lists into validated [`LayerConfig`]s.
///
/// # Arguments
/// * `mdgru_channels` - Recurrent width per layer
/// * `fc_channels` - Projection width per layer, `None` stacks the next recurrent layer directly
/// * `strides` - Stride per layer, `None` means unit stride
/// * `input_channels` - Channels of the network input
/// * `spatial_rank` - Number of spatial axes of the network input
/// * `options` - Options copied into every layer
pub fn resolve_layers(
    mdgru_channels: &[usize],
    fc_channels: &[Option<usize>],
    strides: &[Option<StrideSpec>],
    input_channels: usize,
    spatial_rank: usize,
    options: BlockOptions,
) -> crate::error::Result<Vec<LayerConfig>> {
    if mdgru_channels.len() != fc_channels.len() || mdgru_channels.len() != strides.len() {
        return Err(Error::config(format!(
            "mdgru_channels ({}), fc_channels ({}) and strides ({}) must have the same length",
            mdgru_channels.len(),
            fc_channels.len(),
            strides.len()
        )));
    }
    if mdgru_channels.is_empty() {
        return Err(Error::config("at least one layer is required"));
    }
    if input_channels == 0 {
        return Err(Error::config("input must have at least one channel"));
    }
    if spatial_rank == 0 || spatial_rank > MAX_SPATIAL_RANK {
        return Err(Error::config(format!(
            "spatial rank {} is not supported, expected 1 to {}",
            spatial_rank, MAX_SPATIAL_RANK
        )));
    }
    if !(0.0..1.0).contains(&options.dropout_rate) {
        return Err(Error::config(format!(
            "dropout_rate {} must lie in [0, 1)",
            options.dropout_rate
        )));
    }

    let last = mdgru_channels.len() - 1;
    let mut running_channels = input_channels;
    let mut layers = Vec::with_capacity(mdgru_channels.len());

    for (index, ((&recurrent, &fc), stride)) in mdgru_channels
        .iter()
        .zip(fc_channels)
        .zip(strides)
        .enumerate()
    {
        if recurrent == 0 || fc == Some(0) {
            return Err(Error::config(format!("layer {} has a zero channel count", index)));
        }
        let stride = stride
            .as_ref()
            .map(|spec| spec.expand(spatial_rank))
            .transpose()?;

        let layer = LayerConfig {
            input_channels: running_channels,
            recurrent_channels: recurrent,
            fc_channels: fc,
            stride,
            is_final: index == last,
            options,
        };
        running_channels = layer.output_channels();
        layers.push(layer);
    }

    Ok(layers)
}

/// Configuration of the MDGRU classification network
#[derive(Config, Debug)]
pub struct MdgruConfig {
    /// Number of output classes.
    pub num_classes: usize,
    /// Recurrent width per layer.
    #[config(default = "vec![16, 32, 64]")]
    pub mdgru_channels: Vec<usize>,
    /// Projection width per layer, defaults to `[25, 45, num_classes]`.
    pub fc_channels: Option<Vec<Option<usize>>>,
    /// Stride per layer, defaults to unit strides everywhere.
    pub strides: Option<Vec<Option<StrideSpec>>>,
    #[config(default = 0.5)]
    pub dropout_rate: f64,
    #[config(default = "Activation::Tanh")]
    pub activation: Activation,
    /// Mixing weights of the region overlap loss; their sum is the weight of
    /// the Dice term. Absent selects plain cross-entropy.
    pub dice_loss_weight: Option<Vec<f32>>,
    /// Seed of the weight initializer.
    #[config(default = 42)]
    pub seed: u64,
}

impl MdgruConfig {
    /// Projection widths with the default applied.
    pub fn resolved_fc_channels(&self) -> Vec<Option<usize>> {
        self.fc_channels
            .clone()
            .unwrap_or_else(|| vec![Some(25), Some(45), Some(self.num_classes)])
    }

    /// Strides with the default applied.
    pub fn resolved_strides(&self) -> Vec<Option<StrideSpec>> {
        self.strides
            .clone()
            .unwrap_or_else(|| vec![None; self.mdgru_channels.len()])
    }

    pub fn block_options(&self) -> BlockOptions {
        BlockOptions {
            dropout_rate: self.dropout_rate,
            activation: self.activation,
        }
    }

    /// Resolve the layer list for an input with the given channels and rank.
    pub fn resolve(
        &self,
        input_channels: usize,
        spatial_rank: usize,
    ) -> crate::error::Result<Vec<LayerConfig>> {
        let layers = resolve_layers(
            &self.mdgru_channels,
            &self.resolved_fc_channels(),
            &self.resolved_strides(),
            input_channels,
            spatial_rank,
            self.block_options(),
        )?;

        let output_channels = layers
            .last()
            .map(LayerConfig::output_channels)
            .unwrap_or(input_channels);
        if output_channels != self.num_classes {
            return Err(Error::config(format!(
                "the last layer produces {} channels but {} classes are configured",
                output_channels, self.num_classes
            )));
        }
        Ok(layers)
    }
}

/// Configuration of a training run
#[derive(Config, Debug)]
pub struct TrainingConfig {
    pub model: MdgruConfig,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    /// Decay of the optimizer's first moment estimate.
    #[config(default = 0.9)]
    pub momentum: f32,
}
