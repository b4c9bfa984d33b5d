//! Network assembly: resolved layer configurations to an ordered block pipeline.

use std::fmt::{self, Write};

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::config::LayerConfig;
use crate::error::{Error, Result};
use crate::rnn::MdgruBlock;

/// Ordered stack of [`MdgruBlock`]s, shallow to deep
#[derive(Module, Debug)]
pub struct NetworkPipeline<B: Backend> {
    pub(crate) blocks: Vec<MdgruBlock<B>>,
    input_channels: usize,
    output_channels: usize,
    spatial_rank: usize,
}

impl<B: Backend> NetworkPipeline<B> {
    /// Instantiate one block per layer configuration
    ///
    /// The running channel width is threaded through the layers: every layer
    /// must consume what the previous one produced.
    pub fn assemble(
        layers: &[LayerConfig],
        input_channels: usize,
        spatial_rank: usize,
        device: &B::Device,
    ) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::config("cannot assemble an empty pipeline"));
        }

        let mut running_channels = input_channels;
        for (index, layer) in layers.iter().enumerate() {
            if layer.input_channels != running_channels {
                return Err(Error::config(format!(
                    "layer {} expects {} input channels but receives {}",
                    index, layer.input_channels, running_channels
                )));
            }
            if layer.is_final != (index == layers.len() - 1) {
                return Err(Error::config(format!(
                    "layer {} has an inconsistent final-layer flag",
                    index
                )));
            }
            running_channels = layer.output_channels();
        }

        let blocks = layers
            .iter()
            .map(|layer| MdgruBlock::new(layer, spatial_rank, device))
            .collect();

        Ok(Self {
            blocks,
            input_channels,
            output_channels: running_channels,
            spatial_rank,
        })
    }

    pub fn blocks(&self) -> &[MdgruBlock<B>] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    pub fn spatial_rank(&self) -> usize {
        self.spatial_rank
    }

    /// Forward pass on a channel-last volume
    pub fn forward(&self, input: Tensor<B, 5>) -> Tensor<B, 5> {
        self.blocks
            .iter()
            .fold(input, |hidden, block| block.forward(hidden))
    }
}

impl<B: Backend> NetworkPipeline<B> {
    /// Layer-by-layer description, one block per line
    pub fn summary(&self) -> String {
        let mut summary = String::new();
        // writing into a String cannot fail
        let _ = self.write_summary(&mut summary);
        summary
    }

    fn write_summary(&self, f: &mut impl fmt::Write) -> fmt::Result {
        writeln!(
            f,
            "NetworkPipeline(spatial_rank={}, {} -> {})",
            self.spatial_rank, self.input_channels, self.output_channels
        )?;
        for (index, block) in self.blocks.iter().enumerate() {
            write!(
                f,
                "  ({}) MdgruBlock: mdgru {} -> {}, strides {:?}",
                index,
                block.input_channels(),
                block.recurrent_channels(),
                block.strides()
            )?;
            if block.has_projection() {
                write!(
                    f,
                    ", fc {} -> {}",
                    block.recurrent_channels(),
                    block.output_channels()
                )?;
            }
            if !block.is_activated() && block.has_projection() {
                write!(f, " (no activation)")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve_layers, BlockOptions};
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_assemble_chains_widths() {
        let device = Default::default();
        let layers = resolve_layers(
            &[4, 6, 8],
            &[Some(5), None, Some(3)],
            &[None, None, None],
            2,
            2,
            BlockOptions::default(),
        )
        .unwrap();

        let pipeline = NetworkPipeline::<TestBackend>::assemble(&layers, 2, 2, &device).unwrap();

        assert_eq!(pipeline.len(), 3);
        for pair in pipeline.blocks().windows(2) {
            assert_eq!(pair[0].output_channels(), pair[1].input_channels());
        }
        assert_eq!(pipeline.output_channels(), 3);
    }

    #[test]
    fn test_assemble_rejects_broken_chain() {
        let device = Default::default();
        let mut layers = resolve_layers(
            &[4, 6],
            &[Some(5), Some(3)],
            &[None, None],
            2,
            2,
            BlockOptions::default(),
        )
        .unwrap();
        layers[1].input_channels = 7;

        let err = NetworkPipeline::<TestBackend>::assemble(&layers, 2, 2, &device).unwrap_err();
        assert!(matches!(err, Error::ConfigMismatch(_)));
    }

    #[test]
    fn test_summary_lists_every_block() {
        let device = Default::default();
        let layers = resolve_layers(
            &[4, 6],
            &[None, Some(3)],
            &[None, None],
            1,
            3,
            BlockOptions::default(),
        )
        .unwrap();
        let pipeline = NetworkPipeline::<TestBackend>::assemble(&layers, 1, 3, &device).unwrap();

        let summary = pipeline.summary();
        assert!(summary.contains("(0) MdgruBlock: mdgru 1 -> 4"));
        assert!(summary.contains("(1) MdgruBlock: mdgru 4 -> 6, strides [1, 1, 1], fc 6 -> 3 (no activation)"));
    }
}
