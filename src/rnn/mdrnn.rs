//! Multi-dimensional GRU layer
//!
//! Runs two 1-D GRU scans (one per direction) along every spatial axis of a
//! volume and sums their hidden states, so that each output voxel sees
//! context from the whole volume. Strided axes are scanned on a subsampled
//! grid and repeated back to their input length afterwards.

use crate::cells::GruCell;
use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};

/// Multi-dimensional GRU
///
/// Operates on channel-last volumes `[batch, d0, d1, d2, channels]`. Spatial
/// axes beyond `spatial_rank` are expected to have size 1 and are not scanned.
///
/// # Type Parameters
/// * `B` - The backend type
#[derive(Module, Debug)]
pub struct MdRnn<B: Backend> {
    /// One cell per (axis, direction): `cells[2 * axis]` scans forward,
    /// `cells[2 * axis + 1]` scans backward
    pub(crate) cells: Vec<GruCell<B>>,
    /// Stride per spatial axis
    strides: Vec<usize>,
    input_channels: usize,
    hidden_channels: usize,
    spatial_rank: usize,
}

impl<B: Backend> MdRnn<B> {
    /// Create a new multi-dimensional GRU with unit strides
    ///
    /// # Arguments
    /// * `input_channels` - Number of input features per voxel
    /// * `hidden_channels` - Number of hidden units per voxel
    /// * `spatial_rank` - Number of spatial axes to scan
    /// * `device` - Device to create the module on
    pub fn new(
        input_channels: usize,
        hidden_channels: usize,
        spatial_rank: usize,
        device: &B::Device,
    ) -> Self {
        let cells = (0..2 * spatial_rank)
            .map(|_| GruCell::new(input_channels, hidden_channels, device))
            .collect();

        Self {
            cells,
            strides: vec![1; spatial_rank],
            input_channels,
            hidden_channels,
            spatial_rank,
        }
    }

    /// Set the stride per spatial axis (default: all 1)
    pub fn with_strides(mut self, strides: Vec<usize>) -> Self {
        self.strides = strides;
        self
    }

    /// Get input channels
    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    /// Get hidden channels
    pub fn hidden_channels(&self) -> usize {
        self.hidden_channels
    }

    pub fn spatial_rank(&self) -> usize {
        self.spatial_rank
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Forward pass through the multi-dimensional GRU
    ///
    /// # Arguments
    /// * `input` - Channel-last volume `[batch, d0, d1, d2, input_channels]`
    ///
    /// # Returns
    /// Channel-last volume `[batch, d0, d1, d2, hidden_channels]`, with the
    /// spatial extent of the input
    pub fn forward(&self, input: Tensor<B, 5>) -> Tensor<B, 5> {
        let extent = input.dims();
        let input = self.subsample(input);

        let mut output: Option<Tensor<B, 5>> = None;
        for axis in 0..self.spatial_rank {
            for (direction, reverse) in [(0, false), (1, true)] {
                let cell = &self.cells[2 * axis + direction];
                let scanned = self.scan_axis(cell, input.clone(), axis, reverse);
                output = Some(match output {
                    Some(sum) => sum + scanned,
                    None => scanned,
                });
            }
        }

        match output {
            Some(output) => self.upsample(output, extent),
            None => {
                let [batch, d0, d1, d2, _] = extent;
                Tensor::zeros([batch, d0, d1, d2, self.hidden_channels], &input.device())
            }
        }
    }

    /// Keep every `stride`-th voxel along each strided axis
    fn subsample(&self, mut input: Tensor<B, 5>) -> Tensor<B, 5> {
        let device = input.device();
        for (axis, &stride) in self.strides.iter().enumerate() {
            if stride <= 1 {
                continue;
            }
            let dim = axis + 1;
            let length = input.dims()[dim] as i64;
            let indices = Tensor::<B, 1, Int>::arange_step(0..length, stride, &device);
            input = input.select(dim, indices);
        }
        input
    }

    /// Nearest-neighbour repeat of each strided axis back to its length in `extent`
    ///
    /// Position `i` takes the scan result of subsampled position `i / stride`.
    fn upsample(&self, mut output: Tensor<B, 5>, extent: [usize; 5]) -> Tensor<B, 5> {
        let device = output.device();
        for (axis, &stride) in self.strides.iter().enumerate() {
            if stride <= 1 {
                continue;
            }
            let dim = axis + 1;
            let length = extent[dim];
            let indices: Vec<i64> = (0..length).map(|i| (i / stride) as i64).collect();
            let indices = Tensor::<B, 1, Int>::from_data(TensorData::new(indices, [length]), &device);
            output = output.select(dim, indices);
        }
        output
    }

    /// Run one directional GRU over every line of voxels along `axis`
    fn scan_axis(
        &self,
        cell: &GruCell<B>,
        input: Tensor<B, 5>,
        axis: usize,
        reverse: bool,
    ) -> Tensor<B, 5> {
        let dim = axis + 1;

        // Move the scanned axis next to the channels: [batch, p, q, length, channels]
        let lines = if dim == 3 { input } else { input.swap_dims(dim, 3) };
        let [batch, p, q, length, channels] = lines.dims();
        let sequences = lines.reshape([batch * p * q, length, channels]);

        let scanned = self.scan(cell, sequences, reverse);

        let restored = scanned.reshape([batch, p, q, length, self.hidden_channels]);
        if dim == 3 {
            restored
        } else {
            restored.swap_dims(dim, 3)
        }
    }

    /// Scan `[lines, length, channels]` into `[lines, length, hidden_channels]`
    fn scan(&self, cell: &GruCell<B>, sequences: Tensor<B, 3>, reverse: bool) -> Tensor<B, 3> {
        let device = sequences.device();
        let [lines, length, _] = sequences.dims();

        // Input projection for the whole line in one go
        let projected = cell.project_input(sequences);
        let gates = 3 * self.hidden_channels;

        let mut state = Tensor::<B, 2>::zeros([lines, self.hidden_channels], &device);
        let mut outputs: Vec<Tensor<B, 2>> = Vec::with_capacity(length);

        for step in 0..length {
            let t = if reverse { length - 1 - step } else { step };
            let step_input = projected.clone().narrow(1, t, 1).reshape([lines, gates]);
            state = cell.step(step_input, state);
            outputs.push(state.clone());
        }

        if reverse {
            outputs.reverse();
        }

        Tensor::stack::<3>(outputs, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::backend::Backend as BurnBackend;

    type TestBackend = NdArray<f32>;
    type TestDevice = <TestBackend as BurnBackend>::Device;

    fn get_test_device() -> TestDevice {
        Default::default()
    }

    #[test]
    fn test_mdrnn_creation() {
        let device = get_test_device();
        let rnn = MdRnn::<TestBackend>::new(3, 8, 3, &device);

        assert_eq!(rnn.input_channels(), 3);
        assert_eq!(rnn.hidden_channels(), 8);
        assert_eq!(rnn.cells.len(), 6);
        assert_eq!(rnn.strides(), &[1, 1, 1]);
    }

    #[test]
    fn test_mdrnn_forward_3d() {
        let device = get_test_device();
        let rnn = MdRnn::<TestBackend>::new(2, 5, 3, &device);

        let input = Tensor::<TestBackend, 5>::random(
            [2, 4, 3, 5, 2],
            burn::tensor::Distribution::Uniform(-1.0, 1.0),
            &device,
        );
        let output = rnn.forward(input);

        assert_eq!(output.dims(), [2, 4, 3, 5, 5]);
    }

    #[test]
    fn test_mdrnn_forward_2d_padded() {
        let device = get_test_device();
        let rnn = MdRnn::<TestBackend>::new(1, 4, 2, &device);

        let input = Tensor::<TestBackend, 5>::ones([1, 6, 5, 1, 1], &device);
        let output = rnn.forward(input);

        assert_eq!(output.dims(), [1, 6, 5, 1, 4]);
    }

    #[test]
    fn test_mdrnn_strides() {
        let device = get_test_device();
        let rnn = MdRnn::<TestBackend>::new(1, 4, 3, &device).with_strides(vec![2, 1, 3]);

        let input = Tensor::<TestBackend, 5>::ones([1, 5, 4, 6, 1], &device);
        let output = rnn.forward(input);

        assert_eq!(output.dims(), [1, 5, 4, 6, 4]);
    }

    #[test]
    fn test_mdrnn_strides_repeat_neighbours() {
        let device = get_test_device();
        let rnn = MdRnn::<TestBackend>::new(1, 3, 1, &device).with_strides(vec![2]);

        let input = Tensor::<TestBackend, 5>::random(
            [1, 5, 1, 1, 1],
            burn::tensor::Distribution::Uniform(-1.0, 1.0),
            &device,
        );
        let output = rnn.forward(input);

        // positions 0 and 1 share subsampled position 0, 2 and 3 share 1
        let at = |i: usize| output.clone().narrow(1, i, 1);
        assert!((at(0) - at(1)).abs().max().into_scalar() < 1e-7);
        assert!((at(2) - at(3)).abs().max().into_scalar() < 1e-7);
        assert!((at(3) - at(4)).abs().max().into_scalar() > 0.0);
    }

    #[test]
    fn test_mdrnn_context_spreads_across_volume() {
        let device = get_test_device();
        let rnn = MdRnn::<TestBackend>::new(1, 4, 2, &device);

        let zeros = Tensor::<TestBackend, 5>::zeros([1, 4, 4, 1, 1], &device);
        let mut impulse_data = vec![0.0f32; 16];
        impulse_data[0] = 1.0;
        let impulse = Tensor::<TestBackend, 5>::from_data(
            burn::tensor::TensorData::new(impulse_data, [1, 4, 4, 1, 1]),
            &device,
        );

        let base = rnn.forward(zeros);
        let excited = rnn.forward(impulse);

        // The voxel in the opposite row of the impulse changes through the column scan
        let diff = (excited - base)
            .slice([0..1, 3..4, 0..1, 0..1, 0..4])
            .abs()
            .sum()
            .into_scalar();
        assert!(diff > 0.0);
    }
}
