//! Deterministic weight initialization.
//!
//! Weights are drawn on the host from a seeded RNG so that two models built
//! from the same configuration start from identical parameters on any device.
//!
//! | Parameter | Scheme |
//! |-----------|--------|
//! | projection and GRU input weights | Xavier (Glorot) uniform |
//! | GRU recurrent weights | uniform in `±1/sqrt(hidden)` |
//! | biases | zeros |

use burn::module::Param;
use burn::nn::Linear;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::prelude::*;

use crate::cells::GruCell;
use crate::model::NetworkPipeline;
use crate::rnn::{MdRnn, MdgruBlock};

/// Seeded source of initial weights
pub struct WeightInit {
    rng: StdRng,
}

impl WeightInit {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn uniform<B: Backend>(
        &mut self,
        shape: [usize; 2],
        bound: f32,
        device: &B::Device,
    ) -> Tensor<B, 2> {
        let values: Vec<f32> = (0..shape[0] * shape[1])
            .map(|_| self.rng.random_range(-bound..=bound))
            .collect();
        Tensor::from_data(TensorData::new(values, shape), device)
    }

    /// Xavier uniform weights and zero bias
    fn xavier<B: Backend>(&mut self, mut linear: Linear<B>) -> Linear<B> {
        let [fan_in, fan_out] = linear.weight.dims();
        let bound = (6.0 / (fan_in + fan_out) as f32).sqrt();
        self.fill(&mut linear, bound);
        linear
    }

    /// Uniform weights in `±1/sqrt(hidden)` and zero bias
    fn recurrent<B: Backend>(&mut self, mut linear: Linear<B>) -> Linear<B> {
        let [hidden, _] = linear.weight.dims();
        let bound = 1.0 / (hidden as f32).sqrt();
        self.fill(&mut linear, bound);
        linear
    }

    fn fill<B: Backend>(&mut self, linear: &mut Linear<B>, bound: f32) {
        let device = linear.weight.device();
        let weight = self.uniform::<B>(linear.weight.dims(), bound, &device);
        linear.weight = Param::from_tensor(weight);
        linear.bias = linear
            .bias
            .take()
            .map(|bias| Param::from_tensor(Tensor::zeros(bias.dims(), &device)));
    }
}

/// Layers that know how to reinitialize their own parameters
pub trait Initialize {
    fn initialize(self, init: &mut WeightInit) -> Self;
}

impl<B: Backend> Initialize for GruCell<B> {
    fn initialize(mut self, init: &mut WeightInit) -> Self {
        self.input_map = init.xavier(self.input_map);
        self.recurrent_map = init.recurrent(self.recurrent_map);
        self
    }
}

impl<B: Backend> Initialize for MdRnn<B> {
    fn initialize(mut self, init: &mut WeightInit) -> Self {
        self.cells = self
            .cells
            .into_iter()
            .map(|cell| cell.initialize(init))
            .collect();
        self
    }
}

impl<B: Backend> Initialize for MdgruBlock<B> {
    fn initialize(mut self, init: &mut WeightInit) -> Self {
        self.mdrnn = self.mdrnn.initialize(init);
        self.fc = self.fc.map(|fc| init.xavier(fc));
        self
    }
}

impl<B: Backend> Initialize for NetworkPipeline<B> {
    fn initialize(mut self, init: &mut WeightInit) -> Self {
        self.blocks = self
            .blocks
            .into_iter()
            .map(|block| block.initialize(init))
            .collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve_layers, BlockOptions};
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn pipeline(seed: u64) -> NetworkPipeline<TestBackend> {
        let device = Default::default();
        let layers = resolve_layers(
            &[3, 4],
            &[Some(5), Some(2)],
            &[None, None],
            1,
            2,
            BlockOptions::default(),
        )
        .unwrap();
        NetworkPipeline::assemble(&layers, 1, 2, &device)
            .unwrap()
            .initialize(&mut WeightInit::new(seed))
    }

    fn fc_weight(pipeline: &NetworkPipeline<TestBackend>) -> Tensor<TestBackend, 2> {
        pipeline.blocks[0].fc.as_ref().unwrap().weight.val()
    }

    #[test]
    fn test_same_seed_same_weights() {
        let a = fc_weight(&pipeline(7));
        let b = fc_weight(&pipeline(7));

        assert_eq!(
            a.into_data().to_vec::<f32>().unwrap(),
            b.into_data().to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn test_different_seed_different_weights() {
        let a = fc_weight(&pipeline(7));
        let b = fc_weight(&pipeline(8));

        assert!((a - b).abs().sum().into_scalar() > 0.0);
    }

    #[test]
    fn test_xavier_bound_and_zero_bias() {
        let pipeline = pipeline(1);
        let fc = pipeline.blocks[0].fc.as_ref().unwrap();

        // fan_in 3, fan_out 5
        let bound = (6.0f32 / 8.0).sqrt();
        assert!(fc.weight.val().abs().max().into_scalar() <= bound);

        let bias = fc.bias.as_ref().unwrap().val();
        assert_eq!(bias.abs().sum().into_scalar(), 0.0);
    }

    #[test]
    fn test_recurrent_bound() {
        let pipeline = pipeline(3);
        let cell = &pipeline.blocks[1].mdrnn.cells[0];

        let bound = 1.0 / (4.0f32).sqrt();
        assert!(cell.recurrent_map.weight.val().abs().max().into_scalar() <= bound);
    }
}
