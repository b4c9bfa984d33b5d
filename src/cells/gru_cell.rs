use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Gated recurrent unit cell used for every 1-D scan of the MDGRU
///
/// Implements the GRU equations:
/// - r = sigmoid(W_ir @ x + b_ir + W_hr @ h)
/// - z = sigmoid(W_iz @ x + b_iz + W_hz @ h)
/// - n = tanh(W_in @ x + b_in + r * (W_hn @ h))
/// - h' = (1 - z) * n + z * h
///
/// The input projection does not depend on the hidden state, so a whole line
/// of voxels is projected at once with [`GruCell::project_input`] and the scan
/// only runs [`GruCell::step`] per position.
#[derive(Module, Debug)]
pub struct GruCell<B: Backend> {
    input_size: usize,
    hidden_size: usize,
    pub(crate) input_map: Linear<B>,     // Maps input to 3 * hidden_size (with bias)
    pub(crate) recurrent_map: Linear<B>, // Maps hidden state to 3 * hidden_size (no bias)
}

impl<B: Backend> GruCell<B> {
    /// Create a new GRU cell
    ///
    /// # Arguments
    /// * `input_size` - Size of the input features
    /// * `hidden_size` - Size of the hidden state
    /// * `device` - Device to create the module on
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        let input_map = LinearConfig::new(input_size, 3 * hidden_size)
            .with_bias(true)
            .init(device);

        let recurrent_map = LinearConfig::new(hidden_size, 3 * hidden_size)
            .with_bias(false)
            .init(device);

        Self {
            input_size,
            hidden_size,
            input_map,
            recurrent_map,
        }
    }

    /// Get the input size
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Get the hidden size
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Project inputs of any rank (features last) to the `3 * hidden_size` gate space
    pub fn project_input<const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        self.input_map.forward(input)
    }

    /// Advance the hidden state by one position given pre-projected inputs
    ///
    /// # Arguments
    /// * `projected` - Output of [`GruCell::project_input`], shape `[batch, 3 * hidden_size]`
    /// * `hidden_state` - Previous hidden state, shape `[batch, hidden_size]`
    pub fn step(&self, projected: Tensor<B, 2>, hidden_state: Tensor<B, 2>) -> Tensor<B, 2> {
        let recurrent = self.recurrent_map.forward(hidden_state.clone());

        let x = projected.chunk(3, 1);
        let h = recurrent.chunk(3, 1);

        let reset = activation::sigmoid(x[0].clone() + h[0].clone());
        let update = activation::sigmoid(x[1].clone() + h[1].clone());
        let candidate = (x[2].clone() + reset * h[2].clone()).tanh();

        // h' = (1 - z) * n + z * h
        let keep = update.clone().neg() + 1.0;
        candidate * keep + hidden_state * update
    }

    /// Perform a single-timestep forward pass
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape `[batch_size, input_size]`
    /// * `hidden_state` - Hidden state of shape `[batch_size, hidden_size]`
    ///
    /// # Returns
    /// The new hidden state
    pub fn forward(&self, input: Tensor<B, 2>, hidden_state: Tensor<B, 2>) -> Tensor<B, 2> {
        self.step(self.project_input(input), hidden_state)
    }
}
