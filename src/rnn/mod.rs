//! # Multi-Dimensional Recurrent Layers
//!
//! | Layer | Description |
//! |-------|-------------|
//! | [`MdRnn`] | Forward and backward GRU scans along each spatial axis, summed |
//! | [`MdgruBlock`] | Input dropout, an [`MdRnn`] and an optional per-voxel projection |
//!
//! ## Tensor Shapes
//!
//! Both layers work on channel-last volumes `[batch, d0, d1, d2, channels]`.
//! Axes past the spatial rank have size 1. A stride `s` on an axis of length
//! `L` scans `ceil(L / s)` positions, which are then repeated back to `L`, so
//! both layers keep the spatial extent of their input.
//!
//! ## Example
//!
//! ```rust
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//! use mdgru::rnn::MdRnn;
//!
//! type Backend = NdArray<f32>;
//! let device = Default::default();
//!
//! let mdrnn = MdRnn::<Backend>::new(2, 8, 2, &device).with_strides(vec![2, 1]);
//! let input = Tensor::<Backend, 5>::zeros([1, 5, 4, 1, 2], &device);
//!
//! assert_eq!(mdrnn.forward(input).dims(), [1, 5, 4, 1, 8]);
//! ```

pub mod block;
pub mod mdrnn;

pub use block::MdgruBlock;
pub use mdrnn::MdRnn;
