//! Tensor layout conventions.
//!
//! Volumes travel through the engine as rank-5 tensors. The compute-native
//! layout is channel-first, `[batch, channels, d0, d1, d2]`, and spatial axes a
//! volume does not have are padded with trailing size-1 axes. Blocks work on
//! the channel-last view `[batch, d0, d1, d2, channels]` so that `Linear`
//! layers act on the feature axis directly.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::{Error, Result};

/// Largest spatial rank the rank-5 layout can hold.
pub const MAX_SPATIAL_RANK: usize = 3;

/// `[batch, channels, d0, d1, d2]` -> `[batch, d0, d1, d2, channels]`
pub fn channels_last<B: Backend>(x: Tensor<B, 5>) -> Tensor<B, 5> {
    x.swap_dims(1, 2).swap_dims(2, 3).swap_dims(3, 4)
}

/// `[batch, d0, d1, d2, channels]` -> `[batch, channels, d0, d1, d2]`
pub fn channels_first<B: Backend>(x: Tensor<B, 5>) -> Tensor<B, 5> {
    x.swap_dims(3, 4).swap_dims(2, 3).swap_dims(1, 2)
}

/// Pad a `[batch, channels, spatial...]` shape to the rank-5 layout.
pub fn volume_shape(shape: &[usize]) -> Result<[usize; 5]> {
    if shape.len() < 3 || shape.len() > MAX_SPATIAL_RANK + 2 {
        return Err(Error::input(
            shape,
            format!(
                "expected [batch, channels, spatial...] with 1 to {} spatial axes",
                MAX_SPATIAL_RANK
            ),
        ));
    }
    let mut padded = [1; 5];
    padded[..shape.len()].copy_from_slice(shape);
    Ok(padded)
}

/// Pad a `[batch, spatial...]` label shape to `[batch, d0, d1, d2]`.
pub fn label_shape(shape: &[usize]) -> Result<[usize; 4]> {
    if shape.len() < 2 || shape.len() > MAX_SPATIAL_RANK + 1 {
        return Err(Error::input(
            shape,
            format!(
                "expected [batch, spatial...] labels with 1 to {} spatial axes",
                MAX_SPATIAL_RANK
            ),
        ));
    }
    let mut padded = [1; 4];
    padded[..shape.len()].copy_from_slice(shape);
    Ok(padded)
}
