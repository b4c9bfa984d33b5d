//! Staging buffers for batches and labels.
//!
//! Burn tensors own their data, so every load copies the host array once into
//! a fresh `TensorData` and nothing is reused across calls. What the buffers
//! keep is bookkeeping: the shape of the last staged batch, a counter of shape
//! changes, and the device fixed when the harness was built.

use burn::tensor::backend::Backend;
use burn::tensor::{Element, Int, Tensor, TensorData};
use log::debug;
use ndarray::ArrayD;

use crate::error::{Error, Result};
use crate::layout::{label_shape, volume_shape};
use crate::model::LossHead;

/// Shape of the last staged batch and the number of shape changes
#[derive(Debug, Clone)]
pub struct StagingBuffer {
    shape: Vec<usize>,
    reallocations: usize,
}

impl StagingBuffer {
    pub fn with_shape(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            reallocations: 0,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of shape changes after construction
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }

    /// Record the shape of `array` and copy it, in logical order, into tensor data
    fn stage<E: Element>(
        &mut self,
        array: &ArrayD<E>,
        padded: Vec<usize>,
        name: &str,
    ) -> TensorData {
        if array.shape() != self.shape.as_slice() {
            debug!(
                "{} buffer reallocated: {:?} -> {:?}",
                name,
                self.shape,
                array.shape()
            );
            self.shape = array.shape().to_vec();
            self.reallocations += 1;
        }
        TensorData::new(array.iter().copied().collect(), padded)
    }
}

/// Batch staging area bound to a device
#[derive(Debug)]
pub struct InputBuffer<B: Backend> {
    staging: StagingBuffer,
    channels: usize,
    spatial_rank: usize,
    device: B::Device,
}

impl<B: Backend> InputBuffer<B> {
    /// Size the buffer for a single sample of `data_shape`
    pub fn new(data_shape: &[usize], device: &B::Device) -> Result<Self> {
        volume_shape(data_shape)?;
        let mut shape = data_shape.to_vec();
        shape[0] = 1;

        Ok(Self {
            staging: StagingBuffer::with_shape(&shape),
            channels: data_shape[1],
            spatial_rank: data_shape.len() - 2,
            device: device.clone(),
        })
    }

    pub fn staging(&self) -> &StagingBuffer {
        &self.staging
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Stage `[batch, channels, spatial...]` and hand out the padded rank-5 tensor
    pub fn load(&mut self, batch: &ArrayD<f32>) -> Result<Tensor<B, 5>> {
        let shape = batch.shape();
        let padded = volume_shape(shape)?;
        if shape[1] != self.channels || shape.len() - 2 != self.spatial_rank {
            return Err(Error::input(
                shape,
                format!(
                    "model expects {} channels over {} spatial axes",
                    self.channels, self.spatial_rank
                ),
            ));
        }

        let data = self.staging.stage(batch, padded.to_vec(), "input");
        Ok(Tensor::from_data(data, &self.device))
    }
}

/// Label staging area bound to a device
///
/// Accepts `[batch, spatial...]` labels as well as the `[batch, 1, spatial...]`
/// layout that mirrors the input batch. Under cross-entropy every label must
/// name a class; under region overlap any positive label is foreground, so
/// only negative values are rejected.
#[derive(Debug)]
pub struct LabelBuffer<B: Backend> {
    staging: StagingBuffer,
    num_classes: usize,
    head: LossHead,
    device: B::Device,
}

impl<B: Backend> LabelBuffer<B> {
    /// Size the buffer for a single sample of `data_shape`
    ///
    /// # Arguments
    /// * `data_shape` - Canonical `[batch, channels, spatial...]` shape of the data
    /// * `num_classes` - Class count of the model
    /// * `head` - Loss head the labels feed, which decides the valid range
    /// * `device` - Device label tensors are created on
    pub fn new(
        data_shape: &[usize],
        num_classes: usize,
        head: LossHead,
        device: &B::Device,
    ) -> Result<Self> {
        volume_shape(data_shape)?;
        let mut shape = vec![1];
        shape.extend_from_slice(&data_shape[2..]);

        Ok(Self {
            staging: StagingBuffer::with_shape(&shape),
            num_classes,
            head,
            device: device.clone(),
        })
    }

    pub fn staging(&self) -> &StagingBuffer {
        &self.staging
    }

    /// Stage integer labels and hand out the padded `[batch, d0, d1, d2]` tensor
    pub fn load(&mut self, labels: &ArrayD<i64>, spatial_rank: usize) -> Result<Tensor<B, 4, Int>> {
        let labels = match labels.ndim() {
            n if n == spatial_rank + 2 && labels.shape()[1] == 1 => {
                labels.clone().index_axis_move(ndarray::Axis(1), 0)
            }
            n if n == spatial_rank + 1 => labels.clone(),
            _ => {
                return Err(Error::input(
                    labels.shape(),
                    format!("labels must cover {} spatial axes", spatial_rank),
                ))
            }
        };

        if let Some(&value) = labels.iter().find(|&&value| !self.accepts(value)) {
            return Err(Error::InvalidLabel {
                value,
                num_classes: self.num_classes,
            });
        }

        let padded = label_shape(labels.shape())?;
        let data = self.staging.stage(&labels, padded.to_vec(), "label");
        Ok(Tensor::from_data(data, &self.device))
    }

    fn accepts(&self, value: i64) -> bool {
        match self.head {
            LossHead::CrossEntropy => value >= 0 && (value as usize) < self.num_classes,
            LossHead::RegionOverlap { .. } => value >= 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use ndarray::IxDyn;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_same_shape_does_not_reallocate() {
        let device = Default::default();
        let mut buffer = InputBuffer::<TestBackend>::new(&[4, 2, 3, 3], &device).unwrap();
        assert_eq!(buffer.staging().shape(), &[1, 2, 3, 3]);

        let batch = ArrayD::<f32>::ones(IxDyn(&[1, 2, 3, 3]));
        let tensor = buffer.load(&batch).unwrap();
        buffer.load(&batch).unwrap();

        assert_eq!(tensor.dims(), [1, 2, 3, 3, 1]);
        assert_eq!(buffer.staging().reallocations(), 0);
    }

    #[test]
    fn test_new_shape_reallocates() {
        let device = Default::default();
        let mut buffer = InputBuffer::<TestBackend>::new(&[1, 1, 4], &device).unwrap();

        let batch = ArrayD::<f32>::from_shape_vec(IxDyn(&[2, 1, 3]), vec![1., 2., 3., 4., 5., 6.])
            .unwrap();
        let tensor = buffer.load(&batch).unwrap();

        assert_eq!(buffer.staging().reallocations(), 1);
        assert_eq!(buffer.staging().shape(), &[2, 1, 3]);
        assert_eq!(
            tensor.into_data().to_vec::<f32>().unwrap(),
            vec![1., 2., 3., 4., 5., 6.]
        );
    }

    #[test]
    fn test_channel_mismatch_is_rejected() {
        let device = Default::default();
        let mut buffer = InputBuffer::<TestBackend>::new(&[1, 2, 4, 4], &device).unwrap();

        let batch = ArrayD::<f32>::zeros(IxDyn(&[1, 3, 4, 4]));
        assert!(matches!(
            buffer.load(&batch).unwrap_err(),
            Error::InputShape { .. }
        ));
    }

    #[test]
    fn test_labels_with_channel_axis() {
        let device = Default::default();
        let mut buffer = LabelBuffer::<TestBackend>::new(&[1, 1, 2, 2], 3, LossHead::CrossEntropy, &device).unwrap();

        let labels =
            ArrayD::<i64>::from_shape_vec(IxDyn(&[1, 1, 2, 2]), vec![0, 1, 2, 1]).unwrap();
        let tensor = buffer.load(&labels, 2).unwrap();

        assert_eq!(tensor.dims(), [1, 2, 2, 1]);
        assert_eq!(buffer.staging().reallocations(), 0);
    }

    #[test]
    fn test_out_of_range_label() {
        let device = Default::default();
        let mut buffer = LabelBuffer::<TestBackend>::new(&[1, 1, 2], 2, LossHead::CrossEntropy, &device).unwrap();

        let labels = ArrayD::<i64>::from_shape_vec(IxDyn(&[1, 2]), vec![0, 2]).unwrap();
        let err = buffer.load(&labels, 1).unwrap_err();

        assert!(matches!(
            err,
            Error::InvalidLabel {
                value: 2,
                num_classes: 2
            }
        ));
    }

    #[test]
    fn test_region_overlap_accepts_extra_foreground_labels() {
        let device = Default::default();
        let head = LossHead::RegionOverlap { dice_weight: 0.5 };
        let mut buffer = LabelBuffer::<TestBackend>::new(&[1, 1, 3], 2, head, &device).unwrap();

        let labels = ArrayD::<i64>::from_shape_vec(IxDyn(&[1, 3]), vec![0, 1, 2]).unwrap();
        let tensor = buffer.load(&labels, 1).unwrap();
        assert_eq!(tensor.into_data().to_vec::<i64>().unwrap(), vec![0, 1, 2]);

        let negative = ArrayD::<i64>::from_shape_vec(IxDyn(&[1, 3]), vec![0, -1, 1]).unwrap();
        assert!(matches!(
            buffer.load(&negative, 1).unwrap_err(),
            Error::InvalidLabel { value: -1, .. }
        ));
    }
}
