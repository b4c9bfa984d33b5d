//! Prediction and loss head.
//!
//! Turns raw per-class scores into a per-voxel probability distribution and
//! computes the training loss. Two variants exist: plain cross-entropy and a
//! region overlap (Dice) term mixed with a foreground/background
//! cross-entropy.

use std::collections::BTreeMap;

use burn::nn::loss::CrossEntropyLossConfig;
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use crate::config::MdgruConfig;
use crate::error::{Error, Result};
use crate::layout::channels_last;

/// Loss strategy selected at model construction
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LossHead {
    /// Multi-class cross-entropy over raw scores and integer labels.
    #[default]
    CrossEntropy,
    /// `dice_weight * (1 - dice) + (1 - dice_weight) * cross_entropy(scores, labels > 0)`
    RegionOverlap { dice_weight: f32 },
}

impl LossHead {
    /// Pick the variant from the model configuration.
    ///
    /// Present `dice_loss_weight` entries select the region overlap variant
    /// with their sum as the Dice weight.
    pub fn from_config(config: &MdgruConfig) -> Result<Self> {
        match &config.dice_loss_weight {
            None => Ok(LossHead::CrossEntropy),
            Some(weights) => {
                let dice_weight: f32 = weights.iter().sum();
                if !(0.0..=1.0).contains(&dice_weight) {
                    return Err(Error::config(format!(
                        "dice_loss_weight {:?} sums to {}, expected a value in [0, 1]",
                        weights, dice_weight
                    )));
                }
                Ok(LossHead::RegionOverlap { dice_weight })
            }
        }
    }

    /// Softmax over the class axis of channel-first scores.
    pub fn predict<B: Backend>(&self, scores: Tensor<B, 5>) -> Tensor<B, 5> {
        activation::softmax(scores, 1)
    }

    /// Loss of channel-first raw scores `[batch, classes, d0, d1, d2]` against
    /// labels `[batch, d0, d1, d2]`.
    pub fn loss<B: Backend>(
        &self,
        scores: Tensor<B, 5>,
        labels: Tensor<B, 4, Int>,
    ) -> Result<Tensor<B, 1>> {
        let [batch, _, d0, d1, d2] = scores.dims();
        if labels.dims() != [batch, d0, d1, d2] {
            return Err(Error::input(
                &labels.dims(),
                format!("labels must match the score volume {:?}", [batch, d0, d1, d2]),
            ));
        }

        match *self {
            LossHead::CrossEntropy => Ok(cross_entropy(scores, labels)),
            LossHead::RegionOverlap { dice_weight } => {
                if dice_weight == 0.0 {
                    return Ok(cross_entropy(scores, foreground_mask(labels)));
                }

                let dice = region_overlap_score(self.predict(scores.clone()), labels.clone())?;
                let dice_term = dice.neg() + 1.0;
                if dice_weight == 1.0 {
                    return Ok(dice_term);
                }

                let pointwise = cross_entropy(scores, foreground_mask(labels));
                Ok(dice_term * dice_weight + pointwise * (1.0 - dice_weight))
            }
        }
    }
}

/// Mean cross-entropy of channel-first raw scores against integer labels.
pub fn cross_entropy<B: Backend>(scores: Tensor<B, 5>, targets: Tensor<B, 4, Int>) -> Tensor<B, 1> {
    let [batch, classes, d0, d1, d2] = scores.dims();
    let voxels = batch * d0 * d1 * d2;

    let logits = channels_last(scores).reshape([voxels, classes]);
    let targets = targets.reshape([voxels]);

    CrossEntropyLossConfig::new()
        .init(&logits.device())
        .forward(logits, targets)
}

/// Soft Dice score of a channel-first probability volume.
///
/// For every distinct foreground label present in the batch the foreground
/// probability (`1 - p(background)`) on that label's voxels is summed and
/// normalized by the label's voxel count; these recalls add up to the true
/// positive mass `tp`. The foreground probability on background voxels,
/// normalized by the background voxel count, gives the false positive rate
/// `fp`; background probability on those voxels is correct and not counted.
/// With `n` foreground labels the missed mass is `n - tp` and
///
/// `dice = 2 tp / (2 tp + (n - tp) + fp)`
///
/// Fails with [`Error::DegenerateBatch`] when no foreground voxel exists.
pub fn region_overlap_score<B: Backend>(
    probabilities: Tensor<B, 5>,
    labels: Tensor<B, 4, Int>,
) -> Result<Tensor<B, 1>> {
    let counts = label_counts(&labels);
    let background_voxels = counts.get(&0).copied().unwrap_or(0);
    let foreground: Vec<(i64, usize)> = counts
        .iter()
        .filter(|(label, _)| **label > 0)
        .map(|(label, count)| (*label, *count))
        .collect();
    if foreground.is_empty() {
        return Err(Error::DegenerateBatch);
    }

    let device = probabilities.device();
    let [batch, _, d0, d1, d2] = probabilities.dims();
    let background_prob = probabilities.narrow(1, 0, 1).reshape([batch, d0, d1, d2]);
    let foreground_prob = background_prob.clone().neg() + 1.0;

    let mut true_positive = Tensor::<B, 1>::zeros([1], &device);
    for (label, count) in &foreground {
        let mask = labels.clone().equal_elem(*label).float();
        let recall = (foreground_prob.clone() * mask).sum().div_scalar(*count as f32);
        true_positive = true_positive + recall;
    }

    let false_positive = if background_voxels > 0 {
        let mask = labels.equal_elem(0).float();
        (foreground_prob * mask)
            .sum()
            .div_scalar(background_voxels as f32)
    } else {
        Tensor::<B, 1>::zeros([1], &device)
    };

    let labels_present = foreground.len() as f32;
    let numerator = true_positive.clone() * 2.0;
    let denominator = true_positive + false_positive + labels_present;
    Ok(numerator / denominator)
}

/// `labels > 0` as integer classes.
fn foreground_mask<B: Backend>(labels: Tensor<B, 4, Int>) -> Tensor<B, 4, Int> {
    labels.greater_elem(0).int()
}

/// Voxel count per label value.
fn label_counts<B: Backend>(labels: &Tensor<B, 4, Int>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for value in labels.to_data().iter::<i64>() {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
}
