//! Save and Load Example
//!
//! Shows the checkpoint round trip: model and optimizer state go into one
//! file named after the global step, and loading restores both together.

use anyhow::Result;
use burn::backend::{Autodiff, NdArray};
use mdgru::eval::Checkpoint;
use mdgru::prelude::*;
use ndarray::{ArrayD, IxDyn};

type Backend = Autodiff<NdArray<f32>>;

fn main() -> Result<()> {
    env_logger::init();
    println!("=== Checkpoint Save/Load Example ===\n");

    let device = Default::default();
    let config = TrainingConfig::new(
        MdgruConfig::new(2)
            .with_mdgru_channels(vec![4])
            .with_fc_channels(Some(vec![Some(2)])),
    );

    let image = ArrayD::<f32>::from_shape_fn(IxDyn(&[1, 1, 6, 6]), |index| {
        ((index[2] + index[3]) % 2) as f32
    });
    let labels = image.mapv(|value| value as i64);

    let mut harness = supervised_evaluation::<Backend>(&config, &[1, 1, 6, 6], &device)?;
    for _ in 0..3 {
        harness.fit(&image, &labels)?;
    }

    let dir = tempfile::tempdir()?;
    let path = harness.save(dir.path().join("checkerboard"))?;
    println!("Saved after {} steps: {}", harness.global_step(), path.display());

    let checkpoint = Checkpoint::read(&path)?;
    println!("  format:          {}", checkpoint.format);
    println!("  model section:   {} bytes", checkpoint.model.len());
    println!("  optimizer step:  {}", checkpoint.optimizer.step);
    println!("  optimizer state: {} bytes", checkpoint.optimizer.state.len());
    println!();

    let mut restored = supervised_evaluation::<Backend>(&config, &[1, 1, 6, 6], &device)?;
    restored.load(&path)?;

    let before = harness.predict(&image)?;
    let after = restored.predict(&image)?;
    let max_diff = before
        .iter()
        .zip(after.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);

    println!("Restored step: {}", restored.global_step());
    println!("Max prediction difference after reload: {:e}", max_diff);

    let broken = dir.path().join("broken-1");
    std::fs::write(&broken, b"not a checkpoint")?;
    match restored.load(&broken) {
        Err(Error::CheckpointFormat { reason, .. }) => println!("Rejected broken file: {}", reason),
        other => println!("Unexpected result: {:?}", other),
    }

    Ok(())
}
