//! A complete example showing how to compose a small regression pipeline with Blockwork.
//!
//! This example demonstrates:
//! - Writing transformer, trainer and refiner blocks
//! - Merging parallel branches with a custom concat
//! - Routing configuration to individual steps by label
//! - Comparing pipelines by their identity hash

use blockwork::prelude::*;
use serde::Serialize;
use serde_json::json;

/// One sample per row.
type Rows = Vec<Vec<f64>>;

// ============================================================================
// Feature blocks
// ============================================================================

/// Adds `shift` (from config) to every feature.
struct Shift;

impl Block for Shift {}

impl Transformer<Rows> for Shift {
    fn transform(&self, data: Rows, config: &Config) -> Result<Rows, PipelineError> {
        let shift = config.get("shift").and_then(JsonValue::as_f64).unwrap_or(0.0);
        Ok(data
            .into_iter()
            .map(|row| row.into_iter().map(|v| v + shift).collect())
            .collect())
    }
}

/// Squares every feature.
struct Square;

impl Block for Square {}

impl Transformer<Rows> for Square {
    fn transform(&self, data: Rows, _config: &Config) -> Result<Rows, PipelineError> {
        Ok(data
            .into_iter()
            .map(|row| row.into_iter().map(|v| v * v).collect())
            .collect())
    }
}

/// Identity branch, so the raw features survive next to the squared ones.
struct Raw;

impl Block for Raw {}

impl Transformer<Rows> for Raw {
    fn transform(&self, data: Rows, _config: &Config) -> Result<Rows, PipelineError> {
        Ok(data)
    }
}

/// Places the columns of two branches side by side.
fn hstack(left: Rows, right: Rows, _weight: f64) -> Rows {
    left.into_iter()
        .zip(right)
        .map(|(mut l, r)| {
            l.extend(r);
            l
        })
        .collect()
}

// ============================================================================
// Model
// ============================================================================

/// Least squares without intercept, one coefficient per feature, fitted
/// independently.
#[derive(Default, Serialize)]
struct Diagonal {
    coefficients: Vec<f64>,
}

impl Block for Diagonal {
    fn state(&self) -> Result<String, PipelineError> {
        canonical_json(self)
    }
}

impl Trainer<Rows> for Diagonal {
    fn train(&mut self, x: Rows, y: Rows, _config: &Config) -> Result<(Rows, Rows), PipelineError> {
        let width = x.first().map_or(0, Vec::len);
        self.coefficients = (0..width)
            .map(|j| {
                let xx: f64 = x.iter().map(|row| row[j] * row[j]).sum();
                let xy: f64 = x.iter().zip(&y).map(|(row, t)| row[j] * t[0]).sum();
                if xx == 0.0 { 0.0 } else { xy / xx / width as f64 }
            })
            .collect();
        Ok((x, y))
    }

    fn predict(&self, x: Rows, _config: &Config) -> Result<Rows, PipelineError> {
        Ok(x.into_iter()
            .map(|row| vec![row.iter().zip(&self.coefficients).map(|(v, c)| v * c).sum()])
            .collect())
    }
}

/// Clamps predictions at zero.
struct NonNegative;

impl Block for NonNegative {}

impl Refiner<Rows> for NonNegative {
    fn predict(&self, y: Rows) -> Result<Rows, PipelineError> {
        Ok(y.into_iter()
            .map(|row| row.into_iter().map(|v| v.max(0.0)).collect())
            .collect())
    }
}

fn build_pipeline() -> Result<Pipeline<Rows>, PipelineError> {
    let features = TransformingSystem::new(vec![
        Step::transformer(Shift).named("center"),
        Step::from(ParallelTransformingSystem::with_concat(
            vec![Step::transformer(Square), Step::transformer(Raw)],
            hstack,
        )?),
    ])?;

    Pipeline::builder()
        .x_system(features)
        .train_system(Step::trainer(Diagonal::default()))
        .build()
}

fn main() -> Result<(), PipelineError> {
    println!("=== Blockwork Basic Pipeline Example ===\n");

    let mut pipeline = build_pipeline()?;
    let config = Config::new().with(X_SYS, json!({ "center": { "shift": -1.0 } }));

    let x: Rows = vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]];
    let y: Rows = vec![vec![0.0], vec![2.0], vec![6.0], vec![12.0]];

    println!("--- Untrained ---");
    println!("hash: {}", pipeline.compute_hash("")?);

    pipeline.train(x.clone(), y, &config)?;
    let trained_hash = pipeline.compute_hash("")?;
    println!("\n--- Trained ---");
    println!("hash: {}", trained_hash);

    let raw = pipeline.predict(vec![vec![0.0], vec![5.0]], &config)?;
    let refined = RefiningSystem::new(vec![Step::refiner(NonNegative)])?.predict(raw.clone())?;
    println!("\nraw predictions:     {:?}", raw);
    println!("refined predictions: {:?}", refined);

    // Training a fresh pipeline on the same data reproduces the same fingerprint.
    let mut twin = build_pipeline()?;
    twin.train(x, vec![vec![0.0], vec![2.0], vec![6.0], vec![12.0]], &config)?;
    println!("\ntwin matches: {}", twin.compute_hash("")? == trained_hash);

    println!("\n{:?}", pipeline);
    println!("=== Pipeline completed successfully! ===");
    Ok(())
}
