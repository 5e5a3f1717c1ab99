//! # Blockwork
//!
//! Composable machine-learning pipelines built from small, independently
//! testable blocks, with a deterministic identity hash for every composition.
//!
//! ## Features
//!
//! - **Three capabilities**: blocks transform data, train on `(x, y)` pairs, or
//!   refine predictions. Each is a trait with one or two methods.
//! - **Nested systems**: sequential and parallel systems hold blocks or other
//!   systems, and refuse steps outside their capability set.
//! - **Fixed-slot pipelines**: x/y transforms, training, then prediction and
//!   label post-processing, each stage optional.
//! - **Identity hashing**: equivalent pipelines (same steps, same order, same
//!   state) produce the same SHA-256 fingerprint, so expensive runs can be
//!   cached and deduplicated without re-execution.
//! - **Payload agnostic**: the core never looks inside the data it passes around.
//!
//! ## Quick Start
//!
//! ```rust
//! use blockwork::prelude::*;
//! use serde::Serialize;
//!
//! struct Scale;
//!
//! impl Block for Scale {}
//!
//! impl Transformer<Vec<f64>> for Scale {
//!     fn transform(&self, data: Vec<f64>, config: &Config) -> Result<Vec<f64>, PipelineError> {
//!         let factor = config.get("factor").and_then(JsonValue::as_f64).unwrap_or(1.0);
//!         Ok(data.into_iter().map(|v| v * factor).collect())
//!     }
//! }
//!
//! #[derive(Default, Serialize)]
//! struct MeanModel {
//!     mean: f64,
//! }
//!
//! impl Block for MeanModel {
//!     fn state(&self) -> Result<String, PipelineError> {
//!         canonical_json(self)
//!     }
//! }
//!
//! impl Trainer<Vec<f64>> for MeanModel {
//!     fn train(&mut self, x: Vec<f64>, y: Vec<f64>, _config: &Config) -> Result<(Vec<f64>, Vec<f64>), PipelineError> {
//!         self.mean = y.iter().sum::<f64>() / y.len().max(1) as f64;
//!         Ok((x, y))
//!     }
//!
//!     fn predict(&self, x: Vec<f64>, _config: &Config) -> Result<Vec<f64>, PipelineError> {
//!         Ok(vec![self.mean; x.len()])
//!     }
//! }
//!
//! fn main() -> Result<(), PipelineError> {
//!     let mut pipeline = Pipeline::builder()
//!         .x_system(TransformingSystem::new(vec![Step::transformer(Scale)])?)
//!         .train_system(Step::trainer(MeanModel::default()))
//!         .build()?;
//!
//!     let config = Config::new().with(X_SYS, serde_json::json!({ "Scale": { "factor": 2.0 } }));
//!     pipeline.train(vec![1.0, 2.0], vec![3.0, 5.0], &config)?;
//!     assert_eq!(pipeline.predict(vec![0.0], &config)?, vec![4.0]);
//!
//!     let hash = pipeline.compute_hash("")?;
//!     assert_eq!(hash.len(), 64);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`prelude`]: Commonly used types and traits (import with `use blockwork::prelude::*`)
//! - [`error`]: The [`PipelineError`] type returned by every fallible operation

// ============================================================================
// Core Module
// ============================================================================

mod core;
pub mod error;

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

// Identity
pub use crate::core::AsAny;
pub use crate::core::node::{Node, NodeCore, NodeId, Tree, canonical_json, digest};

// Blocks and steps
pub use crate::core::Step;
pub use crate::core::block::{Block, BlockNode, Refiner, Trainer, Transformer};
pub use crate::core::config::Config;
pub use crate::core::validation::{Capability, ParallelCapability, Refining, Training, Transforming};

// Systems
pub use crate::core::parallel::{
    Concat, FnConcat, ParallelBuilder, ParallelSystem, ParallelTrainingSystem,
    ParallelTransformingSystem, Unmerged,
};
pub use crate::core::sequential::{
    RefiningSystem, SequentialSystem, TrainingSystem, TransformingSystem,
};

// Pipeline
pub use crate::core::pipeline::{
    LABEL_SYS, PRED_SYS, Pipeline, PipelineBuilder, TRAIN_SYS, X_SYS, Y_SYS,
};

pub use error::PipelineError;

// ============================================================================
// Prelude Module - Convenient Bulk Imports
// ============================================================================

/// Imports everything needed to write blocks and compose them.
///
/// # Example
/// ```rust
/// use blockwork::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        // Blocks
        Block,
        Refiner,
        Trainer,
        Transformer,
        Step,
        // Identity
        Node,
        NodeId,
        Tree,
        canonical_json,
        digest,
        // Systems
        Concat,
        FnConcat,
        ParallelTrainingSystem,
        ParallelTransformingSystem,
        RefiningSystem,
        TrainingSystem,
        TransformingSystem,
        // Pipeline
        LABEL_SYS,
        PRED_SYS,
        Pipeline,
        TRAIN_SYS,
        X_SYS,
        Y_SYS,
        // Support
        Config,
        JsonValue,
        PipelineError,
    };
}

// ============================================================================
// Re-export commonly used external types for convenience
// ============================================================================

pub use serde_json::Value as JsonValue;

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
