//! Capability sets and the single validation pass used by every composite,
//! both when it is built and whenever it dispatches.

use crate::core::Step;
use crate::core::node::Node;
use crate::error::PipelineError;
use std::collections::HashSet;

/// The set of steps a system accepts, and the names of the systems built over it.
pub trait Capability: 'static {
    /// Type name of the sequential system over this capability.
    const SEQUENTIAL: &'static str;
    /// Human readable capability set, used in error messages.
    const EXPECTED: &'static str;

    fn accepts<D>(step: &Step<D>) -> bool;
}

/// Capabilities that also have a parallel system.
pub trait ParallelCapability: Capability {
    const PARALLEL: &'static str;
}

/// `data -> data` steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transforming;

/// `(x, y) -> (x, y)` steps that can also predict.
#[derive(Debug, Clone, Copy, Default)]
pub struct Training;

/// Prediction post-processing steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct Refining;

impl Capability for Transforming {
    const SEQUENTIAL: &'static str = "TransformingSystem";
    const EXPECTED: &'static str = "Transformer, TransformingSystem or ParallelTransformingSystem";

    fn accepts<D>(step: &Step<D>) -> bool {
        matches!(
            step,
            Step::Transformer(_) | Step::TransformingSystem(_) | Step::ParallelTransformingSystem(_)
        )
    }
}

impl ParallelCapability for Transforming {
    const PARALLEL: &'static str = "ParallelTransformingSystem";
}

impl Capability for Training {
    const SEQUENTIAL: &'static str = "TrainingSystem";
    const EXPECTED: &'static str = "Trainer, TrainingSystem, ParallelTrainingSystem or Pipeline";

    fn accepts<D>(step: &Step<D>) -> bool {
        matches!(
            step,
            Step::Trainer(_)
                | Step::TrainingSystem(_)
                | Step::ParallelTrainingSystem(_)
                | Step::Pipeline(_)
        )
    }
}

impl ParallelCapability for Training {
    const PARALLEL: &'static str = "ParallelTrainingSystem";
}

impl Capability for Refining {
    const SEQUENTIAL: &'static str = "RefiningSystem";
    const EXPECTED: &'static str = "Refiner or RefiningSystem";

    fn accepts<D>(step: &Step<D>) -> bool {
        matches!(step, Step::Refiner(_) | Step::RefiningSystem(_))
    }
}

/// Checks one step against capability `C`.
pub(crate) fn validate_step<D, C: Capability>(
    system: &str,
    step: &Step<D>,
) -> Result<(), PipelineError> {
    if C::accepts(step) {
        Ok(())
    } else {
        Err(rejected(system, step, C::EXPECTED))
    }
}

/// Checks every step, failing on the first one outside capability `C`.
pub(crate) fn validate_steps<D, C: Capability>(
    system: &str,
    steps: &[Step<D>],
) -> Result<(), PipelineError> {
    steps
        .iter()
        .try_for_each(|step| validate_step::<D, C>(system, step))
}

pub(crate) fn rejected<D>(system: &str, step: &Step<D>, expected: &'static str) -> PipelineError {
    PipelineError::InvalidStep {
        system: system.to_string(),
        step: step.describe(),
        expected,
    }
}

/// Steps sharing a label also share their configuration section.
pub(crate) fn warn_duplicate_labels<D>(system: &str, steps: &[Step<D>]) {
    let mut seen = HashSet::new();
    for step in steps {
        if !seen.insert(step.label()) {
            log::warn!(
                "{} holds several steps labelled {}; they will receive the same configuration.",
                system,
                step.label()
            );
        }
    }
}
