use crate::core::config::Config;
use crate::core::node::{Node, NodeCore, Tree, fmt_tree};
use crate::core::validation::{
    Capability, Refining, Training, Transforming, validate_steps, warn_duplicate_labels,
};
use crate::core::{Step, adopt};
use crate::error::PipelineError;
use std::fmt;
use std::marker::PhantomData;

/// Runs its steps one after another, each consuming the previous output.
///
/// `C` fixes which steps the system accepts; see the [`TransformingSystem`],
/// [`TrainingSystem`] and [`RefiningSystem`] aliases.
pub struct SequentialSystem<D, C> {
    core: NodeCore,
    /// Public so callers can deliberately restructure a live system. Every
    /// dispatch re-validates it.
    pub steps: Vec<Step<D>>,
    capability: PhantomData<C>,
}

pub type TransformingSystem<D> = SequentialSystem<D, Transforming>;
pub type TrainingSystem<D> = SequentialSystem<D, Training>;
pub type RefiningSystem<D> = SequentialSystem<D, Refining>;

impl<D, C: Capability> SequentialSystem<D, C> {
    /// Builds the system, failing on the first step outside its capability set.
    pub fn new(steps: Vec<Step<D>>) -> Result<Self, PipelineError> {
        validate_steps::<D, C>(C::SEQUENTIAL, &steps)?;
        warn_duplicate_labels(C::SEQUENTIAL, &steps);

        let core = NodeCore::new();
        let mut steps = steps;
        adopt(core.id, &mut steps);

        Ok(SequentialSystem {
            core,
            steps,
            capability: PhantomData,
        })
    }

    /// Sets the label under which this system reads its configuration
    /// section when nested in another system.
    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.core.label = Some(label.into());
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        validate_steps::<D, C>(C::SEQUENTIAL, &self.steps)
    }
}

impl<D, C: Capability> Default for SequentialSystem<D, C> {
    fn default() -> Self {
        SequentialSystem {
            core: NodeCore::new(),
            steps: Vec::new(),
            capability: PhantomData,
        }
    }
}

impl<D: Clone> TransformingSystem<D> {
    pub fn transform(&self, data: D, config: &Config) -> Result<D, PipelineError> {
        self.validate()?;
        let mut data = data;
        for step in &self.steps {
            let section = config.section(step.label())?;
            data = step.transform(Transforming::SEQUENTIAL, data, &section)?;
        }
        Ok(data)
    }
}

impl<D: Clone> TrainingSystem<D> {
    /// Threads `(x, y)` through every step's `train`.
    pub fn train(&mut self, x: D, y: D, config: &Config) -> Result<(D, D), PipelineError> {
        self.validate()?;
        let (mut x, mut y) = (x, y);
        for step in &mut self.steps {
            let section = config.section(step.label())?;
            (x, y) = step.train(Training::SEQUENTIAL, x, y, &section)?;
        }
        Ok((x, y))
    }

    /// Threads `x` through every step's `predict`. Labels are not needed.
    pub fn predict(&self, x: D, config: &Config) -> Result<D, PipelineError> {
        self.validate()?;
        let mut x = x;
        for step in &self.steps {
            let section = config.section(step.label())?;
            x = step.predict(Training::SEQUENTIAL, x, &section)?;
        }
        Ok(x)
    }
}

impl<D> RefiningSystem<D> {
    pub fn predict(&self, y: D) -> Result<D, PipelineError> {
        self.validate()?;
        self.steps
            .iter()
            .try_fold(y, |y, step| step.refine(Refining::SEQUENTIAL, y))
    }
}

impl<D, C: Capability> Node for SequentialSystem<D, C> {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn type_name(&self) -> &str {
        C::SEQUENTIAL
    }

    /// Threads the hash through the steps in order; an empty system leaves
    /// `prev_hash` unchanged.
    fn compute_hash(&mut self, prev_hash: &str) -> Result<String, PipelineError> {
        let mut hash = prev_hash.to_string();
        for step in &mut self.steps {
            hash = step.compute_hash(&hash)?;
        }
        log::debug!("Hashed {} ({} steps) -> {}", C::SEQUENTIAL, self.steps.len(), hash);
        self.core.hash = hash.clone();
        Ok(hash)
    }
}

impl<D, C: Capability> Tree<D> for SequentialSystem<D, C> {
    fn children(&self) -> Vec<&Step<D>> {
        self.steps.iter().collect()
    }
}

impl<D, C: Capability> fmt::Debug for SequentialSystem<D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_tree(self, f)
    }
}
