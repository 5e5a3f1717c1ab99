use crate::core::config::Config;
use crate::core::node::{Node, NodeCore, Tree, digest, fmt_tree, short_type_name};
use crate::core::validation::{
    ParallelCapability, Training, Transforming, validate_steps, warn_duplicate_labels,
};
use crate::core::{Step, adopt};
use crate::error::PipelineError;
use std::fmt;
use std::marker::PhantomData;

/// How a parallel system merges the outputs of its branches.
///
/// `concat` has no meaningful default: a parallel system that never says how
/// to merge fails with [`PipelineError::NotImplemented`] as soon as a second
/// branch produces output.
pub trait Concat<D> {
    /// Folds `to_concat` (produced by a branch with normalized weight
    /// `weight`) into `original`.
    fn concat(&self, _original: D, _to_concat: D, _weight: f64) -> Result<D, PipelineError> {
        Err(PipelineError::not_implemented(short_type_name::<Self>(), "concat"))
    }

    /// Folds labels during training. Defaults to [`Concat::concat`].
    fn concat_labels(&self, original: D, to_concat: D, weight: f64) -> Result<D, PipelineError> {
        self.concat(original, to_concat, weight)
    }
}

/// The combiner of a parallel system built without one.
#[derive(Debug, Clone, Copy)]
pub struct Unmerged {
    system: &'static str,
}

impl<D> Concat<D> for Unmerged {
    fn concat(&self, _original: D, _to_concat: D, _weight: f64) -> Result<D, PipelineError> {
        Err(PipelineError::not_implemented(self.system, "concat"))
    }
}

/// Adapts a plain closure into a [`Concat`].
pub struct FnConcat<F>(pub F);

impl<D, F> Concat<D> for FnConcat<F>
where
    F: Fn(D, D, f64) -> D,
{
    fn concat(&self, original: D, to_concat: D, weight: f64) -> Result<D, PipelineError> {
        Ok((self.0)(original, to_concat, weight))
    }
}

/// Feeds the same input to every step and folds the outputs with a [`Concat`].
///
/// Steps are sorted by type name when the system is built (stable, so ties
/// keep construction order). The identity hash therefore does not depend on
/// the order in which interchangeable branches were listed.
pub struct ParallelSystem<D, C> {
    core: NodeCore,
    /// Public so callers can deliberately restructure a live system. Every
    /// dispatch re-validates it.
    pub steps: Vec<Step<D>>,
    weights: Vec<f64>,
    combiner: Box<dyn Concat<D>>,
    capability: PhantomData<C>,
}

pub type ParallelTransformingSystem<D> = ParallelSystem<D, Transforming>;
pub type ParallelTrainingSystem<D> = ParallelSystem<D, Training>;

/// Builder for [`ParallelSystem`].
pub struct ParallelBuilder<D, C> {
    steps: Vec<Step<D>>,
    weights: Vec<f64>,
    combiner: Option<Box<dyn Concat<D>>>,
    label: Option<String>,
    capability: PhantomData<C>,
}

impl<D, C: ParallelCapability> ParallelBuilder<D, C> {
    pub fn step(mut self, step: impl Into<Step<D>>) -> Self {
        self.steps.push(step.into());
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = Step<D>>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// One weight per step, in the order the steps were added. Normalized to
    /// sum to 1. Equal weights are used when none are given.
    pub fn weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = weights;
        self
    }

    pub fn concat<F>(self, concat: F) -> Self
    where
        F: Fn(D, D, f64) -> D + 'static,
        D: 'static,
    {
        self.combiner(FnConcat(concat))
    }

    pub fn combiner(mut self, combiner: impl Concat<D> + 'static) -> Self {
        self.combiner = Some(Box::new(combiner));
        self
    }

    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn build(self) -> Result<ParallelSystem<D, C>, PipelineError> {
        validate_steps::<D, C>(C::PARALLEL, &self.steps)?;
        warn_duplicate_labels(C::PARALLEL, &self.steps);
        let weights = normalize_weights(C::PARALLEL, &self.weights, self.steps.len())?;

        let mut branches: Vec<(Step<D>, f64)> = self.steps.into_iter().zip(weights).collect();
        branches.sort_by(|(a, _), (b, _)| a.type_name().cmp(b.type_name()));
        let (mut steps, weights): (Vec<_>, Vec<_>) = branches.into_iter().unzip();

        let mut core = NodeCore::new();
        core.label = self.label;
        adopt(core.id, &mut steps);

        Ok(ParallelSystem {
            core,
            steps,
            weights,
            combiner: self.combiner.unwrap_or_else(|| {
                Box::new(Unmerged { system: C::PARALLEL }) as Box<dyn Concat<D>>
            }),
            capability: PhantomData,
        })
    }
}

impl<D, C: ParallelCapability> ParallelSystem<D, C> {
    pub fn builder() -> ParallelBuilder<D, C> {
        ParallelBuilder {
            steps: Vec::new(),
            weights: Vec::new(),
            combiner: None,
            label: None,
            capability: PhantomData,
        }
    }

    /// A system with equal weights and no combiner. Merging two branches fails.
    pub fn new(steps: Vec<Step<D>>) -> Result<Self, PipelineError> {
        Self::builder().steps(steps).build()
    }

    /// A system with equal weights that merges branches with `concat`.
    pub fn with_concat<F>(steps: Vec<Step<D>>, concat: F) -> Result<Self, PipelineError>
    where
        F: Fn(D, D, f64) -> D + 'static,
        D: 'static,
    {
        Self::builder().steps(steps).concat(concat).build()
    }

    pub fn with_combiner(
        steps: Vec<Step<D>>,
        combiner: impl Concat<D> + 'static,
    ) -> Result<Self, PipelineError> {
        Self::builder().steps(steps).combiner(combiner).build()
    }

    /// Normalized weights, aligned with `steps`.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn concat(&self, original: D, to_concat: D, weight: f64) -> Result<D, PipelineError> {
        self.combiner.concat(original, to_concat, weight)
    }

    pub fn concat_labels(&self, original: D, to_concat: D, weight: f64) -> Result<D, PipelineError> {
        self.combiner.concat_labels(original, to_concat, weight)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        validate_steps::<D, C>(C::PARALLEL, &self.steps)
    }

    /// The stored weights, or equal weights if `steps` was reassigned to a
    /// different length after construction.
    fn effective_weights(&self) -> Vec<f64> {
        if self.weights.len() == self.steps.len() {
            self.weights.clone()
        } else {
            log::warn!(
                "{} has {} weights for {} steps; falling back to equal weights.",
                C::PARALLEL,
                self.weights.len(),
                self.steps.len()
            );
            equal_weights(self.steps.len())
        }
    }
}

impl<D: Clone> ParallelTransformingSystem<D> {
    /// Every branch transforms the original input; the first output seeds
    /// the result and later outputs are folded in with `concat`.
    pub fn transform(&self, data: D, config: &Config) -> Result<D, PipelineError> {
        self.validate()?;
        let weights = self.effective_weights();
        let mut merged: Option<D> = None;
        for (step, weight) in self.steps.iter().zip(weights) {
            let section = config.section(step.label())?;
            let output = step.transform(Transforming::PARALLEL, data.clone(), &section)?;
            merged = Some(match merged {
                None => output,
                Some(acc) => self.combiner.concat(acc, output, weight)?,
            });
        }
        Ok(merged.unwrap_or(data))
    }
}

impl<D: Clone> ParallelTrainingSystem<D> {
    /// Every branch trains on the original `(x, y)`. Features are folded with
    /// `concat`, labels with `concat_labels`.
    pub fn train(&mut self, x: D, y: D, config: &Config) -> Result<(D, D), PipelineError> {
        self.validate()?;
        let weights = self.effective_weights();
        let mut merged: Option<(D, D)> = None;
        for (step, weight) in self.steps.iter_mut().zip(weights) {
            let section = config.section(step.label())?;
            let (new_x, new_y) =
                step.train(Training::PARALLEL, x.clone(), y.clone(), &section)?;
            merged = Some(match merged {
                None => (new_x, new_y),
                Some((acc_x, acc_y)) => (
                    self.combiner.concat(acc_x, new_x, weight)?,
                    self.combiner.concat_labels(acc_y, new_y, weight)?,
                ),
            });
        }
        Ok(merged.unwrap_or((x, y)))
    }

    pub fn predict(&self, x: D, config: &Config) -> Result<D, PipelineError> {
        self.validate()?;
        let weights = self.effective_weights();
        let mut merged: Option<D> = None;
        for (step, weight) in self.steps.iter().zip(weights) {
            let section = config.section(step.label())?;
            let output = step.predict(Training::PARALLEL, x.clone(), &section)?;
            merged = Some(match merged {
                None => output,
                Some(acc) => self.combiner.concat(acc, output, weight)?,
            });
        }
        Ok(merged.unwrap_or(x))
    }
}

impl<D, C: ParallelCapability> Node for ParallelSystem<D, C> {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn type_name(&self) -> &str {
        C::PARALLEL
    }

    /// No steps: `prev_hash`. One step: that step's hash. Otherwise every
    /// step is hashed against `prev_hash` independently and the results are
    /// digested together with it.
    fn compute_hash(&mut self, prev_hash: &str) -> Result<String, PipelineError> {
        let hash = match self.steps.as_mut_slice() {
            [] => prev_hash.to_string(),
            [step] => step.compute_hash(prev_hash)?,
            steps => {
                let mut total = prev_hash.to_string();
                for step in steps {
                    total.push_str(&step.compute_hash(prev_hash)?);
                }
                digest(&total)
            }
        };
        log::debug!("Hashed {} ({} steps) -> {}", C::PARALLEL, self.steps.len(), hash);
        self.core.hash = hash.clone();
        Ok(hash)
    }
}

impl<D, C: ParallelCapability> Tree<D> for ParallelSystem<D, C> {
    fn children(&self) -> Vec<&Step<D>> {
        self.steps.iter().collect()
    }
}

impl<D, C: ParallelCapability> fmt::Debug for ParallelSystem<D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_tree(self, f)
    }
}

fn equal_weights(count: usize) -> Vec<f64> {
    vec![1.0 / count as f64; count]
}

fn normalize_weights(system: &str, weights: &[f64], steps: usize) -> Result<Vec<f64>, PipelineError> {
    if weights.is_empty() {
        return Ok(equal_weights(steps));
    }
    if weights.len() != steps {
        return Err(PipelineError::WeightMismatch {
            system: system.to_string(),
            weights: weights.len(),
            steps,
        });
    }
    if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(PipelineError::InvalidWeights {
            system: system.to_string(),
            reason: format!("{} is not a finite, non-negative weight", bad),
        });
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(PipelineError::InvalidWeights {
            system: system.to_string(),
            reason: "weights sum to zero".to_string(),
        });
    }
    Ok(weights.iter().map(|w| w / total).collect())
}
