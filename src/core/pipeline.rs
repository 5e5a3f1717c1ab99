//! The fixed five-stage train/predict workflow.

use crate::core::config::Config;
use crate::core::node::{Node, NodeCore, Tree, digest, fmt_tree};
use crate::core::validation::{Training, Transforming, validate_step};
use crate::core::Step;
use crate::error::PipelineError;
use std::fmt;

/// Configuration key of the x-transform stage.
pub const X_SYS: &str = "x_sys";
/// Configuration key of the y-transform stage.
pub const Y_SYS: &str = "y_sys";
/// Configuration key of the training stage.
pub const TRAIN_SYS: &str = "train_sys";
/// Configuration key of the prediction post-processing stage.
pub const PRED_SYS: &str = "pred_sys";
/// Configuration key of the label post-processing stage.
pub const LABEL_SYS: &str = "label_sys";

const PIPELINE: &str = "Pipeline";

/// Five optional stages run in a fixed order.
///
/// ```text
/// train:   x_system(x), y_system(y) -> train_system.train(x, y) -> pred_system(x), label_system(y)
/// predict: x_system(x)              -> train_system.predict(x)  -> pred_system(x)
/// ```
///
/// An absent stage passes its values through untouched. Each stage reads the
/// configuration section keyed by its slot name ([`X_SYS`], [`TRAIN_SYS`], ...).
pub struct Pipeline<D> {
    core: NodeCore,
    pub x_system: Option<Step<D>>,
    pub y_system: Option<Step<D>>,
    pub train_system: Option<Step<D>>,
    pub pred_system: Option<Step<D>>,
    pub label_system: Option<Step<D>>,
}

/// Builder for [`Pipeline`]. Every slot is optional.
pub struct PipelineBuilder<D> {
    x_system: Option<Step<D>>,
    y_system: Option<Step<D>>,
    train_system: Option<Step<D>>,
    pred_system: Option<Step<D>>,
    label_system: Option<Step<D>>,
    label: Option<String>,
}

impl<D> PipelineBuilder<D> {
    pub fn x_system(mut self, step: impl Into<Step<D>>) -> Self {
        self.x_system = Some(step.into());
        self
    }

    pub fn y_system(mut self, step: impl Into<Step<D>>) -> Self {
        self.y_system = Some(step.into());
        self
    }

    pub fn train_system(mut self, step: impl Into<Step<D>>) -> Self {
        self.train_system = Some(step.into());
        self
    }

    pub fn pred_system(mut self, step: impl Into<Step<D>>) -> Self {
        self.pred_system = Some(step.into());
        self
    }

    pub fn label_system(mut self, step: impl Into<Step<D>>) -> Self {
        self.label_system = Some(step.into());
        self
    }

    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn build(self) -> Result<Pipeline<D>, PipelineError> {
        let mut pipeline = Pipeline {
            core: NodeCore::new(),
            x_system: self.x_system,
            y_system: self.y_system,
            train_system: self.train_system,
            pred_system: self.pred_system,
            label_system: self.label_system,
        };
        pipeline.core.label = self.label;
        pipeline.validate()?;

        let id = pipeline.core.id;
        for step in pipeline.slots_mut().into_iter().flatten() {
            step.core_mut().set_parent(id);
        }
        Ok(pipeline)
    }
}

impl<D> Pipeline<D> {
    /// A pipeline with every stage absent.
    pub fn new() -> Self {
        Pipeline {
            core: NodeCore::new(),
            x_system: None,
            y_system: None,
            train_system: None,
            pred_system: None,
            label_system: None,
        }
    }

    pub fn builder() -> PipelineBuilder<D> {
        PipelineBuilder {
            x_system: None,
            y_system: None,
            train_system: None,
            pred_system: None,
            label_system: None,
            label: None,
        }
    }

    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.core.label = Some(label.into());
        self
    }

    /// Checks every present slot: transforming steps for the x, y, pred and
    /// label stages, a training step for the train stage.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for step in [&self.x_system, &self.y_system, &self.pred_system, &self.label_system]
            .into_iter()
            .flatten()
        {
            validate_step::<D, Transforming>(PIPELINE, step)?;
        }
        if let Some(step) = &self.train_system {
            validate_step::<D, Training>(PIPELINE, step)?;
        }
        Ok(())
    }

    fn slots(&self) -> [Option<&Step<D>>; 5] {
        [
            self.x_system.as_ref(),
            self.y_system.as_ref(),
            self.train_system.as_ref(),
            self.pred_system.as_ref(),
            self.label_system.as_ref(),
        ]
    }

    fn slots_mut(&mut self) -> [Option<&mut Step<D>>; 5] {
        [
            self.x_system.as_mut(),
            self.y_system.as_mut(),
            self.train_system.as_mut(),
            self.pred_system.as_mut(),
            self.label_system.as_mut(),
        ]
    }
}

impl<D> Default for Pipeline<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Clone> Pipeline<D> {
    pub fn train(&mut self, x: D, y: D, config: &Config) -> Result<(D, D), PipelineError> {
        self.validate()?;
        let x = run_transform(X_SYS, &self.x_system, x, config)?;
        let y = run_transform(Y_SYS, &self.y_system, y, config)?;

        let (x, y) = match &mut self.train_system {
            Some(step) => {
                log::debug!("Pipeline stage {} -> train", TRAIN_SYS);
                step.train(PIPELINE, x, y, &config.section(TRAIN_SYS)?)?
            }
            None => (x, y),
        };

        let x = run_transform(PRED_SYS, &self.pred_system, x, config)?;
        let y = run_transform(LABEL_SYS, &self.label_system, y, config)?;
        Ok((x, y))
    }

    /// Labels are unavailable at inference, so the y and label stages never run.
    pub fn predict(&self, x: D, config: &Config) -> Result<D, PipelineError> {
        self.validate()?;
        let x = run_transform(X_SYS, &self.x_system, x, config)?;
        let x = match &self.train_system {
            Some(step) => {
                log::debug!("Pipeline stage {} -> predict", TRAIN_SYS);
                step.predict(PIPELINE, x, &config.section(TRAIN_SYS)?)?
            }
            None => x,
        };
        run_transform(PRED_SYS, &self.pred_system, x, config)
    }
}

fn run_transform<D: Clone>(
    stage: &str,
    slot: &Option<Step<D>>,
    data: D,
    config: &Config,
) -> Result<D, PipelineError> {
    match slot {
        Some(step) => {
            log::debug!("Pipeline stage {} -> transform", stage);
            step.transform(PIPELINE, data, &config.section(stage)?)
        }
        None => Ok(data),
    }
}

/// Concatenated hashes of two side-by-side slots, each hashed against "".
fn pair_hash<D>(
    first: Option<&mut Step<D>>,
    second: Option<&mut Step<D>>,
) -> Result<String, PipelineError> {
    let mut joined = String::new();
    for step in [first, second].into_iter().flatten() {
        joined.push_str(&step.compute_hash("")?);
    }
    Ok(joined)
}

/// Folds a side-by-side stage hash into the running hash.
///
/// Used for both the x+y and the pred+label stage: an empty running hash is
/// replaced outright by the stage hash, never digested with it, so a pipeline
/// whose only stage is x+y hashes to the plain concatenation of its slots.
/// An empty stage hash leaves the running hash unchanged.
fn fold(running: &mut String, stage: String) {
    if stage.is_empty() {
        return;
    }
    *running = if running.is_empty() {
        stage
    } else {
        digest(&format!("{running}{stage}"))
    };
}

impl<D> Node for Pipeline<D> {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn type_name(&self) -> &str {
        PIPELINE
    }

    fn compute_hash(&mut self, prev_hash: &str) -> Result<String, PipelineError> {
        let mut running = prev_hash.to_string();

        fold(
            &mut running,
            pair_hash(self.x_system.as_mut(), self.y_system.as_mut())?,
        );

        if let Some(step) = &mut self.train_system {
            let train = step.compute_hash(&running)?;
            if !train.is_empty() {
                running = digest(&format!("{running}{train}"));
            }
        }

        fold(
            &mut running,
            pair_hash(self.pred_system.as_mut(), self.label_system.as_mut())?,
        );

        log::debug!("Hashed {} -> {}", PIPELINE, running);
        self.core.hash = running.clone();
        Ok(running)
    }
}

impl<D> Tree<D> for Pipeline<D> {
    fn children(&self) -> Vec<&Step<D>> {
        self.slots().into_iter().flatten().collect()
    }
}

impl<D> fmt::Debug for Pipeline<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_tree(self, f)
    }
}
