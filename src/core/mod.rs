pub mod block;
mod canonical;
pub mod config;
pub mod node;
pub mod parallel;
pub mod pipeline;
pub mod sequential;
pub mod validation;

use block::{BlockNode, Refiner, Trainer, Transformer};
use config::Config;
use node::{Node, NodeCore, Tree, fmt_tree};
use parallel::{ParallelTrainingSystem, ParallelTransformingSystem};
use pipeline::Pipeline;
use sequential::{RefiningSystem, TrainingSystem, TransformingSystem};
use std::any::Any;
use std::fmt;
use validation::{Capability, Refining, Training, Transforming, rejected};

use crate::error::PipelineError;

/// Helper for downcasting a boxed block back to its concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: 'static> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Anything that can sit in a system: a leaf block or a nested composite.
pub enum Step<D> {
    Transformer(BlockNode<dyn Transformer<D>>),
    Trainer(BlockNode<dyn Trainer<D>>),
    Refiner(BlockNode<dyn Refiner<D>>),
    TransformingSystem(TransformingSystem<D>),
    ParallelTransformingSystem(ParallelTransformingSystem<D>),
    TrainingSystem(TrainingSystem<D>),
    ParallelTrainingSystem(ParallelTrainingSystem<D>),
    RefiningSystem(RefiningSystem<D>),
    Pipeline(Box<Pipeline<D>>),
}

impl<D> Step<D> {
    pub fn transformer<T: Transformer<D> + 'static>(logic: T) -> Self {
        Step::Transformer(BlockNode::new(Box::new(logic)))
    }

    pub fn trainer<T: Trainer<D> + 'static>(logic: T) -> Self {
        Step::Trainer(BlockNode::new(Box::new(logic)))
    }

    pub fn refiner<T: Refiner<D> + 'static>(logic: T) -> Self {
        Step::Refiner(BlockNode::new(Box::new(logic)))
    }

    /// Sets the label under which this step reads its configuration section.
    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.core_mut().label = Some(label.into());
        self
    }

    /// Borrows the concrete logic of a leaf step.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Step::Transformer(block) => block.logic().as_any().downcast_ref(),
            Step::Trainer(block) => block.logic().as_any().downcast_ref(),
            Step::Refiner(block) => block.logic().as_any().downcast_ref(),
            _ => None,
        }
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        match self {
            Step::Transformer(block) => block.logic_mut().as_any_mut().downcast_mut(),
            Step::Trainer(block) => block.logic_mut().as_any_mut().downcast_mut(),
            Step::Refiner(block) => block.logic_mut().as_any_mut().downcast_mut(),
            _ => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Step::Transformer(_) | Step::Trainer(_) | Step::Refiner(_))
    }

    /// Label plus type name, used to name a step in errors.
    pub(crate) fn describe(&self) -> String {
        if self.label() == self.type_name() {
            self.type_name().to_string()
        } else {
            format!("{} ({})", self.label(), self.type_name())
        }
    }

    fn as_node(&self) -> &dyn Node {
        match self {
            Step::Transformer(block) => block,
            Step::Trainer(block) => block,
            Step::Refiner(block) => block,
            Step::TransformingSystem(system) => system,
            Step::ParallelTransformingSystem(system) => system,
            Step::TrainingSystem(system) => system,
            Step::ParallelTrainingSystem(system) => system,
            Step::RefiningSystem(system) => system,
            Step::Pipeline(pipeline) => &**pipeline,
        }
    }

    fn as_node_mut(&mut self) -> &mut dyn Node {
        match self {
            Step::Transformer(block) => block,
            Step::Trainer(block) => block,
            Step::Refiner(block) => block,
            Step::TransformingSystem(system) => system,
            Step::ParallelTransformingSystem(system) => system,
            Step::TrainingSystem(system) => system,
            Step::ParallelTrainingSystem(system) => system,
            Step::RefiningSystem(system) => system,
            Step::Pipeline(pipeline) => &mut **pipeline,
        }
    }

    pub(crate) fn refine(&self, system: &str, y: D) -> Result<D, PipelineError> {
        log::trace!("{} dispatching predict to {}", system, self.label());
        match self {
            Step::Refiner(block) => block.logic().predict(y),
            Step::RefiningSystem(inner) => inner.predict(y),
            other => Err(rejected(system, other, Refining::EXPECTED)),
        }
    }
}

impl<D: Clone> Step<D> {
    pub(crate) fn transform(&self, system: &str, data: D, config: &Config) -> Result<D, PipelineError> {
        log::trace!("{} dispatching transform to {}", system, self.label());
        match self {
            Step::Transformer(block) => block.logic().transform(data, config),
            Step::TransformingSystem(inner) => inner.transform(data, config),
            Step::ParallelTransformingSystem(inner) => inner.transform(data, config),
            other => Err(rejected(system, other, Transforming::EXPECTED)),
        }
    }

    pub(crate) fn train(
        &mut self,
        system: &str,
        x: D,
        y: D,
        config: &Config,
    ) -> Result<(D, D), PipelineError> {
        log::trace!("{} dispatching train to {}", system, self.label());
        match self {
            Step::Trainer(block) => block.logic_mut().train(x, y, config),
            Step::TrainingSystem(inner) => inner.train(x, y, config),
            Step::ParallelTrainingSystem(inner) => inner.train(x, y, config),
            Step::Pipeline(inner) => inner.train(x, y, config),
            other => Err(rejected(system, other, Training::EXPECTED)),
        }
    }

    pub(crate) fn predict(&self, system: &str, x: D, config: &Config) -> Result<D, PipelineError> {
        log::trace!("{} dispatching predict to {}", system, self.label());
        match self {
            Step::Trainer(block) => block.logic().predict(x, config),
            Step::TrainingSystem(inner) => inner.predict(x, config),
            Step::ParallelTrainingSystem(inner) => inner.predict(x, config),
            Step::Pipeline(inner) => inner.predict(x, config),
            other => Err(rejected(system, other, Training::EXPECTED)),
        }
    }
}

impl<D> Node for Step<D> {
    fn core(&self) -> &NodeCore {
        self.as_node().core()
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        self.as_node_mut().core_mut()
    }

    fn type_name(&self) -> &str {
        self.as_node().type_name()
    }

    fn compute_hash(&mut self, prev_hash: &str) -> Result<String, PipelineError> {
        self.as_node_mut().compute_hash(prev_hash)
    }
}

impl<D> Tree<D> for Step<D> {
    fn children(&self) -> Vec<&Step<D>> {
        match self {
            Step::Transformer(_) | Step::Trainer(_) | Step::Refiner(_) => Vec::new(),
            Step::TransformingSystem(system) => system.children(),
            Step::ParallelTransformingSystem(system) => system.children(),
            Step::TrainingSystem(system) => system.children(),
            Step::ParallelTrainingSystem(system) => system.children(),
            Step::RefiningSystem(system) => system.children(),
            Step::Pipeline(pipeline) => pipeline.children(),
        }
    }
}

impl<D> fmt::Debug for Step<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_tree(self, f)
    }
}

impl<D> From<TransformingSystem<D>> for Step<D> {
    fn from(system: TransformingSystem<D>) -> Self {
        Step::TransformingSystem(system)
    }
}

impl<D> From<ParallelTransformingSystem<D>> for Step<D> {
    fn from(system: ParallelTransformingSystem<D>) -> Self {
        Step::ParallelTransformingSystem(system)
    }
}

impl<D> From<TrainingSystem<D>> for Step<D> {
    fn from(system: TrainingSystem<D>) -> Self {
        Step::TrainingSystem(system)
    }
}

impl<D> From<ParallelTrainingSystem<D>> for Step<D> {
    fn from(system: ParallelTrainingSystem<D>) -> Self {
        Step::ParallelTrainingSystem(system)
    }
}

impl<D> From<RefiningSystem<D>> for Step<D> {
    fn from(system: RefiningSystem<D>) -> Self {
        Step::RefiningSystem(system)
    }
}

impl<D> From<Pipeline<D>> for Step<D> {
    fn from(pipeline: Pipeline<D>) -> Self {
        Step::Pipeline(Box::new(pipeline))
    }
}

/// Points every step at its new owner.
pub(crate) fn adopt<D>(parent: node::NodeId, steps: &mut [Step<D>]) {
    for step in steps {
        step.core_mut().set_parent(parent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::Block;

    #[derive(Debug, PartialEq)]
    struct Counter {
        calls: u32,
    }

    impl Block for Counter {}

    impl Trainer<i32> for Counter {
        fn train(&mut self, x: i32, y: i32, _config: &Config) -> Result<(i32, i32), PipelineError> {
            self.calls += 1;
            Ok((x, y))
        }
    }

    struct Negate;

    impl Block for Negate {}

    impl Refiner<i32> for Negate {
        fn predict(&self, y: i32) -> Result<i32, PipelineError> {
            Ok(-y)
        }
    }

    #[test]
    fn test_label_defaults_to_type_name() {
        let step = Step::<i32>::refiner(Negate);
        assert_eq!(step.label(), "Negate");
        assert_eq!(step.describe(), "Negate");

        let step = step.named("flip");
        assert_eq!(step.label(), "flip");
        assert_eq!(step.type_name(), "Negate");
        assert_eq!(step.describe(), "flip (Negate)");
    }

    #[test]
    fn test_downcast_reaches_trained_state() {
        let mut step = Step::<i32>::trainer(Counter { calls: 0 });
        step.train("test", 1, 2, &Config::new()).unwrap();
        step.train("test", 1, 2, &Config::new()).unwrap();

        assert_eq!(step.downcast_ref::<Counter>(), Some(&Counter { calls: 2 }));
        assert!(step.downcast_ref::<Negate>().is_none());

        step.downcast_mut::<Counter>().unwrap().calls = 0;
        assert_eq!(step.downcast_ref::<Counter>().unwrap().calls, 0);
    }

    #[test]
    fn test_dispatch_rejects_wrong_capability() {
        let step = Step::<i32>::refiner(Negate);
        match step.transform("TransformingSystem", 1, &Config::new()) {
            Err(PipelineError::InvalidStep { system, step, .. }) => {
                assert_eq!(system, "TransformingSystem");
                assert_eq!(step, "Negate");
            }
            other => panic!("Expected InvalidStep, got {:?}", other),
        }
        assert_eq!(step.refine("RefiningSystem", 4).unwrap(), -4);
    }

    #[test]
    fn test_leaf_has_no_children() {
        let step = Step::<i32>::refiner(Negate);
        assert!(step.is_leaf());
        assert!(step.children().is_empty());
        assert!(step.parent().is_none());
    }
}
