//! Leaf capabilities and the node that wraps a leaf inside a pipeline.

use crate::core::AsAny;
use crate::core::config::Config;
use crate::core::node::{Node, NodeCore, digest, short_type_name};
use crate::error::PipelineError;

/// State shared by every leaf block.
///
/// Both methods have defaults, so a stateless block only needs `impl Block for MyBlock {}`.
/// Blocks that carry state should return it from [`Block::state`], usually
/// through [`canonical_json`](crate::canonical_json), so that the identity hash
/// changes when the state does.
pub trait Block: AsAny {
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }

    /// Stable textual form of the block's state. Same state, same string.
    fn state(&self) -> Result<String, PipelineError> {
        Ok(String::new())
    }
}

/// Transforms a payload: `data -> data`.
pub trait Transformer<D>: Block {
    fn transform(&self, _data: D, _config: &Config) -> Result<D, PipelineError> {
        Err(PipelineError::not_implemented(self.name(), "transform"))
    }
}

/// Trains on `(x, y)` and predicts from `x` alone.
pub trait Trainer<D>: Block {
    fn train(&mut self, _x: D, _y: D, _config: &Config) -> Result<(D, D), PipelineError> {
        Err(PipelineError::not_implemented(self.name(), "train"))
    }

    fn predict(&self, _x: D, _config: &Config) -> Result<D, PipelineError> {
        Err(PipelineError::not_implemented(self.name(), "predict"))
    }
}

/// Post-processes predictions.
pub trait Refiner<D>: Block {
    fn predict(&self, _y: D) -> Result<D, PipelineError> {
        Err(PipelineError::not_implemented(self.name(), "predict"))
    }
}

/// A leaf of the pipeline tree: the user's logic plus its identity data.
pub struct BlockNode<B: ?Sized> {
    pub(crate) core: NodeCore,
    pub(crate) logic: Box<B>,
}

impl<B: ?Sized> BlockNode<B> {
    pub(crate) fn new(logic: Box<B>) -> Self {
        BlockNode {
            core: NodeCore::new(),
            logic,
        }
    }

    pub fn logic(&self) -> &B {
        &self.logic
    }

    pub fn logic_mut(&mut self) -> &mut B {
        &mut self.logic
    }
}

impl<B: ?Sized + Block> Node for BlockNode<B> {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn type_name(&self) -> &str {
        self.logic.name()
    }

    fn compute_hash(&mut self, prev_hash: &str) -> Result<String, PipelineError> {
        let state = self.logic.state().map_err(|err| match err {
            PipelineError::Canonicalization { source, .. } => PipelineError::Canonicalization {
                block: self.logic.name().to_string(),
                source,
            },
            other => other,
        })?;
        let canonical = format!("{}({})", self.logic.name(), state);
        self.core.hash = digest(&format!("{prev_hash}{canonical}"));
        log::trace!("Hashed block {} -> {}", self.logic.name(), self.core.hash);
        Ok(self.core.hash.clone())
    }
}
