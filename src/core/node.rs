//! Structural identity shared by every node of a pipeline.
//!
//! Each node owns a [`NodeCore`] holding its id, a non-owning back-reference to
//! the composite that holds it, an optional label and the last computed
//! identity hash. Hashes are never computed implicitly: whoever changes the
//! structure calls [`Node::compute_hash`] again.

use crate::core::Step;
use crate::core::canonical::check_finite;
use crate::error::PipelineError;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Identifies a node for introspection. Never used for ownership or lookup
/// during hashing and execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        NodeId(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Internal data every node carries.
#[derive(Debug, Default)]
pub struct NodeCore {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) label: Option<String>,
    pub(crate) hash: String,
}

impl NodeCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-parents the node. The last composite to adopt a node wins.
    pub(crate) fn set_parent(&mut self, parent: NodeId) {
        self.parent = Some(parent);
    }
}

/// The identity interface implemented by blocks, systems, pipelines and [`Step`].
pub trait Node {
    fn core(&self) -> &NodeCore;

    fn core_mut(&mut self) -> &mut NodeCore;

    /// Short type name, also used to order the steps of parallel systems.
    fn type_name(&self) -> &str;

    /// Recomputes the identity hash of this node (and of every node below it)
    /// against `prev_hash`, stores it and returns it.
    fn compute_hash(&mut self, prev_hash: &str) -> Result<String, PipelineError>;

    fn id(&self) -> NodeId {
        self.core().id
    }

    fn parent(&self) -> Option<NodeId> {
        self.core().parent
    }

    /// The identifier under which this node reads its configuration section.
    /// Defaults to the type name.
    fn label(&self) -> &str {
        match &self.core().label {
            Some(label) => label,
            None => self.type_name(),
        }
    }

    /// The last computed identity hash, empty until [`Node::compute_hash`] runs.
    fn identity_hash(&self) -> &str {
        &self.core().hash
    }
}

/// Nodes whose children are steps over the payload type `D`.
pub trait Tree<D>: Node {
    fn children(&self) -> Vec<&Step<D>>;

    /// Renders the node and its children as nested HTML. Debugging aid only.
    fn to_html(&self) -> String {
        let parent = match self.parent() {
            Some(id) => id.to_string(),
            None => "None".to_string(),
        };

        let mut html = String::from("<div style='border: 1px solid black; padding: 10px;'>");
        html.push_str(&format!(
            "<p><strong>Class:</strong> {}</p>",
            escape(self.type_name())
        ));
        html.push_str("<ul>");
        html.push_str(&format!("<li><strong>Label:</strong> {}</li>", escape(self.label())));
        html.push_str(&format!("<li><strong>Hash:</strong> {}</li>", self.identity_hash()));
        html.push_str(&format!("<li><strong>Parent:</strong> {}</li>", parent));
        html.push_str("<li><strong>Children:</strong> ");
        let children = self.children();
        if children.is_empty() {
            html.push_str("None");
        } else {
            html.push_str("<ul>");
            for child in children {
                html.push_str(&format!("<li>{}</li>", child.to_html()));
            }
            html.push_str("</ul>");
        }
        html.push_str("</li></ul></div>");
        html
    }

    fn save_to_html(&self, path: impl AsRef<Path>) -> Result<(), PipelineError>
    where
        Self: Sized,
    {
        let path = path.as_ref();
        std::fs::write(path, self.to_html()).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// The digest used for every identity hash: lowercase hex SHA-256.
pub fn digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Renders serializable block state as a stable string.
///
/// Values go through `serde_json::Value`, whose maps keep keys sorted, so the
/// output does not depend on the iteration order of the source collection.
/// `NaN` and infinite floats are rejected rather than written as `null`.
pub fn canonical_json<T: Serialize + ?Sized>(state: &T) -> Result<String, PipelineError> {
    let fail = |source| PipelineError::Canonicalization {
        block: short_type_name::<T>().to_string(),
        source,
    };
    check_finite(state).map_err(fail)?;
    let value = serde_json::to_value(state).map_err(fail)?;
    serde_json::to_string(&value).map_err(fail)
}

/// `std::any::type_name` without module path or generic arguments.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

pub(crate) fn fmt_tree<D>(node: &(impl Tree<D> + ?Sized), f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct(node.type_name())
        .field("label", &node.label())
        .field("hash", &node.identity_hash())
        .field("children", &node.children())
        .finish()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&#39;")
}
