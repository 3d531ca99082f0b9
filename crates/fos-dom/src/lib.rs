//! fOS DOM - Document Object Model
//!
//! Arena-based DOM tree with mutation observation and event dispatch.
//! Nodes are addressed by [`NodeId`]; detached nodes stay in the arena until
//! they are destroyed, so a removed subtree can be re-inserted later.

mod node;
mod tree;
mod document;
mod observer;
mod events;
mod dataset;
mod fragment;

pub use node::{Node, NodeData, ElementData, Attribute};
pub use tree::{DomTree, Descendants};
pub use document::Document;
pub use observer::{MutationObserverInit, MutationRecord, MutationType, ObserverId};
pub use events::{Event, EventHandler, EventPhase, KeyModifiers, ListenerId, ListenerOptions};
pub use dataset::{to_camel_case, to_kebab_case};
pub use fragment::FragmentError;

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Root (document) node ID
    pub const ROOT: NodeId = NodeId(0);
    /// Sentinel for "no node"
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check that this is not the `NONE` sentinel
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }

    /// Raw arena index
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// Node does not exist (never created or destroyed)
    #[error("Node not found")]
    NotFound,
    /// Hierarchy error (e.g., inserting an ancestor into its descendant)
    #[error("Hierarchy request error")]
    HierarchyRequest,
    /// Operation needs an element node
    #[error("Invalid node type")]
    InvalidNodeType,
    /// Reference node is not a child of the given parent
    #[error("Node is not a child")]
    NotAChild,
}
