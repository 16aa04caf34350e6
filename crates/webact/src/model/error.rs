//! Error types for the model layer.

/// Result type alias for list operations.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Result type alias for tree operations.
pub type TreeResult<T> = std::result::Result<T, TreeError>;

/// Errors raised by lists, list models and list filters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Position outside the valid range for the operation.
    #[error("Index {index} out of bounds for list of size {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A `WillRemove` listener changed the list, so the removal was dropped.
    #[error("List changed while removing index {index}")]
    RemovalInterrupted { index: usize },
}

impl ModelError {
    /// Create a bounds error.
    pub fn out_of_bounds(index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds { index, len }
    }
}

/// Errors raised by tree operations.
///
/// These signal misuse of the tree API and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// The node handle does not refer to a live node.
    #[error("Invalid node reference")]
    InvalidNode,

    /// Nodes must be named before they can be attached.
    #[error("Cannot add a child without a name")]
    UnnamedNode,

    /// Attaching would make a node its own ancestor.
    #[error("Circular parentage: a node cannot be its own ancestor")]
    CircularParentage,

    /// Insertion position past the end of the child list.
    #[error("Child index {index} out of bounds for {len} children")]
    IndexOutOfBounds { index: usize, len: usize },

    /// The operation needs a node that is attached to a tree.
    #[error("Node '{name}' is not attached to a tree")]
    NotAttached { name: String },
}
