//! Error types for core object-model operations.

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while building or validating the object model.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A node id does not refer to a node in this graph.
    #[error("node id {0} is out of bounds for this graph")]
    NodeOutOfBounds(usize),

    /// A graph-structure invariant was violated.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// A tensor declared more dimensions than the format supports.
    #[error("tensor '{name}' has {count} dimensions, the maximum is {max}")]
    TooManyDims {
        /// Name of the offending tensor.
        name: String,
        /// Declared dimension count.
        count: usize,
        /// Supported maximum.
        max: usize,
    },

    /// An operator node carries parameters of the wrong shape for its kind.
    #[error("operator '{name}' of kind {kind:?} carries mismatched parameters")]
    ParamsMismatch {
        /// Name of the offending layer.
        name: String,
        /// The operator kind recorded on the node.
        kind: crate::types::OpKind,
    },
}
