//! Error types for the traversal kernel.
//!
//! Queries never fail; these errors are raised only when a hierarchy or a
//! set of traversal settings is handed to the kernel.

use thiserror::Error;

/// Errors that can occur while accepting a hierarchy or settings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    /// A packed child reference carries a tag the kernel does not know.
    #[error("malformed child reference {raw:#010x} in node {node}")]
    MalformedChildRef {
        /// Node holding the reference.
        node: usize,
        /// Encoded reference.
        raw: u32,
    },

    /// A child reference points past the node or triangle array.
    #[error("child reference in node {node} slot {slot} is out of range")]
    ChildOutOfRange {
        /// Node holding the reference.
        node: usize,
        /// Child slot.
        slot: usize,
    },

    /// A leaf is empty or holds more primitives than a leaf test handles.
    #[error("leaf with {count} primitives, expected 1..={max}")]
    LeafSize {
        /// Primitive count of the leaf.
        count: usize,
        /// Largest supported count.
        max: usize,
    },

    /// Slot 0 or 1 is empty, or slot 2 is empty while slot 3 is populated.
    #[error("node {node} has an empty child slot {slot}")]
    MissingChild {
        /// Offending node.
        node: usize,
        /// Empty slot.
        slot: usize,
    },

    /// A node is reachable along more than one path, either because it is
    /// shared between parents or because it lies on a cycle.
    #[error("node {0} is reachable along more than one path")]
    SharedNode(usize),

    /// The hierarchy is deeper than the traversal stacks allow.
    #[error("hierarchy depth {depth} exceeds the maximum of {max}")]
    TooDeep {
        /// Measured depth.
        depth: usize,
        /// Largest supported depth.
        max: usize,
    },

    /// Invalid traversal settings.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Raw hierarchy bytes do not match the packed layout.
    #[error("raw hierarchy layout: {0}")]
    Layout(String),
}

/// Result type for kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;
