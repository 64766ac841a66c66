//! Error types for folding tree edits and queries.

use thiserror::Error;

/// Errors reported by [`FoldingTree`](crate::FoldingTree).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FoldingError {
    /// An edit or query referenced a position outside the live marker range.
    #[error("position {position} is out of range (live positions: 0..{len})")]
    PositionOutOfRange {
        /// The rejected position.
        position: usize,
        /// Number of live positions, the root included.
        len: usize,
    },
    /// Only `Start` and `End` markers can be inserted; the root is implicit.
    #[error("the root marker cannot be inserted")]
    RootMarker,
    /// A structural invariant does not hold (reported by [`FoldingTree::verify`](crate::FoldingTree::verify)).
    #[error("folding tree invariant violated: {0}")]
    InvariantViolation(String),
}
