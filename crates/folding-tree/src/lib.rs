#![warn(missing_docs)]
//! Folding Tree - Incremental Bracket Matching for Headless Editors
//!
//! # Overview
//!
//! `folding-tree` keeps a nesting tree over a stream of **start** and **end** markers (brace
//! pairs, fold-region begin/end tokens, ...) and updates it one marker at a time. It does not know
//! what a marker is in any particular language and does not render anything: the upper layer
//! (tokenizer, syntax processor) tells it where markers appear and disappear, and asks which
//! markers pair up.
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  FoldingTree (edits, queries, dump)         │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Position index (Vec<NodeId>)               │  ← Stream order
//! ├─────────────────────────────────────────────┤
//! │  Recalibration (level walk + ripple)        │  ← Structural fix-up
//! ├─────────────────────────────────────────────┤
//! │  Node arena (FoldingNode slots)             │  ← Ownership
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use folding_tree::{FoldingTree, MarkerKind};
//!
//! let mut tree = FoldingTree::new();
//!
//! // ( ( ) ( ) )
//! for (after, kind) in [
//!     MarkerKind::Start,
//!     MarkerKind::Start,
//!     MarkerKind::End,
//!     MarkerKind::Start,
//!     MarkerKind::End,
//!     MarkerKind::End,
//! ]
//! .into_iter()
//! .enumerate()
//! {
//!     tree.insert_marker(kind, after).unwrap();
//! }
//!
//! assert_eq!(tree.matching_partner(1), Some(6));
//! assert_eq!(tree.matching_partner(2), Some(3));
//! assert_eq!(tree.matching_partner(5), Some(4));
//!
//! // Dropping the second start leaves `( ) ( ) )`.
//! assert!(tree.delete_marker(2));
//! assert_eq!(tree.matching_partner(1), Some(2));
//! assert_eq!(tree.unmatched_ends(), vec![5]);
//! ```
//!
//! # Module Description
//!
//! - [`node`] - marker kinds and tree nodes
//! - [`tree`] - the folding tree: edits, position index, queries
//! - [`verify`] - reference stack matcher and invariant checks
//! - [`config`] - tree options
//! - [`error`] - error type
//!
//! # Complexity
//!
//! - **Edits**: O(N) renumbering plus recalibration of the levels between the edit and the first
//!   unaffected ancestor
//! - **Partner lookup**: O(1)

mod arena;
pub mod config;
pub mod error;
pub mod node;
mod recalibrate;
pub mod tree;
pub mod verify;

pub use config::FoldingTreeOptions;
pub use error::FoldingError;
pub use node::{FoldingNode, MarkerKind, NodeId};
pub use tree::{FoldRange, FoldingEdit, FoldingTree};
pub use verify::{StackMatching, stack_matching, stack_partners};
