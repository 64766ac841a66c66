//! Folding nodes
//!
//! A [`FoldingNode`] is one marker of the stream (or the virtual root) together with its place in
//! the nesting tree. Nodes never point at each other directly: every relation is a [`NodeId`] into
//! the node arena owned by the [`FoldingTree`](crate::FoldingTree).

use std::fmt;

/// Marker type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    /// The virtual document root at position 0.
    Root,
    /// An opening marker (e.g. `{`, a fold-region begin).
    Start,
    /// A closing marker (e.g. `}`, a fold-region end).
    End,
}

impl MarkerKind {
    /// Returns `true` for [`MarkerKind::Root`].
    pub fn is_root(self) -> bool {
        matches!(self, MarkerKind::Root)
    }

    /// Returns `true` for nodes that can own children (`Root` and `Start`).
    pub fn is_container(self) -> bool {
        match self {
            MarkerKind::Root | MarkerKind::Start => true,
            MarkerKind::End => false,
        }
    }
}

/// Stable handle of a node inside the tree's arena.
///
/// Handles are only meaningful for the tree that produced them and may be reused after the node
/// they named is deleted, so they must not be kept across edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node of the folding tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldingNode {
    pub(crate) position: usize,
    pub(crate) kind: MarkerKind,
    pub(crate) parent: Option<NodeId>,
    /// Starts nested directly in this node, sorted by position.
    pub(crate) start_children: Vec<NodeId>,
    /// Ends held at this node's level, sorted by position. A non-root start holds at most one, its
    /// partner; surplus ends move up to the parent.
    pub(crate) end_children: Vec<NodeId>,
    /// Ends missing for this node (and its unmatched descendants) to be closed.
    pub(crate) shortage: usize,
}

impl FoldingNode {
    pub(crate) fn new(position: usize, kind: MarkerKind, parent: Option<NodeId>) -> Self {
        Self {
            position,
            kind,
            parent,
            start_children: Vec::new(),
            end_children: Vec::new(),
            shortage: 0,
        }
    }

    /// Position of the node in the marker stream (the root is at 0).
    pub fn position(&self) -> usize {
        self.position
    }

    /// Marker type of the node.
    pub fn kind(&self) -> MarkerKind {
        self.kind
    }

    /// Structural parent (`None` for the root).
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Start markers nested directly in this node, in position order.
    pub fn start_children(&self) -> &[NodeId] {
        &self.start_children
    }

    /// End markers held at this node's level, in position order.
    ///
    /// A non-root start holds at most one end, its partner; the root holds every unmatched end.
    pub fn end_children(&self) -> &[NodeId] {
        &self.end_children
    }

    /// Number of end markers this node is missing.
    pub fn shortage(&self) -> usize {
        self.shortage
    }

    /// The end marker paired with this node, if any.
    ///
    /// The root never has a partner: the ends it holds are unmatched.
    pub fn matching_partner(&self) -> Option<NodeId> {
        match self.kind {
            MarkerKind::Start => self.end_children.first().copied(),
            MarkerKind::Root | MarkerKind::End => None,
        }
    }

    pub(crate) fn children_of_kind(&self, kind: MarkerKind) -> &Vec<NodeId> {
        match kind {
            MarkerKind::Start => &self.start_children,
            MarkerKind::End | MarkerKind::Root => &self.end_children,
        }
    }

    pub(crate) fn children_of_kind_mut(&mut self, kind: MarkerKind) -> &mut Vec<NodeId> {
        match kind {
            MarkerKind::Start => &mut self.start_children,
            MarkerKind::End | MarkerKind::Root => &mut self.end_children,
        }
    }

    pub(crate) fn status(&self) -> NodeStatus {
        NodeStatus {
            partner: self.matching_partner(),
            shortage: self.shortage,
        }
    }
}

/// What a parent can observe of a child: its partner and its shortage.
///
/// As long as both stay the same after a recalibration (and nothing was handed up), the parent's
/// level is unaffected and the ripple stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeStatus {
    pub(crate) partner: Option<NodeId>,
    pub(crate) shortage: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_partner_is_first_end_child() {
        let mut node = FoldingNode::new(1, MarkerKind::Start, Some(NodeId(0)));
        assert_eq!(node.matching_partner(), None);

        node.end_children = vec![NodeId(4), NodeId(7)];
        assert_eq!(node.matching_partner(), Some(NodeId(4)));
    }

    #[test]
    fn test_root_and_end_have_no_partner() {
        let mut root = FoldingNode::new(0, MarkerKind::Root, None);
        root.end_children = vec![NodeId(2)];
        assert_eq!(root.matching_partner(), None);

        let end = FoldingNode::new(3, MarkerKind::End, Some(NodeId(0)));
        assert_eq!(end.matching_partner(), None);
    }

    #[test]
    fn test_kind_predicates() {
        assert!(MarkerKind::Root.is_root());
        assert!(MarkerKind::Root.is_container());
        assert!(MarkerKind::Start.is_container());
        assert!(!MarkerKind::End.is_container());
        assert!(!MarkerKind::Start.is_root());
    }
}
