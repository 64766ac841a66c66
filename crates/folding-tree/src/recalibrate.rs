//! Recalibration
//!
//! After an edit only one node's *level* is perturbed: its start children and the ends it holds.
//! [`NodeArena::recalibrate`] restores that level by walking it in position order, the same way a
//! bracket stack would scan it, treating every start child as an already consistent block:
//!
//! - the first end met becomes the node's partner; everything after it is handed to the parent
//! - a start child in shortage swallows the rest of the level (later siblings become its children,
//!   later ends its candidates) and hands back what lies after its new partner
//!
//! [`NodeArena::propagate_to_parent`] and [`NodeArena::rebalance`] then ripple the change toward
//! the root, stopping at the first ancestor that can no longer observe it.

use std::collections::VecDeque;
use std::mem;

use tracing::{debug, trace};

use crate::arena::NodeArena;
use crate::node::{MarkerKind, NodeId, NodeStatus};

/// Markers that no longer belong to a node's level after recalibration.
#[derive(Debug, Default)]
pub(crate) struct Excess {
    pub(crate) starts: Vec<NodeId>,
    pub(crate) ends: Vec<NodeId>,
}

impl Excess {
    fn push(&mut self, kind: MarkerKind, id: NodeId) {
        match kind {
            MarkerKind::Start => self.starts.push(id),
            MarkerKind::End => self.ends.push(id),
            MarkerKind::Root => debug_assert!(false, "the root is never handed over"),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.starts.is_empty() && self.ends.is_empty()
    }
}

impl NodeArena {
    /// Restore the level of `id` and return what has to move up to its parent.
    ///
    /// Every start child of `id` must be internally consistent; only their partner and shortage
    /// are looked at. The root keeps every end it is given (they are unmatched) and so never
    /// returns any excess.
    pub(crate) fn recalibrate(&mut self, id: NodeId) -> Excess {
        let is_root = self[id].kind.is_root();
        let starts = mem::take(&mut self[id].start_children);
        let ends = mem::take(&mut self[id].end_children);
        let mut pending: VecDeque<NodeId> = self.merge_children(&starts, &ends).into();

        let mut kept_starts = Vec::with_capacity(starts.len());
        let mut kept_ends = Vec::new();
        let mut excess = Excess::default();

        while let Some(item) = pending.pop_front() {
            let kind = self[item].kind;

            if !is_root && !kept_ends.is_empty() {
                // Past the partner: this is a sibling of `id`, not a descendant.
                excess.push(kind, item);
                continue;
            }

            match kind {
                MarkerKind::End => kept_ends.push(item),
                MarkerKind::Start => {
                    if self[item].end_children.is_empty() && !pending.is_empty() {
                        let reclaimed: Vec<NodeId> = pending.drain(..).collect();
                        trace!(child = %item, count = reclaimed.len(), "child in shortage reclaims level");
                        for other in reclaimed {
                            self.add_child(item, other);
                        }

                        let handed_back = self.recalibrate(item);
                        pending = self
                            .merge_children(&handed_back.starts, &handed_back.ends)
                            .into();
                    }
                    kept_starts.push(item);
                }
                MarkerKind::Root => debug_assert!(false, "the root is never a child"),
            }
        }

        let last_shortage = kept_starts.last().map_or(0, |&c| self[c].shortage);
        let shortage = if is_root {
            last_shortage
        } else if kept_ends.is_empty() {
            last_shortage + 1
        } else {
            0
        };

        let node = &mut self[id];
        node.start_children = kept_starts;
        node.end_children = kept_ends;
        node.shortage = shortage;
        self.set_parent(id);

        excess
    }

    /// Hand `excess` of `child` over to its parent's level.
    ///
    /// Returns the parent together with its status from before the hand-over, or `None` when
    /// `child` is the root.
    pub(crate) fn propagate_to_parent(
        &mut self,
        child: NodeId,
        excess: Excess,
    ) -> Option<(NodeId, NodeStatus)> {
        let parent = self[child].parent?;
        let before = self.status(parent);

        if !excess.is_empty() {
            let starts = self.merge_children(&self[parent].start_children, &excess.starts);
            let ends = self.merge_children(&self[parent].end_children, &excess.ends);
            let node = &mut self[parent];
            node.start_children = starts;
            node.end_children = ends;
            self.set_parent(parent);
        }

        Some((parent, before))
    }

    /// Recalibrate `id` and ripple toward the root while ancestors are affected.
    ///
    /// `before` is the status `id` had before the edit touched its level.
    pub(crate) fn rebalance(&mut self, mut id: NodeId, mut before: NodeStatus) {
        loop {
            let excess = self.recalibrate(id);
            let after = self.status(id);

            if excess.is_empty() && after == before {
                trace!(node = %id, "recalibration settled");
                return;
            }

            debug!(
                node = %id,
                starts = excess.starts.len(),
                ends = excess.ends.len(),
                shortage = after.shortage,
                "recalibration propagates to parent"
            );

            match self.propagate_to_parent(id, excess) {
                Some((parent, parent_before)) => {
                    id = parent;
                    before = parent_before;
                }
                None => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::FoldingNode;

    fn node(arena: &mut NodeArena, position: usize, kind: MarkerKind) -> NodeId {
        arena.alloc(FoldingNode::new(position, kind, None))
    }

    #[test]
    fn test_first_end_becomes_partner_and_rest_is_excess() {
        let mut arena = NodeArena::default();
        let root = node(&mut arena, 0, MarkerKind::Root);
        let s1 = node(&mut arena, 1, MarkerKind::Start);
        let e2 = node(&mut arena, 2, MarkerKind::End);
        let s3 = node(&mut arena, 3, MarkerKind::Start);
        let e4 = node(&mut arena, 4, MarkerKind::End);
        arena.add_child(root, s1);
        for id in [e2, s3, e4] {
            arena.add_child(s1, id);
        }
        // s3 has no partner of its own, but it comes after s1's partner.
        arena[s3].shortage = 1;

        let excess = arena.recalibrate(s1);

        assert_eq!(arena[s1].matching_partner(), Some(e2));
        assert!(arena[s1].start_children.is_empty());
        assert_eq!(arena[s1].shortage, 0);
        assert_eq!(excess.starts, vec![s3]);
        assert_eq!(excess.ends, vec![e4]);
    }

    #[test]
    fn test_child_in_shortage_reclaims_later_items() {
        let mut arena = NodeArena::default();
        let root = node(&mut arena, 0, MarkerKind::Root);
        let s1 = node(&mut arena, 1, MarkerKind::Start);
        let s2 = node(&mut arena, 2, MarkerKind::Start);
        let e3 = node(&mut arena, 3, MarkerKind::End);
        let e4 = node(&mut arena, 4, MarkerKind::End);
        let e5 = node(&mut arena, 5, MarkerKind::End);
        for id in [s1, s2, e3, e4, e5] {
            arena.add_child(root, id);
        }
        arena[s1].shortage = 1;
        arena[s2].shortage = 1;

        let excess = arena.recalibrate(root);
        assert!(excess.is_empty());

        // ( ( ) ) )
        assert_eq!(arena[root].start_children, vec![s1]);
        assert_eq!(arena[root].end_children, vec![e5]);
        assert_eq!(arena[s1].start_children, vec![s2]);
        assert_eq!(arena[s1].matching_partner(), Some(e4));
        assert_eq!(arena[s2].matching_partner(), Some(e3));
        assert_eq!(arena[s2].parent, Some(s1));
        assert_eq!(arena[e5].parent, Some(root));
        assert_eq!(arena[root].shortage, 0);
    }

    #[test]
    fn test_shortage_counts_unclosed_chain() {
        let mut arena = NodeArena::default();
        let root = node(&mut arena, 0, MarkerKind::Root);
        let s1 = node(&mut arena, 1, MarkerKind::Start);
        let s2 = node(&mut arena, 2, MarkerKind::Start);
        arena.add_child(root, s1);
        arena.add_child(s1, s2);

        arena.rebalance(s2, arena.status(s2));

        assert_eq!(arena[s2].shortage, 1);
        assert_eq!(arena[s1].shortage, 2);
        assert_eq!(arena[root].shortage, 2);
    }

    #[test]
    fn test_propagate_merges_into_parent_in_order() {
        let mut arena = NodeArena::default();
        let root = node(&mut arena, 0, MarkerKind::Root);
        let s1 = node(&mut arena, 1, MarkerKind::Start);
        let e2 = node(&mut arena, 2, MarkerKind::End);
        let e4 = node(&mut arena, 4, MarkerKind::End);
        let e3 = node(&mut arena, 3, MarkerKind::End);
        arena.add_child(root, s1);
        arena.add_child(root, e4);

        let excess = Excess {
            starts: Vec::new(),
            ends: vec![e2, e3],
        };
        let (parent, before) = arena.propagate_to_parent(s1, excess).unwrap();

        assert_eq!(parent, root);
        assert_eq!(before.partner, None);
        assert_eq!(arena[root].end_children, vec![e2, e3, e4]);
        assert_eq!(arena[e3].parent, Some(root));
        assert!(arena.propagate_to_parent(root, Excess::default()).is_none());
    }
}
