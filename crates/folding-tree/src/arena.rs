//! Node storage
//!
//! Nodes live in a slot vector addressed by [`NodeId`]. Deleted slots are recycled, so the arena
//! never shrinks while the tree is in use, but ids stay small and dense.

use std::ops::{Index, IndexMut};

use crate::node::{FoldingNode, MarkerKind, NodeId, NodeStatus};

/// Slot storage owning every node of a tree.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeArena {
    slots: Vec<Option<FoldingNode>>,
    free: Vec<u32>,
}

impl NodeArena {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
        }
    }

    /// Store a node, reusing a freed slot when one is available.
    pub(crate) fn alloc(&mut self, node: FoldingNode) -> NodeId {
        if let Some(slot) = self.free.pop() {
            self.slots[slot as usize] = Some(node);
            return NodeId(slot);
        }

        let slot = u32::try_from(self.slots.len()).unwrap_or_else(|_| {
            panic!("folding tree cannot hold more than {} nodes", u32::MAX)
        });
        self.slots.push(Some(node));
        NodeId(slot)
    }

    /// Remove a node and return it. The slot becomes available to [`NodeArena::alloc`].
    pub(crate) fn release(&mut self, id: NodeId) -> Option<FoldingNode> {
        let node = self.slots.get_mut(id.index())?.take()?;
        self.free.push(id.0);
        Some(node)
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&FoldingNode> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Number of live nodes.
    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub(crate) fn status(&self, id: NodeId) -> NodeStatus {
        self[id].status()
    }

    /// Insert `child` into the matching ordered collection of `parent`.
    ///
    /// The collection is chosen by the child's kind and kept sorted by position. The child's
    /// parent link is updated as well.
    pub(crate) fn add_child(&mut self, parent: NodeId, child: NodeId) {
        let kind = self[child].kind;
        let position = self[child].position;
        let at = self[parent]
            .children_of_kind(kind)
            .partition_point(|&c| self[c].position < position);

        self[parent].children_of_kind_mut(kind).insert(at, child);
        self[child].parent = Some(parent);
    }

    /// Remove `child` from the ordered collection of `parent` it belongs to.
    ///
    /// Returns `false` when `child` was not a child of `parent`.
    pub(crate) fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let kind = self[child].kind;
        let position = self[child].position;
        let children = self[parent].children_of_kind(kind);
        let at = children.partition_point(|&c| self[c].position < position);

        if children.get(at) != Some(&child) {
            return false;
        }

        self[parent].children_of_kind_mut(kind).remove(at);
        true
    }

    /// Stable merge of two position-ordered sequences.
    pub(crate) fn merge_children(&self, a: &[NodeId], b: &[NodeId]) -> Vec<NodeId> {
        let mut merged = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);

        while i < a.len() && j < b.len() {
            if self[a[i]].position < self[b[j]].position {
                merged.push(a[i]);
                i += 1;
            } else {
                merged.push(b[j]);
                j += 1;
            }
        }

        merged.extend_from_slice(&a[i..]);
        merged.extend_from_slice(&b[j..]);
        merged
    }

    /// Split a position-ordered sequence into the entries at or before `bound` and those after it.
    pub(crate) fn split_after(&self, mut list: Vec<NodeId>, bound: usize) -> (Vec<NodeId>, Vec<NodeId>) {
        let at = list.partition_point(|&c| self[c].position <= bound);
        let tail = list.split_off(at);
        (list, tail)
    }

    /// Point the parent link of every direct child of `id` back at `id`.
    pub(crate) fn set_parent(&mut self, id: NodeId) {
        let node = &self[id];
        let children: Vec<NodeId> = node
            .start_children
            .iter()
            .chain(&node.end_children)
            .copied()
            .collect();

        for child in children {
            self[child].parent = Some(id);
        }
    }

    /// Number of start ancestors of `id`, the root excluded.
    pub(crate) fn start_depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self[id].parent;
        while let Some(parent) = current {
            if self[parent].kind == MarkerKind::Start {
                depth += 1;
            }
            current = self[parent].parent;
        }
        depth
    }
}

impl Index<NodeId> for NodeArena {
    type Output = FoldingNode;

    fn index(&self, id: NodeId) -> &Self::Output {
        match self.slots.get(id.index()) {
            Some(Some(node)) => node,
            _ => panic!("stale folding node id {id}"),
        }
    }
}

impl IndexMut<NodeId> for NodeArena {
    fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
        match self.slots.get_mut(id.index()) {
            Some(Some(node)) => node,
            _ => panic!("stale folding node id {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena_with_root() -> (NodeArena, NodeId) {
        let mut arena = NodeArena::default();
        let root = arena.alloc(FoldingNode::new(0, MarkerKind::Root, None));
        (arena, root)
    }

    #[test]
    fn test_released_slots_are_reused() {
        let (mut arena, root) = arena_with_root();
        let a = arena.alloc(FoldingNode::new(1, MarkerKind::Start, Some(root)));
        let b = arena.alloc(FoldingNode::new(2, MarkerKind::End, Some(root)));
        assert_eq!(arena.len(), 3);

        let released = arena.release(a).unwrap();
        assert_eq!(released.position, 1);
        assert_eq!(arena.len(), 2);
        assert!(arena.get(a).is_none());
        assert!(arena.release(a).is_none());

        let c = arena.alloc(FoldingNode::new(3, MarkerKind::Start, Some(root)));
        assert_eq!(c, a);
        assert_eq!(arena[b].position, 2);
        assert_eq!(arena.len(), 3);
    }

    #[test]
    fn test_add_child_keeps_position_order() {
        let (mut arena, root) = arena_with_root();
        let s5 = arena.alloc(FoldingNode::new(5, MarkerKind::Start, None));
        let s2 = arena.alloc(FoldingNode::new(2, MarkerKind::Start, None));
        let e3 = arena.alloc(FoldingNode::new(3, MarkerKind::End, None));
        let s4 = arena.alloc(FoldingNode::new(4, MarkerKind::Start, None));

        for id in [s5, s2, e3, s4] {
            arena.add_child(root, id);
        }

        assert_eq!(arena[root].start_children, vec![s2, s4, s5]);
        assert_eq!(arena[root].end_children, vec![e3]);
        assert_eq!(arena[s4].parent, Some(root));
    }

    #[test]
    fn test_remove_child() {
        let (mut arena, root) = arena_with_root();
        let s1 = arena.alloc(FoldingNode::new(1, MarkerKind::Start, None));
        let s2 = arena.alloc(FoldingNode::new(2, MarkerKind::Start, None));
        arena.add_child(root, s1);
        arena.add_child(root, s2);

        assert!(arena.remove_child(root, s1));
        assert!(!arena.remove_child(root, s1));
        assert_eq!(arena[root].start_children, vec![s2]);
    }

    #[test]
    fn test_merge_children_interleaves_by_position() {
        let (mut arena, _) = arena_with_root();
        let ids: Vec<NodeId> = (1..=6)
            .map(|p| arena.alloc(FoldingNode::new(p, MarkerKind::Start, None)))
            .collect();

        let a = vec![ids[0], ids[3], ids[4]];
        let b = vec![ids[1], ids[2], ids[5]];
        assert_eq!(arena.merge_children(&a, &b), ids);
        assert_eq!(arena.merge_children(&[], &b), b);
        assert_eq!(arena.merge_children(&a, &[]), a);
    }

    #[test]
    fn test_split_after_bound() {
        let (mut arena, _) = arena_with_root();
        let ids: Vec<NodeId> = (1..=4)
            .map(|p| arena.alloc(FoldingNode::new(p, MarkerKind::End, None)))
            .collect();

        let (head, tail) = arena.split_after(ids.clone(), 2);
        assert_eq!(head, ids[..2].to_vec());
        assert_eq!(tail, ids[2..].to_vec());

        let (head, tail) = arena.split_after(ids.clone(), 10);
        assert_eq!(head, ids);
        assert!(tail.is_empty());
    }
}
