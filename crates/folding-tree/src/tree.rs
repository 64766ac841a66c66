//! Folding tree
//!
//! [`FoldingTree`] owns every node, keeps the position index and turns single-marker edits into
//! recalibration passes. All public inputs and outputs are **stream positions**: position 0 is the
//! implicit root, markers occupy `1..len()`.

use std::mem;

use tracing::trace;

use crate::arena::NodeArena;
use crate::config::FoldingTreeOptions;
use crate::error::FoldingError;
use crate::node::{FoldingNode, MarkerKind, NodeId};

/// A single edit of the marker stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldingEdit {
    /// Insert a start marker right after the marker at `after`.
    InsertStart {
        /// Position the new marker follows (0 inserts at the beginning).
        after: usize,
    },
    /// Insert an end marker right after the marker at `after`.
    InsertEnd {
        /// Position the new marker follows (0 inserts at the beginning).
        after: usize,
    },
    /// Delete the marker at `position` (no-op when out of range).
    Delete {
        /// Position of the marker to delete.
        position: usize,
    },
}

/// A matched start/end pair, as a collaborator would turn it into a fold region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FoldRange {
    /// Position of the start marker.
    pub start: usize,
    /// Position of the matching end marker.
    pub end: usize,
    /// Number of start markers enclosing the pair (0 for top-level pairs).
    pub depth: usize,
}

/// One open level of [`FoldingTree::dump`]: the node, its interleaved children and the next one to
/// print.
#[derive(Debug)]
struct DumpFrame {
    node: NodeId,
    depth: usize,
    end_depth: usize,
    level: Vec<NodeId>,
    cursor: usize,
}

/// Incrementally maintained nesting tree over a stream of start/end markers.
#[derive(Debug, Clone)]
pub struct FoldingTree {
    pub(crate) arena: NodeArena,
    pub(crate) root: NodeId,
    /// `index[p]` is the node at position `p`.
    pub(crate) index: Vec<NodeId>,
    options: FoldingTreeOptions,
}

impl Default for FoldingTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FoldingTree {
    /// Create an empty tree holding only the root.
    pub fn new() -> Self {
        Self::with_options(FoldingTreeOptions::default())
    }

    /// Create an empty tree with the given options.
    pub fn with_options(options: FoldingTreeOptions) -> Self {
        let mut arena = NodeArena::with_capacity(options.capacity + 1);
        let root = arena.alloc(FoldingNode::new(0, MarkerKind::Root, None));
        let mut index = Vec::with_capacity(options.capacity + 1);
        index.push(root);

        Self {
            arena,
            root,
            index,
            options,
        }
    }

    /// Build a tree from a complete marker sequence in a single pass.
    ///
    /// `markers[i]` becomes the marker at position `i + 1`.
    pub fn from_markers(markers: &[MarkerKind]) -> Result<Self, FoldingError> {
        Self::from_markers_with_options(markers, FoldingTreeOptions::default())
    }

    /// Same as [`FoldingTree::from_markers`], with explicit options.
    pub fn from_markers_with_options(
        markers: &[MarkerKind],
        options: FoldingTreeOptions,
    ) -> Result<Self, FoldingError> {
        let mut tree = Self::with_options(options.with_capacity(options.capacity.max(markers.len())));
        tree.options = options;
        let root = tree.root;
        // Starts still waiting for their end, innermost last.
        let mut open = vec![root];

        for (offset, &kind) in markers.iter().enumerate() {
            let position = offset + 1;
            match kind {
                MarkerKind::Root => return Err(FoldingError::RootMarker),
                MarkerKind::Start => {
                    let parent = open.last().copied().unwrap_or(root);
                    let id = tree
                        .arena
                        .alloc(FoldingNode::new(position, MarkerKind::Start, Some(parent)));
                    tree.arena[parent].start_children.push(id);
                    tree.index.push(id);
                    open.push(id);
                }
                MarkerKind::End => {
                    let holder = if open.len() > 1 {
                        open.pop().unwrap_or(root)
                    } else {
                        root
                    };
                    let id = tree
                        .arena
                        .alloc(FoldingNode::new(position, MarkerKind::End, Some(holder)));
                    tree.arena[holder].end_children.push(id);
                    tree.index.push(id);
                }
            }
        }

        let unclosed = open.len() - 1;
        for (depth, &id) in open.iter().enumerate().skip(1) {
            tree.arena[id].shortage = unclosed - depth + 1;
        }
        tree.arena[root].shortage = unclosed;

        trace!(markers = markers.len(), unclosed, "built folding tree");
        tree.check_after_edit("batch build");
        Ok(tree)
    }

    /// Options this tree was created with.
    pub fn options(&self) -> FoldingTreeOptions {
        self.options
    }

    /// Number of live positions, the root included.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if the tree holds no markers (only the root).
    pub fn is_empty(&self) -> bool {
        self.index.len() == 1
    }

    /// Number of markers (the root excluded).
    pub fn marker_count(&self) -> usize {
        self.index.len() - 1
    }

    /// Handle of the root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Look up a node by handle.
    pub fn node(&self, id: NodeId) -> Option<&FoldingNode> {
        self.arena.get(id)
    }

    /// Node at `position`, if any.
    pub fn find_node_at(&self, position: usize) -> Option<NodeId> {
        self.index.get(position).copied()
    }

    /// Marker type at `position`, if any.
    pub fn kind_at(&self, position: usize) -> Option<MarkerKind> {
        self.find_node_at(position).map(|id| self.arena[id].kind)
    }

    /// The marker sequence in stream order (positions `1..len()`).
    pub fn markers(&self) -> Vec<MarkerKind> {
        self.index[1..].iter().map(|&id| self.arena[id].kind).collect()
    }

    /// Number of start markers that are still waiting for an end.
    pub fn unclosed_count(&self) -> usize {
        self.arena[self.root].shortage
    }

    /// The node a marker inserted after `after` is first attached to: the nearest start at or
    /// before `after`, or the root.
    pub fn find_parent(&self, after: usize) -> Option<NodeId> {
        (after < self.index.len()).then(|| self.find_parent_unchecked(after))
    }

    fn find_parent_unchecked(&self, after: usize) -> NodeId {
        self.index[..=after]
            .iter()
            .rev()
            .copied()
            .find(|&id| self.arena[id].kind.is_container())
            .unwrap_or(self.root)
    }

    fn check_insert(&self, after: usize) -> Result<(), FoldingError> {
        if after >= self.index.len() {
            return Err(FoldingError::PositionOutOfRange {
                position: after,
                len: self.index.len(),
            });
        }
        Ok(())
    }

    /// Insert a start marker so that it lands at position `after + 1`.
    ///
    /// Returns the new marker's position.
    pub fn insert_start_node(&mut self, after: usize) -> Result<usize, FoldingError> {
        self.check_insert(after)?;
        let parent = self.find_parent_unchecked(after);
        let parent_before = self.arena.status(parent);
        let position = after + 1;

        let id = self
            .arena
            .alloc(FoldingNode::new(position, MarkerKind::Start, Some(parent)));
        self.increase_position(position);
        self.index.insert(position, id);
        self.arena.add_child(parent, id);

        // Everything after the new start on the parent's level now nests inside it.
        let starts = mem::take(&mut self.arena[parent].start_children);
        let ends = mem::take(&mut self.arena[parent].end_children);
        let (kept_starts, moved_starts) = self.arena.split_after(starts, position);
        let (kept_ends, moved_ends) = self.arena.split_after(ends, position);

        let parent_node = &mut self.arena[parent];
        parent_node.start_children = kept_starts;
        parent_node.end_children = kept_ends;

        let node = &mut self.arena[id];
        node.start_children = moved_starts;
        node.end_children = moved_ends;
        self.arena.set_parent(id);

        let excess = self.arena.recalibrate(id);
        self.arena.propagate_to_parent(id, excess);
        self.arena.rebalance(parent, parent_before);

        trace!(after, position, "inserted start marker");
        self.check_after_edit("start insertion");
        Ok(position)
    }

    /// Insert an end marker so that it lands at position `after + 1`.
    ///
    /// Returns the new marker's position.
    pub fn insert_end_node(&mut self, after: usize) -> Result<usize, FoldingError> {
        self.check_insert(after)?;
        let parent = self.find_parent_unchecked(after);
        let parent_before = self.arena.status(parent);
        let position = after + 1;

        let id = self
            .arena
            .alloc(FoldingNode::new(position, MarkerKind::End, Some(parent)));
        self.increase_position(position);
        self.index.insert(position, id);
        self.arena.add_child(parent, id);

        self.arena.rebalance(parent, parent_before);

        trace!(after, position, "inserted end marker");
        self.check_after_edit("end insertion");
        Ok(position)
    }

    /// Insert a marker of the given kind right after the marker at `after`.
    pub fn insert_marker(&mut self, kind: MarkerKind, after: usize) -> Result<usize, FoldingError> {
        match kind {
            MarkerKind::Start => self.insert_start_node(after),
            MarkerKind::End => self.insert_end_node(after),
            MarkerKind::Root => Err(FoldingError::RootMarker),
        }
    }

    /// Delete the marker at `position`.
    ///
    /// Returns `false` (and does nothing) for the root or a position outside the live range.
    pub fn delete_node(&mut self, position: usize) -> bool {
        if position == 0 || position >= self.index.len() {
            trace!(position, len = self.index.len(), "ignored out-of-range delete");
            return false;
        }

        let id = self.index[position];
        match self.arena[id].kind {
            MarkerKind::Start => self.delete_start_node(id),
            MarkerKind::End => self.delete_end_node(id),
            MarkerKind::Root => return false,
        }

        trace!(position, "deleted marker");
        self.check_after_edit("deletion");
        true
    }

    /// Alias of [`FoldingTree::delete_node`].
    pub fn delete_marker(&mut self, position: usize) -> bool {
        self.delete_node(position)
    }

    fn parent_of(&self, id: NodeId) -> NodeId {
        self.arena[id].parent.unwrap_or(self.root)
    }

    fn delete_start_node(&mut self, id: NodeId) {
        let parent = self.parent_of(id);
        let parent_before = self.arena.status(parent);
        let position = self.arena[id].position;

        // Children rise one level; the deleted node's partner becomes a loose end of the parent.
        let orphan_starts = mem::take(&mut self.arena[id].start_children);
        let orphan_ends = mem::take(&mut self.arena[id].end_children);
        let detached = self.arena.remove_child(parent, id);
        debug_assert!(detached, "start {id} missing from its parent {parent}");

        let starts = self
            .arena
            .merge_children(&self.arena[parent].start_children, &orphan_starts);
        let ends = self
            .arena
            .merge_children(&self.arena[parent].end_children, &orphan_ends);
        let parent_node = &mut self.arena[parent];
        parent_node.start_children = starts;
        parent_node.end_children = ends;
        self.arena.set_parent(parent);

        self.arena.release(id);
        self.index.remove(position);
        self.decrease_position(position);

        self.arena.rebalance(parent, parent_before);
    }

    fn delete_end_node(&mut self, id: NodeId) {
        let holder = self.parent_of(id);
        let holder_before = self.arena.status(holder);
        let position = self.arena[id].position;

        let detached = self.arena.remove_child(holder, id);
        debug_assert!(detached, "end {id} missing from its holder {holder}");
        self.arena.release(id);
        self.index.remove(position);
        self.decrease_position(position);

        self.arena.rebalance(holder, holder_before);
    }

    /// Shift every node from `from` onward one position to the right.
    fn increase_position(&mut self, from: usize) {
        for &id in &self.index[from..] {
            self.arena[id].position += 1;
        }
    }

    /// Shift every node from `from` onward one position to the left.
    fn decrease_position(&mut self, from: usize) {
        for &id in &self.index[from..] {
            self.arena[id].position -= 1;
        }
    }

    /// Apply a single edit.
    ///
    /// Out-of-range deletes are ignored; out-of-range inserts are reported.
    pub fn apply(&mut self, edit: FoldingEdit) -> Result<(), FoldingError> {
        match edit {
            FoldingEdit::InsertStart { after } => self.insert_start_node(after).map(|_| ()),
            FoldingEdit::InsertEnd { after } => self.insert_end_node(after).map(|_| ()),
            FoldingEdit::Delete { position } => {
                self.delete_node(position);
                Ok(())
            }
        }
    }

    /// Apply edits in order, stopping at the first failing one.
    ///
    /// Returns the number of edits applied.
    pub fn apply_all<I>(&mut self, edits: I) -> Result<usize, FoldingError>
    where
        I: IntoIterator<Item = FoldingEdit>,
    {
        let mut applied = 0;
        for edit in edits {
            self.apply(edit)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Position of the marker paired with the marker at `position`.
    ///
    /// Works for both start and end markers; `None` for unmatched markers, the root and
    /// out-of-range positions.
    pub fn matching_partner(&self, position: usize) -> Option<usize> {
        let id = self.find_node_at(position)?;
        let node = &self.arena[id];
        match node.kind {
            MarkerKind::Root => None,
            MarkerKind::Start => node.matching_partner().map(|end| self.arena[end].position),
            MarkerKind::End => {
                let holder = &self.arena[node.parent?];
                (holder.matching_partner() == Some(id)).then_some(holder.position)
            }
        }
    }

    /// All matched `(start, end)` pairs, ordered by start position.
    pub fn matching_pairs(&self) -> Vec<(usize, usize)> {
        self.index
            .iter()
            .filter_map(|&id| {
                let node = &self.arena[id];
                node.matching_partner()
                    .map(|end| (node.position, self.arena[end].position))
            })
            .collect()
    }

    /// Positions of start markers without a partner.
    pub fn unmatched_starts(&self) -> Vec<usize> {
        self.index
            .iter()
            .map(|&id| &self.arena[id])
            .filter(|node| node.kind == MarkerKind::Start && node.end_children.is_empty())
            .map(|node| node.position)
            .collect()
    }

    /// Positions of end markers without a partner.
    pub fn unmatched_ends(&self) -> Vec<usize> {
        self.arena[self.root]
            .end_children
            .iter()
            .map(|&id| self.arena[id].position)
            .collect()
    }

    /// Position of the start marker that encloses the marker at `position`.
    ///
    /// For a matched end this is the start enclosing the pair. Only exact marker positions are
    /// answered; `None` means the marker sits at the top level (or is unmatched, for an end).
    pub fn enclosing_start(&self, position: usize) -> Option<usize> {
        let id = self.find_node_at(position)?;
        let node = &self.arena[id];
        let container = match node.kind {
            MarkerKind::Root => return None,
            MarkerKind::Start => node.parent?,
            MarkerKind::End => {
                let holder = node.parent?;
                if self.arena[holder].kind != MarkerKind::Start {
                    return None;
                }
                self.arena[holder].parent?
            }
        };

        let container = &self.arena[container];
        (container.kind == MarkerKind::Start).then_some(container.position)
    }

    /// Nesting depth of the marker at `position` (0 for top-level markers).
    pub fn depth_at(&self, position: usize) -> Option<usize> {
        let id = self.find_node_at(position)?;
        let node = &self.arena[id];
        match node.kind {
            MarkerKind::Root => None,
            MarkerKind::Start => Some(self.arena.start_depth(id)),
            MarkerKind::End => {
                let holder = node.parent?;
                match self.arena[holder].kind {
                    MarkerKind::Start => Some(self.arena.start_depth(holder)),
                    MarkerKind::Root | MarkerKind::End => Some(0),
                }
            }
        }
    }

    /// Every matched pair with its nesting depth, ordered by start position.
    pub fn fold_ranges(&self) -> Vec<FoldRange> {
        let mut ranges = Vec::new();
        let mut stack: Vec<(NodeId, usize)> = self.arena[self.root]
            .start_children
            .iter()
            .rev()
            .map(|&id| (id, 0))
            .collect();

        while let Some((id, depth)) = stack.pop() {
            let node = &self.arena[id];
            if let Some(end) = node.matching_partner() {
                ranges.push(FoldRange {
                    start: node.position,
                    end: self.arena[end].position,
                    depth,
                });
            }
            stack.extend(node.start_children.iter().rev().map(|&c| (c, depth + 1)));
        }

        ranges
    }

    /// Human-readable structural snapshot, for debugging and tests.
    ///
    /// Starts print as `{`, ends as `}`, each with its position and its parent's position,
    /// indented by nesting depth. A pair's end is aligned with its start.
    pub fn dump(&self) -> String {
        let mut out = String::from("(0)");
        let mut stack = vec![self.dump_frame(self.root, 0)];

        while let Some(frame) = stack.last_mut() {
            let Some(&child) = frame.level.get(frame.cursor) else {
                stack.pop();
                continue;
            };
            frame.cursor += 1;
            let (parent, depth, end_depth) = (frame.node, frame.depth, frame.end_depth);

            let child_node = &self.arena[child];
            let (brace, indent) = match child_node.kind {
                MarkerKind::End => ('}', end_depth),
                MarkerKind::Start | MarkerKind::Root => ('{', depth),
            };
            out.push('\n');
            out.push_str(&"   ".repeat(indent));
            out.push_str(&format!(
                "{brace} (position={}, parentNo={})",
                child_node.position, self.arena[parent].position
            ));

            if child_node.kind == MarkerKind::Start {
                stack.push(self.dump_frame(child, depth + 1));
            }
        }

        out
    }

    fn dump_frame(&self, id: NodeId, depth: usize) -> DumpFrame {
        let node = &self.arena[id];
        DumpFrame {
            node: id,
            depth,
            end_depth: if node.kind.is_root() { depth } else { depth - 1 },
            level: self
                .arena
                .merge_children(&node.start_children, &node.end_children),
            cursor: 0,
        }
    }

    fn check_after_edit(&self, action: &str) {
        if !self.options.verify_after_edit {
            return;
        }
        if let Err(err) = self.verify() {
            panic!("folding tree corrupted by {action}: {err}\n{}", self.dump());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MarkerKind::{End, Start};

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "missing from its holder")]
    fn test_delete_end_detached_from_holder_panics() {
        let mut tree = FoldingTree::from_markers(&[Start, End]).unwrap();
        let start = tree.index[1];
        tree.arena[start].end_children.clear();

        tree.delete_node(2);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "missing from its parent")]
    fn test_delete_start_detached_from_parent_panics() {
        let mut tree = FoldingTree::from_markers(&[Start, Start, End, End]).unwrap();
        let outer = tree.index[1];
        tree.arena[outer].start_children.clear();

        tree.delete_node(2);
    }

    #[test]
    fn test_delete_keeps_arena_and_index_in_step() {
        let mut tree = FoldingTree::from_markers(&[Start, Start, End, End]).unwrap();

        assert!(tree.delete_node(2));
        assert!(tree.delete_node(2));
        assert_eq!(tree.arena.len(), tree.index.len());
        assert_eq!(tree.matching_pairs(), vec![(1, 2)]);
    }
}
