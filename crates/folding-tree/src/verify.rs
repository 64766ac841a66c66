//! Consistency checks
//!
//! [`stack_partners`] is the from-scratch reference: a plain bracket stack run over the marker
//! sequence. [`FoldingTree::verify`] compares the incrementally maintained tree against it and
//! checks the structural invariants of every node.

use crate::error::FoldingError;
use crate::node::{MarkerKind, NodeId};
use crate::tree::FoldingTree;

/// Reference matching computed with a bracket stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMatching {
    /// `partners[p]` is the partner of the marker at position `p` (index 0 is the root).
    pub partners: Vec<Option<usize>>,
    /// `enclosing[p]` is the innermost open start when the marker at `p` was read
    /// (0 stands for the root).
    pub enclosing: Vec<usize>,
    /// Starts left open at the end of the sequence.
    pub unclosed: usize,
}

/// Match `markers` (positions `1..=markers.len()`) with a bracket stack.
///
/// An end with no open start is left unmatched; a `Root` entry is ignored.
pub fn stack_matching(markers: &[MarkerKind]) -> StackMatching {
    let mut partners = vec![None; markers.len() + 1];
    let mut enclosing = vec![0; markers.len() + 1];
    let mut open: Vec<usize> = Vec::new();

    for (offset, &kind) in markers.iter().enumerate() {
        let position = offset + 1;
        enclosing[position] = open.last().copied().unwrap_or(0);
        match kind {
            MarkerKind::Start => open.push(position),
            MarkerKind::End => {
                if let Some(start) = open.pop() {
                    partners[start] = Some(position);
                    partners[position] = Some(start);
                    enclosing[position] = open.last().copied().unwrap_or(0);
                }
            }
            MarkerKind::Root => {}
        }
    }

    StackMatching {
        partners,
        enclosing,
        unclosed: open.len(),
    }
}

/// Partners computed by [`stack_matching`], indexed by position.
pub fn stack_partners(markers: &[MarkerKind]) -> Vec<Option<usize>> {
    stack_matching(markers).partners
}

fn violation(message: String) -> Result<(), FoldingError> {
    Err(FoldingError::InvariantViolation(message))
}

impl FoldingTree {
    /// Check every structural invariant and the matching relation.
    ///
    /// Returns [`FoldingError::InvariantViolation`] describing the first problem found.
    pub fn verify(&self) -> Result<(), FoldingError> {
        self.verify_index()?;
        self.verify_links()?;
        self.verify_matching()
    }

    /// Positions form a permutation of `0..len()` with the root at 0.
    fn verify_index(&self) -> Result<(), FoldingError> {
        if self.index.first() != Some(&self.root) {
            return violation("root is not at position 0".to_string());
        }
        if self.arena.len() != self.index.len() {
            return violation(format!(
                "{} live nodes but {} indexed positions",
                self.arena.len(),
                self.index.len()
            ));
        }

        for (position, &id) in self.index.iter().enumerate() {
            let Some(node) = self.arena.get(id) else {
                return violation(format!("position {position} points at a released node {id}"));
            };
            if node.position != position {
                return violation(format!(
                    "node {id} indexed at {position} believes it is at {}",
                    node.position
                ));
            }
            if node.kind.is_root() != (position == 0) {
                return violation(format!("unexpected root marker at position {position}"));
            }
        }
        Ok(())
    }

    /// Children are ordered, point back at their parent, and every node is reached exactly once.
    fn verify_links(&self) -> Result<(), FoldingError> {
        let mut seen = vec![false; self.index.len()];
        let mut stack = vec![self.root];
        seen[0] = true;

        while let Some(id) = stack.pop() {
            let node = &self.arena[id];

            for (children, kind) in [
                (&node.start_children, MarkerKind::Start),
                (&node.end_children, MarkerKind::End),
            ] {
                let mut previous = node.position;
                for &child in children {
                    let child_node = &self.arena[child];
                    if child_node.kind != kind {
                        return violation(format!(
                            "{:?} node at {} listed among {:?} children of {}",
                            child_node.kind, child_node.position, kind, node.position
                        ));
                    }
                    if child_node.parent != Some(id) {
                        return violation(format!(
                            "node at {} does not point back at its parent {}",
                            child_node.position, node.position
                        ));
                    }
                    if child_node.position <= previous {
                        return violation(format!(
                            "children of {} are not sorted after it by position",
                            node.position
                        ));
                    }
                    if seen[child_node.position] {
                        return violation(format!(
                            "node at {} is reachable twice",
                            child_node.position
                        ));
                    }
                    seen[child_node.position] = true;
                    previous = child_node.position;
                }
            }

            self.verify_shortage(id)?;
            stack.extend(node.start_children.iter().copied());
        }

        if let Some(position) = seen.iter().position(|&reached| !reached) {
            return violation(format!("node at {position} is not reachable from the root"));
        }
        Ok(())
    }

    fn verify_shortage(&self, id: NodeId) -> Result<(), FoldingError> {
        let node = &self.arena[id];
        let last_shortage = node
            .start_children
            .last()
            .map_or(0, |&c| self.arena[c].shortage);

        let expected = match node.kind {
            MarkerKind::Root => last_shortage,
            MarkerKind::Start => {
                if node.end_children.len() > 1 {
                    return violation(format!(
                        "start at {} holds {} ends",
                        node.position,
                        node.end_children.len()
                    ));
                }
                if node.end_children.is_empty() {
                    last_shortage + 1
                } else {
                    0
                }
            }
            MarkerKind::End => return Ok(()),
        };

        if node.shortage != expected {
            return violation(format!(
                "node at {} has shortage {} (expected {expected})",
                node.position, node.shortage
            ));
        }
        Ok(())
    }

    /// Partners and enclosing starts agree with a from-scratch stack scan.
    fn verify_matching(&self) -> Result<(), FoldingError> {
        let reference = stack_matching(&self.markers());

        for position in 1..self.index.len() {
            let actual = self.matching_partner(position);
            if actual != reference.partners[position] {
                return violation(format!(
                    "marker at {position} is paired with {actual:?}, expected {:?}",
                    reference.partners[position]
                ));
            }

            let id = self.index[position];
            if self.arena[id].kind == MarkerKind::Start {
                let parent = self.arena[id].parent.map(|p| self.arena[p].position);
                if parent != Some(reference.enclosing[position]) {
                    return violation(format!(
                        "start at {position} is nested in {parent:?}, expected {}",
                        reference.enclosing[position]
                    ));
                }
            }
        }

        if self.unclosed_count() != reference.unclosed {
            return violation(format!(
                "{} unclosed starts recorded, expected {}",
                self.unclosed_count(),
                reference.unclosed
            ));
        }
        Ok(())
    }
}
