//! Pruning pass
//!
//! Removes every node that would serialize as an empty element. One round
//! walks the tree bottom-up and drops:
//!
//! 1. value nodes with no (or a blank) value and no children
//! 2. coded wrappers (`valueCoding`, `coding`) without a `code` value
//! 3. containers whose only children are labels, which includes answers and
//!    items left with nothing but a `linkId` and containers with no
//!    children at all
//!
//! Removing a node can empty its parent, so rounds repeat until one removes
//! nothing. Labels are never removed on their own and never keep a
//! container alive. The root is never removed.

use super::tree::{Node, NodeRole, Scalar};
use serde::Serialize;

const CODED_WRAPPERS: [&str; 2] = ["valueCoding", "coding"];

/// Counters reported by [`prune`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneStats {
    /// Rounds run, the final no-op round included
    pub rounds: usize,

    /// Nodes removed (whole subtrees count once)
    pub removed: usize,
}

/// Prunes `root` to a fixpoint
pub fn prune(root: &mut Node) -> PruneStats {
    let mut stats = PruneStats::default();
    loop {
        stats.rounds += 1;
        let removed = prune_round(root);
        stats.removed += removed;
        if removed == 0 {
            return stats;
        }
    }
}

fn prune_round(node: &mut Node) -> usize {
    let mut removed = 0;
    for child in node.children_mut().iter_mut() {
        removed += prune_round(child);
    }
    let before = node.children().len();
    node.children_mut().retain(|child| !is_prunable(child));
    removed + before - node.children().len()
}

fn is_prunable(node: &Node) -> bool {
    match node.role() {
        NodeRole::Label => false,
        NodeRole::Value => {
            node.children().is_empty() && node.scalar().map_or(true, Scalar::is_blank)
        }
        NodeRole::Container => {
            (CODED_WRAPPERS.contains(&node.name()) && !conveys_code(node))
                || node.has_only_labels()
        }
    }
}

fn conveys_code(wrapper: &Node) -> bool {
    wrapper
        .children_named("code")
        .any(|code| code.scalar().is_some_and(|s| !s.is_blank()))
}

/// Whether the tree contains a node [`prune`] would remove
pub fn has_empty_branch(root: &Node) -> bool {
    let mut found = false;
    for child in root.children() {
        child.walk(&mut |node| found |= is_prunable(node));
    }
    found
}
