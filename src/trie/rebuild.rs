//! Re-chunking of length-filtered tries.
//!
//! Insertion picks chunk widths from the remaining length alone. With case
//! folding enabled that can put an ambiguous byte (say `-`) inside a
//! multi-byte chunk that is compared through the OR mask. The rebuilder walks
//! the trie again and, at every node, cuts all outgoing chunks at the earliest
//! safe split point among them. Whatever is cut off is pushed down into the
//! child, in front of the chunks below it.

use std::collections::BTreeMap;

use crate::ambiguity::split_point;
use crate::trie::{ByteTrie, NodeId, Terminal};

/// A not-yet-placed edge: the bytes still to consume and the source node they lead to.
type PendingEdge = (Vec<u8>, NodeId);

/// Rebuilds a filtered trie into one with uniform, fold-safe chunk widths.
#[derive(Debug, Clone, Copy)]
pub struct TreeRebuilder {
    pub ignore_case: bool,
    pub max_width: usize,
}

impl TreeRebuilder {
    pub fn new(ignore_case: bool, max_width: usize) -> Self {
        Self {
            ignore_case,
            max_width: max_width.max(1),
        }
    }

    /// Produce a fresh trie; `source` is left untouched.
    pub fn rebuild(&self, source: &ByteTrie) -> ByteTrie {
        let mut out = ByteTrie::new(self.max_width);
        let root = source.root();
        let pending: Vec<PendingEdge> = source
            .children(ByteTrie::ROOT)
            .map(|(key, child)| (key.to_vec(), child))
            .collect();
        self.fill(source, &mut out, ByteTrie::ROOT, pending, root.terminal.clone());
        out
    }

    fn fill(
        &self,
        source: &ByteTrie,
        out: &mut ByteTrie,
        id: NodeId,
        pending: Vec<PendingEdge>,
        terminal: Option<Terminal>,
    ) {
        out.node_mut(id).terminal = terminal;
        if pending.is_empty() {
            return;
        }

        let width = pending
            .iter()
            .map(|(key, _)| split_point(key, self.max_width, self.ignore_case))
            .min()
            .unwrap_or(1);

        let mut groups: BTreeMap<Vec<u8>, (Vec<PendingEdge>, Option<Terminal>)> = BTreeMap::new();
        for (key, target) in pending {
            let (prefix, remainder) = key.split_at(width.min(key.len()));
            let (edges, group_terminal) = groups.entry(prefix.to_vec()).or_default();
            let target_node = source.node(target);
            if remainder.is_empty() {
                if target_node.terminal.is_some() {
                    *group_terminal = target_node.terminal.clone();
                }
                edges.extend(
                    source
                        .children(target)
                        .map(|(child_key, child)| (child_key.to_vec(), child)),
                );
            } else if target_node.is_leaf() {
                edges.push((remainder.to_vec(), target));
            } else {
                edges.extend(source.children(target).map(|(child_key, child)| {
                    let mut joined = remainder.to_vec();
                    joined.extend_from_slice(child_key);
                    (joined, child)
                }));
            }
        }

        log::trace!(
            "node {}: {} chunk(s) of width {}",
            id,
            groups.len(),
            width
        );

        for (prefix, (edges, group_terminal)) in groups {
            let child = out.alloc();
            out.node_mut(id).children.insert(prefix, child);
            self.fill(source, out, child, edges, group_terminal);
        }
    }
}
