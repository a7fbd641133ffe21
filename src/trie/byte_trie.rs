//! Arena-allocated byte trie with chunked edges.
//!
//! Nodes live in a `Vec` and are addressed by index; the root is always
//! index 0. Derived tries (one per word length) are separate arenas, so
//! nothing is shared between them. Edges are keyed by byte chunks whose
//! width is picked by [`alignment`] on the bytes still to be consumed.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::ambiguity::alignment;

/// Index of a node inside its trie.
pub type NodeId = usize;

/// Annotation on a node where a word ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Terminal {
    pub label: String,
    pub value: i64,
}

impl Terminal {
    pub fn new(label: impl Into<String>, value: i64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// One trie node.
///
/// `children` iterates in ascending byte order of the chunk key, which is
/// what makes emission deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrieNode {
    pub children: BTreeMap<Vec<u8>, NodeId>,
    pub terminal: Option<Terminal>,
}

impl TrieNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Byte trie over chunked keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteTrie {
    nodes: Vec<TrieNode>,
    max_width: usize,
}

impl ByteTrie {
    pub const ROOT: NodeId = 0;

    /// Empty trie whose insertions consume at most `max_width` bytes per level.
    pub fn new(max_width: usize) -> Self {
        Self {
            nodes: vec![TrieNode::default()],
            max_width: max_width.max(1),
        }
    }

    pub fn max_width(&self) -> usize {
        self.max_width
    }

    pub(crate) fn alloc(&mut self) -> NodeId {
        self.nodes.push(TrieNode::default());
        self.nodes.len() - 1
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut TrieNode {
        &mut self.nodes[id]
    }

    pub fn node(&self, id: NodeId) -> &TrieNode {
        &self.nodes[id]
    }

    pub fn root(&self) -> &TrieNode {
        &self.nodes[Self::ROOT]
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root().is_leaf() && self.root().terminal.is_none()
    }

    /// Children of `id` as `(chunk, child)` pairs in ascending chunk order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (&[u8], NodeId)> + '_ {
        self.nodes[id]
            .children
            .iter()
            .map(|(key, &child)| (key.as_slice(), child))
    }

    /// Width of the chunks leaving `id`, if they share one.
    pub fn chunk_width(&self, id: NodeId) -> Option<usize> {
        let mut widths = self.nodes[id].children.keys().map(Vec::len);
        let first = widths.next()?;
        widths.all(|w| w == first).then_some(first)
    }

    /// Insert a word. Returns the terminal it replaced, if the exact bytes were
    /// already present.
    pub fn insert(&mut self, word: &[u8], terminal: Terminal) -> Option<Terminal> {
        let mut current = Self::ROOT;
        let mut offset = 0;
        while offset < word.len() {
            let width = alignment(word.len() - offset, self.max_width);
            let chunk = &word[offset..offset + width];
            current = match self.nodes[current].children.get(chunk) {
                Some(&child) => child,
                None => {
                    let child = self.alloc();
                    self.nodes[current].children.insert(chunk.to_vec(), child);
                    child
                }
            };
            offset += width;
        }
        self.nodes[current].terminal.replace(terminal)
    }

    /// The sub-trie of words whose chunks add up to exactly `target` bytes.
    ///
    /// Returns `None` if no word has that length.
    pub fn filter_depth(&self, target: usize) -> Option<ByteTrie> {
        let mut out = ByteTrie::new(self.max_width);
        if target == 0 {
            let terminal = self.root().terminal.clone()?;
            out.nodes[Self::ROOT].terminal = Some(terminal);
            return Some(out);
        }
        let children = self.filtered_children(Self::ROOT, target, &mut out);
        if children.is_empty() {
            return None;
        }
        out.nodes[Self::ROOT].children = children;
        Some(out)
    }

    fn filtered_children(
        &self,
        id: NodeId,
        remaining: usize,
        out: &mut ByteTrie,
    ) -> BTreeMap<Vec<u8>, NodeId> {
        let mut kept = BTreeMap::new();
        for (key, &child) in &self.nodes[id].children {
            let width = key.len();
            if width == remaining {
                if let Some(terminal) = &self.nodes[child].terminal {
                    let leaf = out.alloc();
                    out.nodes[leaf].terminal = Some(terminal.clone());
                    kept.insert(key.clone(), leaf);
                }
            } else if width < remaining {
                let grandchildren = self.filtered_children(child, remaining - width, out);
                if !grandchildren.is_empty() {
                    let inner = out.alloc();
                    out.nodes[inner].children = grandchildren;
                    kept.insert(key.clone(), inner);
                }
            }
        }
        kept
    }

    /// Exact-byte lookup, without any case folding.
    pub fn get(&self, word: &[u8]) -> Option<&Terminal> {
        self.get_from(Self::ROOT, word)
    }

    // Widths can differ between siblings before filtering, so every matching
    // chunk has to be tried.
    fn get_from(&self, id: NodeId, rest: &[u8]) -> Option<&Terminal> {
        if rest.is_empty() {
            return self.nodes[id].terminal.as_ref();
        }
        self.children(id)
            .filter(|(key, _)| rest.starts_with(key))
            .find_map(|(key, child)| self.get_from(child, &rest[key.len()..]))
    }

    /// Every accepted path with its terminal, in ascending byte order.
    pub fn words(&self) -> Vec<(Vec<u8>, &Terminal)> {
        let mut words = Vec::new();
        let mut stack = vec![(Self::ROOT, Vec::new())];
        while let Some((id, prefix)) = stack.pop() {
            if let Some(terminal) = &self.nodes[id].terminal {
                words.push((prefix.clone(), terminal));
            }
            for (key, child) in self.children(id).collect::<Vec<_>>().into_iter().rev() {
                let mut path = prefix.clone();
                path.extend_from_slice(key);
                stack.push((child, path));
            }
        }
        words
    }

    /// Longest root-to-leaf path counted in levels.
    pub fn depth(&self) -> usize {
        fn walk(trie: &ByteTrie, id: NodeId) -> usize {
            trie.children(id)
                .map(|(_, child)| 1 + walk(trie, child))
                .max()
                .unwrap_or(0)
        }
        walk(self, Self::ROOT)
    }

    /// Chunk widths used at each level below the root, outermost first.
    pub fn level_widths(&self) -> Vec<Vec<usize>> {
        let mut levels: Vec<Vec<usize>> = Vec::new();
        let mut frontier = vec![Self::ROOT];
        while !frontier.is_empty() {
            let mut widths: Vec<usize> = frontier
                .iter()
                .flat_map(|&id| self.nodes[id].children.keys().map(Vec::len))
                .collect();
            if widths.is_empty() {
                break;
            }
            widths.sort_unstable();
            widths.dedup();
            levels.push(widths);
            frontier = frontier
                .iter()
                .flat_map(|&id| self.children(id).map(|(_, child)| child))
                .collect();
        }
        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie_of(words: &[&str], max_width: usize) -> ByteTrie {
        let mut trie = ByteTrie::new(max_width);
        for (value, word) in words.iter().enumerate() {
            trie.insert(word.as_bytes(), Terminal::new(*word, value as i64));
        }
        trie
    }

    #[test]
    fn inserts_single_byte_chunks() {
        let trie = trie_of(&["ab", "ac"], 1);
        assert_eq!(trie.len(), 4);
        assert_eq!(trie.chunk_width(ByteTrie::ROOT), Some(1));
        assert_eq!(trie.get(b"ac").map(|t| t.value), Some(1));
        assert_eq!(trie.get(b"ad"), None);
    }

    #[test]
    fn inserts_aligned_multi_byte_chunks() {
        let trie = trie_of(&["Content"], 8);
        // 7 bytes: 4 + 2 + 1
        assert_eq!(trie.level_widths(), vec![vec![4], vec![2], vec![1]]);
        assert_eq!(trie.get(b"Content").map(|t| t.label.as_str()), Some("Content"));
    }

    #[test]
    fn duplicate_insert_replaces_terminal() {
        let mut trie = ByteTrie::new(8);
        assert_eq!(trie.insert(b"same", Terminal::new("First", 1)), None);
        let replaced = trie.insert(b"same", Terminal::new("Second", 2));
        assert_eq!(replaced, Some(Terminal::new("First", 1)));
        assert_eq!(trie.get(b"same"), Some(&Terminal::new("Second", 2)));
        assert_eq!(trie.words().len(), 1);
    }

    #[test]
    fn filter_depth_keeps_only_one_length() {
        let trie = trie_of(&["ab", "abc", "abcd", "xyz"], 1);
        let three = trie.filter_depth(3).expect("words of length 3");
        let words: Vec<Vec<u8>> = three.words().into_iter().map(|(w, _)| w).collect();
        assert_eq!(words, vec![b"abc".to_vec(), b"xyz".to_vec()]);
        // the "ab" terminal on the shared path is not carried over
        assert!(three.words().iter().all(|(w, _)| w.len() == 3));
        assert!(trie.filter_depth(5).is_none());
    }

    #[test]
    fn filter_depth_turns_shared_terminals_into_leaves() {
        let trie = trie_of(&["abcd", "abcde"], 8);
        let four = trie.filter_depth(4).expect("length 4");
        let (_, leaf) = four.children(ByteTrie::ROOT).next().unwrap();
        assert!(four.node(leaf).is_leaf());
        assert_eq!(four.node(leaf).terminal.as_ref().map(|t| t.value), Some(0));
    }

    #[test]
    fn filter_depth_of_zero_needs_the_empty_word() {
        let trie = trie_of(&["a"], 8);
        assert!(trie.filter_depth(0).is_none());
        let trie = trie_of(&["", "a"], 8);
        let empty = trie.filter_depth(0).expect("empty word");
        assert_eq!(empty.len(), 1);
        assert!(empty.root().terminal.is_some());
    }

    #[test]
    fn words_come_out_sorted() {
        let trie = trie_of(&["b", "a", "c"], 1);
        let words: Vec<Vec<u8>> = trie.words().into_iter().map(|(w, _)| w).collect();
        assert_eq!(words, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn handles_empty_trie() {
        let trie = ByteTrie::new(8);
        assert!(trie.is_empty());
        assert!(trie.words().is_empty());
        assert_eq!(trie.depth(), 0);
        assert_eq!(trie.chunk_width(ByteTrie::ROOT), None);
    }
}
