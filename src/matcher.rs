//! In-process evaluation of a compiled set.
//!
//! Walks the same rebuilt tries the emitters read and takes the same decision
//! at every node as the generated `switch` does, including the bit-OR fold
//! and the explicit case arms. This is what `--check` and the tests use to
//! see what generated code would return without compiling it.

use crate::ambiguity::{dispatch_mode, DispatchMode, CASE_BIT};
use crate::pipeline::CompiledSet;
use crate::trie::{ByteTrie, NodeId, Terminal};

fn chunk_matches(mode: DispatchMode, chunk: &[u8], key: &[u8]) -> bool {
    match mode {
        DispatchMode::Exact => chunk == key,
        DispatchMode::Folded => chunk
            .iter()
            .zip(key)
            .all(|(&c, &k)| c | CASE_BIT == k | CASE_BIT),
        DispatchMode::CaseVariants => chunk.iter().zip(key).all(|(&c, &k)| {
            c == k || (k.is_ascii_alphabetic() && c.eq_ignore_ascii_case(&k))
        }),
    }
}

/// Dispatch mode of a node, as the code emitter will see it.
pub fn node_mode(trie: &ByteTrie, id: NodeId, ignore_case: bool) -> DispatchMode {
    dispatch_mode(trie.children(id).map(|(key, _)| key), ignore_case)
}

impl CompiledSet {
    /// Result the generated function returns for `word`.
    pub fn lookup(&self, word: &[u8]) -> &Terminal {
        self.lookup_word(word).unwrap_or(&self.fallback)
    }

    /// Like [`CompiledSet::lookup`], but `None` instead of the fallback.
    pub fn lookup_word(&self, word: &[u8]) -> Option<&Terminal> {
        let trie = self.trie(word.len())?;
        let mut current = ByteTrie::ROOT;
        let mut offset = 0;
        loop {
            let node = trie.node(current);
            if node.is_leaf() {
                return if offset == word.len() {
                    node.terminal.as_ref()
                } else {
                    None
                };
            }
            let width = trie.chunk_width(current)?;
            let chunk = word.get(offset..offset + width)?;
            let mode = node_mode(trie, current, self.ignore_case);
            let (_, child) = trie
                .children(current)
                .find(|(key, _)| chunk_matches(mode, chunk, key))?;
            current = child;
            offset += width;
        }
    }

    /// Every word the compiled set accepts in its stored (canonical) form.
    pub fn accepted_words(&self) -> Vec<(Vec<u8>, &Terminal)> {
        self.tries.values().flat_map(|trie| trie.words()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{compile, CompileConfig};
    use crate::word_table::WordTable;

    fn colours() -> WordTable {
        let mut table = WordTable::new();
        table.push(b"Red", "Red".into(), Some(1)).unwrap();
        table.push(b"Green", "Green".into(), None).unwrap();
        table.push(b"Blue", "Blue".into(), Some(5)).unwrap();
        table.set_fallback(Some("Unknown".into()), -1);
        table
    }

    #[test]
    fn matches_the_colour_scenario() {
        let compiled = compile(&colours(), &CompileConfig::default()).unwrap();
        assert_eq!(compiled.lookup(b"Green").value, 2);
        assert_eq!(compiled.lookup(b"Black").value, -1);
        assert_eq!(compiled.lookup(b"Red").value, 1);
        assert_eq!(compiled.lookup(b"Blue").label, "Blue");
        assert_eq!(compiled.lookup(b"red").label, "Unknown");
    }

    #[test]
    fn folded_nodes_accept_any_case() {
        let config = CompileConfig {
            ignore_case: true,
            multi_byte: true,
            ..Default::default()
        };
        let compiled = compile(&colours(), &config).unwrap();
        assert_eq!(compiled.lookup(b"gReEn").value, 2);
        assert_eq!(compiled.lookup(b"BLUE").value, 5);
    }

    #[test]
    fn ambiguous_bytes_are_not_folded() {
        let mut table = WordTable::new();
        table.push(b"a-b", "a_b".into(), None).unwrap();
        let config = CompileConfig {
            ignore_case: true,
            ..Default::default()
        };
        let compiled = compile(&table, &config).unwrap();
        assert_eq!(compiled.lookup(b"A-B").label, "a_b");
        // '\r' | 0x20 == '-', so a folded comparison would accept this
        assert_eq!(compiled.lookup(b"a\rb").label, "Unknown");
    }

    #[test]
    fn chunk_matching_modes() {
        assert!(chunk_matches(DispatchMode::Exact, b"ab", b"ab"));
        assert!(!chunk_matches(DispatchMode::Exact, b"AB", b"ab"));
        assert!(chunk_matches(DispatchMode::Folded, b"AB", b"ab"));
        assert!(chunk_matches(DispatchMode::CaseVariants, b"A", b"a"));
        assert!(!chunk_matches(DispatchMode::CaseVariants, b"\r", b"-"));
        assert!(chunk_matches(DispatchMode::CaseVariants, b"-", b"-"));
    }
}
