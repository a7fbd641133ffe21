//! Indented listing of the compiled tries, for eyeballing a word set.
//!
//! ```text
//! fallback => Unknown (-1)
//! length 3:
//! └── "R"
//!     └── "e"
//!         └── "d" => Red (1)
//! ```

use std::fmt::{self, Write};

use crate::emit::{Emitter, Generated};
use crate::pipeline::CompiledSet;
use crate::trie::{ByteTrie, NodeId, Terminal};
use crate::word_table::WordTable;

/// Writes every per-length trie as a box-drawing tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeEmitter;

fn quote(chunk: &[u8]) -> String {
    let mut quoted = String::with_capacity(chunk.len() + 2);
    quoted.push('"');
    for &b in chunk {
        match b {
            b'"' => quoted.push_str("\\\""),
            b'\\' => quoted.push_str("\\\\"),
            0x20..=0x7e => quoted.push(b as char),
            _ => quoted.push_str(&format!("\\x{b:02x}")),
        }
    }
    quoted.push('"');
    quoted
}

fn suffix(terminal: Option<&Terminal>) -> String {
    terminal.map_or_else(String::new, |t| format!(" => {} ({})", t.label, t.value))
}

impl TreeEmitter {
    fn write_children(out: &mut String, trie: &ByteTrie, id: NodeId, prefix: &str) -> fmt::Result {
        let children: Vec<(&[u8], NodeId)> = trie.children(id).collect();
        let count = children.len();
        for (i, (key, child)) in children.into_iter().enumerate() {
            let last = i + 1 == count;
            let (branch, continuation) = if last {
                ("└── ", "    ")
            } else {
                ("├── ", "│   ")
            };
            let terminal = trie.node(child).terminal.as_ref();
            writeln!(out, "{prefix}{branch}{}{}", quote(key), suffix(terminal))?;
            Self::write_children(out, trie, child, &format!("{prefix}{continuation}"))?;
        }
        Ok(())
    }
}

impl Emitter for TreeEmitter {
    fn emit(&self, compiled: &CompiledSet, _table: &WordTable) -> Result<Generated, fmt::Error> {
        let mut out = String::new();
        writeln!(
            out,
            "fallback => {} ({})",
            compiled.fallback.label, compiled.fallback.value
        )?;
        for (&length, trie) in &compiled.tries {
            writeln!(out)?;
            writeln!(out, "length {length}:")?;
            if let Some(terminal) = &trie.root().terminal {
                writeln!(out, "(root){}", suffix(Some(terminal)))?;
            }
            Self::write_children(&mut out, trie, ByteTrie::ROOT, "")?;
        }
        Ok(Generated {
            declarations: String::new(),
            definitions: out,
        })
    }
}
