//! triehash: order-preserving perfect hash generator for fixed word sets.
//!
//! A word list is read into a [`WordTable`], inserted into a byte trie,
//! split into one trie per word length and re-chunked so that every level
//! can be dispatched with a single `switch`. The result, a [`CompiledSet`],
//! is handed to an [`Emitter`] backend (C/C++ code or a tree listing), or
//! evaluated in-process with [`CompiledSet::lookup`].

pub mod ambiguity;
pub mod emit;
pub mod matcher;
pub mod pipeline;
pub mod trie;
pub mod word_source;
pub mod word_table;

pub use ambiguity::{alignment, dispatch_mode, split_point, DispatchMode};
pub use emit::{
    Backend, BackendKind, CodeEmitter, ConfigError, EmitConfig, Emitter, Generated, Sinks,
    TreeEmitter,
};
pub use pipeline::{compile, CompileConfig, CompileError, CompiledSet};
pub use trie::{ByteTrie, NodeId, Terminal, TreeRebuilder};
pub use word_source::{open_reader, parse_line, read_word_table, Declaration, SourceError};
pub use word_table::{escape_label, Entry, Fallback, ValueOverflow, WordTable};
