//! Byte trie and its per-length rebuild.

mod byte_trie;
mod rebuild;

pub use self::byte_trie::{ByteTrie, NodeId, Terminal, TrieNode};
pub use self::rebuild::TreeRebuilder;

/// Chunk widths a multi-byte trie may use; reads wider than 8 bytes are not emitted.
pub const CHUNK_WIDTHS: [usize; 4] = [1, 2, 4, 8];

/// Default widest chunk when multi-byte reads are enabled.
pub const DEFAULT_MAX_CHUNK_WIDTH: usize = 8;
