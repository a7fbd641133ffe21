//! Compilation pipeline: word table → base trie → one rebuilt trie per word length.

use std::collections::BTreeMap;

use crate::trie::{ByteTrie, Terminal, TreeRebuilder, CHUNK_WIDTHS, DEFAULT_MAX_CHUNK_WIDTH};
use crate::word_table::WordTable;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Errors raised while compiling a word table.
#[derive(thiserror::Error, Debug)]
pub enum CompileError {
    #[error("words {first:?} and {second:?} differ only in case and cannot both be matched case-insensitively")]
    CaseCollision { first: String, second: String },
    #[error("chunk width {0} is not one of 1, 2, 4 or 8")]
    InvalidChunkWidth(usize),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Options that shape the tries.
#[derive(Debug, Clone, Copy)]
pub struct CompileConfig {
    /// Match words regardless of ASCII case.
    pub ignore_case: bool,
    /// Compare several bytes per trie level.
    pub multi_byte: bool,
    /// Widest chunk when `multi_byte` is set.
    pub max_chunk_width: usize,
    /// Specialize word lengths on a thread pool.
    pub use_threads: bool,
    /// Worker count when threading is enabled.
    pub max_workers: usize,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            ignore_case: false,
            multi_byte: false,
            max_chunk_width: DEFAULT_MAX_CHUNK_WIDTH,
            use_threads: false,
            max_workers: 1,
        }
    }
}

impl CompileConfig {
    pub fn validate(&self) -> Result<(), CompileError> {
        if !CHUNK_WIDTHS.contains(&self.max_chunk_width) {
            return Err(CompileError::InvalidChunkWidth(self.max_chunk_width));
        }
        Ok(())
    }

    /// Widest chunk the tries may use.
    pub fn chunk_width_limit(&self) -> usize {
        if self.multi_byte {
            self.max_chunk_width
        } else {
            1
        }
    }
}

/// Everything an emitter needs: one rebuilt trie per word length.
#[derive(Debug, Clone)]
pub struct CompiledSet {
    /// Keyed by word length, so iteration is in ascending length order.
    pub tries: BTreeMap<usize, ByteTrie>,
    pub fallback: Terminal,
    pub ignore_case: bool,
    pub max_chunk_width: usize,
}

impl CompiledSet {
    /// Word lengths that have at least one word.
    pub fn lengths(&self) -> impl Iterator<Item = usize> + '_ {
        self.tries.keys().copied()
    }

    pub fn trie(&self, length: usize) -> Option<&ByteTrie> {
        self.tries.get(&length)
    }

    /// Whether any trie level reads more than one byte at once.
    pub fn uses_multi_byte(&self) -> bool {
        self.tries
            .values()
            .any(|trie| trie.level_widths().iter().flatten().any(|&w| w > 1))
    }
}

/// Insert every word of the table into one trie.
///
/// With `ignore_case` the keys are lowercased, so both cases of a letter land
/// on the same edge.
pub fn build_base_trie(table: &WordTable, config: &CompileConfig) -> ByteTrie {
    let mut trie = ByteTrie::new(config.chunk_width_limit());
    for entry in table.entries() {
        let key = if config.ignore_case {
            entry.word.to_ascii_lowercase()
        } else {
            entry.word.clone()
        };
        let terminal = Terminal::new(entry.label.clone(), entry.value);
        if let Some(previous) = trie.insert(&key, terminal) {
            log::warn!(
                "{:?} shadows {} with {}",
                String::from_utf8_lossy(&entry.word),
                previous.label,
                entry.label
            );
        }
    }
    trie
}

/// Filter the base trie to one length and rebuild it.
pub fn specialize(base: &ByteTrie, length: usize, rebuilder: &TreeRebuilder) -> Option<ByteTrie> {
    let filtered = base.filter_depth(length)?;
    let rebuilt = rebuilder.rebuild(&filtered);
    log::debug!(
        "length {}: {} nodes filtered, {} rebuilt, widths {:?}",
        length,
        filtered.len(),
        rebuilt.len(),
        rebuilt.level_widths()
    );
    Some(rebuilt)
}

/// Compile a word table.
pub fn compile(table: &WordTable, config: &CompileConfig) -> Result<CompiledSet, CompileError> {
    config.validate()?;
    if config.ignore_case {
        if let Some((first, second)) = table.case_collisions().into_iter().next() {
            return Err(CompileError::CaseCollision {
                first: String::from_utf8_lossy(&first.word).into_owned(),
                second: String::from_utf8_lossy(&second.word).into_owned(),
            });
        }
    }

    log::info!("Building trie for {} words...", table.len());
    let base = build_base_trie(table, config);
    log::info!("Base trie has {} nodes.", base.len());

    let rebuilder = TreeRebuilder::new(config.ignore_case, config.chunk_width_limit());
    let lengths: Vec<usize> = table.lengths().into_iter().collect();
    let specialize_one = |&length: &usize| (length, specialize(&base, length, &rebuilder));

    let results: Vec<(usize, Option<ByteTrie>)> = if config.use_threads {
        #[cfg(feature = "parallel")]
        {
            use rayon::ThreadPoolBuilder;
            let pool = ThreadPoolBuilder::new()
                .num_threads(config.max_workers.max(1))
                .build()
                .map_err(|e| CompileError::ThreadPool(e.to_string()))?;
            pool.install(|| lengths.par_iter().map(specialize_one).collect())
        }
        #[cfg(not(feature = "parallel"))]
        {
            lengths.iter().map(specialize_one).collect()
        }
    } else {
        lengths.iter().map(specialize_one).collect()
    };

    let tries: BTreeMap<usize, ByteTrie> = results
        .into_iter()
        .filter_map(|(length, trie)| trie.map(|trie| (length, trie)))
        .collect();
    log::info!("Specialized {} word lengths.", tries.len());

    let fallback = table.fallback();
    Ok(CompiledSet {
        tries,
        fallback: Terminal::new(fallback.label.clone(), fallback.value),
        ignore_case: config.ignore_case,
        max_chunk_width: config.chunk_width_limit(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(words: &[&str]) -> WordTable {
        let mut table = WordTable::new();
        for word in words {
            table.push(word.as_bytes(), word.replace('-', "_"), None).unwrap();
        }
        table
    }

    #[test]
    fn one_trie_per_distinct_length() {
        let compiled = compile(&table(&["a", "bb", "cc", "dddd"]), &CompileConfig::default()).unwrap();
        assert_eq!(compiled.lengths().collect::<Vec<_>>(), vec![1, 2, 4]);
        assert_eq!(compiled.trie(2).unwrap().words().len(), 2);
        assert!(compiled.trie(3).is_none());
    }

    #[test]
    fn rejects_case_collisions_only_when_ignoring_case() {
        let words = table(&["Host", "host"]);
        assert!(compile(&words, &CompileConfig::default()).is_ok());
        let config = CompileConfig {
            ignore_case: true,
            ..Default::default()
        };
        assert!(matches!(
            compile(&words, &config),
            Err(CompileError::CaseCollision { .. })
        ));
    }

    #[test]
    fn rejects_unsupported_chunk_widths() {
        let config = CompileConfig {
            multi_byte: true,
            max_chunk_width: 3,
            ..Default::default()
        };
        assert!(matches!(
            compile(&table(&["a"]), &config),
            Err(CompileError::InvalidChunkWidth(3))
        ));
    }

    #[test]
    fn single_byte_unless_multi_byte() {
        let words = table(&["abcdefgh"]);
        let compiled = compile(&words, &CompileConfig::default()).unwrap();
        assert!(!compiled.uses_multi_byte());
        let config = CompileConfig {
            multi_byte: true,
            ..Default::default()
        };
        let compiled = compile(&words, &config).unwrap();
        assert!(compiled.uses_multi_byte());
        assert_eq!(compiled.trie(8).unwrap().depth(), 1);
    }

    #[test]
    fn threaded_compile_matches_sequential() {
        let words = table(&["get", "put", "post", "head", "delete", "options", "trace", "patch"]);
        let sequential = compile(&words, &CompileConfig::default()).unwrap();
        let config = CompileConfig {
            use_threads: true,
            max_workers: 2,
            ..Default::default()
        };
        let threaded = compile(&words, &config).unwrap();
        assert_eq!(sequential.tries, threaded.tries);
    }
}
