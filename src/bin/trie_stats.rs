//! Per-length trie statistics for a word list.
//!
//! Prints, for every word length, how many words and nodes the rebuilt trie
//! has, how deep it is and which chunk widths each level reads. Useful for
//! judging whether `--multi-byte` pays off for a given list.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use triehash::trie::DEFAULT_MAX_CHUNK_WIDTH;
use triehash::{compile, open_reader, read_word_table, CompileConfig, CompiledSet};

#[derive(Parser, Debug)]
#[command(name = "trie_stats")]
#[command(about = "Report per-length trie shapes for a word list")]
struct Args {
    /// Word list ("-" for stdin)
    #[arg(default_value = "-")]
    input: PathBuf,

    /// Match words regardless of ASCII case
    #[arg(long)]
    ignore_case: bool,

    /// Compare several bytes per level
    #[arg(long)]
    multi_byte: bool,

    /// Widest multi-byte read (1, 2, 4 or 8)
    #[arg(long, default_value_t = DEFAULT_MAX_CHUNK_WIDTH)]
    max_chunk_width: usize,

    /// Output statistics as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
struct LengthStats {
    length: usize,
    words: usize,
    nodes: usize,
    depth: usize,
    widths: Vec<Vec<usize>>,
}

#[derive(Debug, serde::Serialize)]
struct TrieProfile {
    words: usize,
    lengths: Vec<LengthStats>,
    total_nodes: usize,
    max_depth: usize,
}

fn profile(compiled: &CompiledSet) -> TrieProfile {
    let lengths: Vec<LengthStats> = compiled
        .tries
        .iter()
        .map(|(&length, trie)| LengthStats {
            length,
            words: trie.words().len(),
            nodes: trie.len(),
            depth: trie.depth(),
            widths: trie.level_widths(),
        })
        .collect();
    TrieProfile {
        words: lengths.iter().map(|s| s.words).sum(),
        total_nodes: lengths.iter().map(|s| s.nodes).sum(),
        max_depth: lengths.iter().map(|s| s.depth).max().unwrap_or(0),
        lengths,
    }
}

fn print_profile(profile: &TrieProfile, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(profile)?);
        return Ok(());
    }
    println!(
        "{} words, {} nodes, max depth {}",
        profile.words, profile.total_nodes, profile.max_depth
    );
    println!("{:>6} {:>6} {:>6} {:>6}  widths", "length", "words", "nodes", "depth");
    for stats in &profile.lengths {
        let widths: Vec<String> = stats
            .widths
            .iter()
            .map(|level| {
                level
                    .iter()
                    .map(usize::to_string)
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .collect();
        println!(
            "{:>6} {:>6} {:>6} {:>6}  {}",
            stats.length,
            stats.words,
            stats.nodes,
            stats.depth,
            widths.join(" ")
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::init();

    let reader = open_reader(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let table = read_word_table(reader)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let config = CompileConfig {
        ignore_case: args.ignore_case,
        multi_byte: args.multi_byte,
        max_chunk_width: args.max_chunk_width,
        ..Default::default()
    };
    let compiled = compile(&table, &config)?;

    print_profile(&profile(&compiled), args.json)
}
