use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use serde_json::json;

use triehash::trie::DEFAULT_MAX_CHUNK_WIDTH;
use triehash::{
    compile, open_reader, read_word_table, Backend, BackendKind, CompileConfig, CompiledSet,
    EmitConfig, Emitter, Sinks, WordTable,
};

/// Generate an order-preserving perfect hash function for a fixed set of words
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Word list, one `[label ~] word [= value]` per line ("-" for stdin, .gz accepted)
    #[arg(default_value = "-")]
    input: PathBuf,

    /// Write the generated code here instead of stdout
    #[arg(long, short = 'C', value_name = "FILE")]
    code: Option<PathBuf>,

    /// Write the declarations (enum and prototype) to a separate header
    #[arg(long, short = 'H', value_name = "FILE")]
    header: Option<PathBuf>,

    /// Name of the generated enumeration
    #[arg(long, default_value = "PerfectKey")]
    enum_name: String,

    /// Name of the generated lookup function
    #[arg(long, default_value = "PerfectHash")]
    function_name: String,

    /// Extra enumerator holding the largest value + 1
    #[arg(long)]
    counter_name: Option<String>,

    /// Emit a C++ `enum class`
    #[arg(long)]
    enum_class: bool,

    /// Wrap the generated code in a C++ namespace
    #[arg(long)]
    namespace: Option<String>,

    /// Give the lookup function C linkage when compiled as C++
    #[arg(long)]
    extern_c: bool,

    /// Additional header to include (repeatable)
    #[arg(long = "include", value_name = "HEADER")]
    includes: Vec<String>,

    /// Match words regardless of ASCII case
    #[arg(long)]
    ignore_case: bool,

    /// Compare up to --max-chunk-width bytes per switch
    #[arg(long)]
    multi_byte: bool,

    /// Widest multi-byte read (1, 2, 4 or 8)
    #[arg(long, default_value_t = DEFAULT_MAX_CHUNK_WIDTH)]
    max_chunk_width: usize,

    /// Output language: C (also C++) or tree
    #[arg(long, default_value = "C")]
    language: String,

    /// Print what the generated function returns for WORD (repeatable);
    /// code then goes to stdout only if --code is not given
    #[arg(long = "check", value_name = "WORD")]
    checks: Vec<String>,

    /// Dump the word table and per-length tries as JSON
    #[arg(long, value_name = "FILE")]
    export_json: Option<PathBuf>,

    /// Specialize word lengths on a thread pool (default: off)
    #[arg(long, default_value_t = false)]
    threads: bool,

    /// Number of worker threads (default: max available - 1)
    #[arg(long, default_value_t = num_cpus::get().saturating_sub(1).max(1))]
    max_workers: usize,

    /// Verbose/info output (default: quiet)
    #[arg(long, short = 'v', alias = "info")]
    verbose: bool,

    /// Debug output
    #[arg(long)]
    debug: bool,

    /// Trace output
    #[arg(long)]
    trace: bool,
}

impl Args {
    fn emit_config(&self) -> EmitConfig {
        EmitConfig {
            enum_name: self.enum_name.clone(),
            function_name: self.function_name.clone(),
            counter_name: self.counter_name.clone(),
            enum_class: self.enum_class,
            namespace: self.namespace.clone(),
            extern_c: self.extern_c,
            includes: self.includes.clone(),
            header_name: self.header.as_deref().map(include_name),
        }
    }

    fn compile_config(&self) -> CompileConfig {
        CompileConfig {
            ignore_case: self.ignore_case,
            multi_byte: self.multi_byte,
            max_chunk_width: self.max_chunk_width,
            use_threads: self.threads,
            max_workers: self.max_workers,
        }
    }
}

fn main() {
    let args = Args::parse();
    let log_level = if args.trace {
        "trace"
    } else if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "error"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    if let Err(error) = run_pipeline(&args) {
        eprintln!("triehash: {error:#}");
        std::process::exit(1);
    }
}

/// How the definitions unit refers to the header: by file name only.
fn include_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn create_output(path: &Path) -> Result<Box<dyn Write>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => create_output(path),
        None => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

fn open_sinks(code: Option<&Path>, header: Option<&Path>) -> Result<Sinks<Box<dyn Write>>> {
    match header {
        Some(header) if Some(header) != code => Ok(Sinks::Split {
            declarations: create_output(header)?,
            definitions: open_output(code)?,
        }),
        _ => Ok(Sinks::Single(open_output(code)?)),
    }
}

fn export_json(path: &Path, table: &WordTable, compiled: &CompiledSet) -> Result<()> {
    let enumeration: Vec<_> = table
        .enumeration()
        .into_iter()
        .map(|(label, value)| json!({"label": label, "value": value}))
        .collect();
    let lengths: Vec<_> = compiled
        .tries
        .iter()
        .map(|(length, trie)| {
            let words: Vec<_> = trie
                .words()
                .into_iter()
                .map(|(word, terminal)| {
                    json!({
                        "word": String::from_utf8_lossy(&word),
                        "label": terminal.label,
                        "value": terminal.value,
                    })
                })
                .collect();
            json!({
                "length": length,
                "nodes": trie.len(),
                "depth": trie.depth(),
                "widths": trie.level_widths(),
                "words": words,
            })
        })
        .collect();
    let output = json!({
        "fallback": compiled.fallback,
        "entries": table.entries(),
        "enumeration": enumeration,
        "ignore_case": compiled.ignore_case,
        "max_chunk_width": compiled.max_chunk_width,
        "lengths": lengths,
    });

    let mut file = create_output(path)?;
    writeln!(file, "{}", serde_json::to_string_pretty(&output)?)?;
    file.flush()?;
    info!("Word table written to {}", path.display());
    Ok(())
}

fn run_pipeline(args: &Args) -> Result<()> {
    let kind: BackendKind = args.language.parse()?;
    let emit_config = args.emit_config();
    let compile_config = args.compile_config();
    compile_config.validate()?;
    let backend = Backend::new(kind, emit_config.clone())?;
    debug!("{backend:?}");

    let reader = open_reader(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let table = read_word_table(reader)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    info!("Read {} words from {}", table.len(), args.input.display());
    emit_config.validate_against(&table)?;

    let compiled = compile(&table, &compile_config)?;
    let generated = backend
        .emit(&compiled, &table)
        .context("failed to format generated code")?;

    if !args.checks.is_empty() {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for word in &args.checks {
            let terminal = compiled.lookup(word.as_bytes());
            writeln!(out, "{word}\t{}\t{}", terminal.label, terminal.value)?;
        }
    }

    if let Some(path) = &args.export_json {
        export_json(path, &table, &compiled)?;
    }

    if args.checks.is_empty() || args.code.is_some() || args.header.is_some() {
        let mut sinks = open_sinks(args.code.as_deref(), args.header.as_deref())?;
        sinks.write(&generated).context("failed to write generated code")?;
        if let Some(path) = &args.code {
            info!("Code written to {}", path.display());
        }
        if let Some(path) = &args.header {
            info!("Declarations written to {}", path.display());
        }
    }
    Ok(())
}
