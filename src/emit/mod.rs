//! Output backends.
//!
//! Both backends read the same [`CompiledSet`] and implement [`Emitter`]:
//! the code backend writes C/C++ dispatch functions, the tree backend an
//! indented listing of the same tries for inspection. Emission happens
//! entirely in memory; [`Sinks`] writes the finished text afterwards, so a
//! failure never leaves a half-written file behind.

mod c_code;
mod tree;

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use crate::pipeline::CompiledSet;
use crate::word_table::{is_identifier, WordTable};

pub use self::c_code::CodeEmitter;
pub use self::tree::TreeEmitter;

/// Problems with the requested output, detected before any trie work.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown output language {0:?} (expected C or tree)")]
    UnknownBackend(String),
    #[error("{what} {name:?} is not a valid identifier")]
    InvalidIdentifier { what: &'static str, name: String },
    #[error("the tree listing is a single document; a separate header needs the C backend")]
    SplitTreeOutput,
    #[error("counter name {0:?} is already used as a label")]
    CounterCollision(String),
    #[error("counter {0:?} would be one past i64::MAX")]
    CounterOverflow(String),
}

/// Surface options of the generated code.
#[derive(Debug, Clone)]
pub struct EmitConfig {
    /// Name of the generated enumeration.
    pub enum_name: String,
    /// Name of the entry function; per-length helpers append the length.
    pub function_name: String,
    /// Extra enumerator set to one past the largest value.
    pub counter_name: Option<String>,
    /// Emit a C++ `enum class` and qualify every enumerator.
    pub enum_class: bool,
    /// Wrap everything in a C++ namespace (`a::b` allowed).
    pub namespace: Option<String>,
    /// Give the entry function C linkage.
    pub extern_c: bool,
    /// Additional headers for the declarations unit.
    pub includes: Vec<String>,
    /// File name of the declarations unit when it is written separately.
    pub header_name: Option<String>,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            enum_name: "PerfectKey".to_string(),
            function_name: "PerfectHash".to_string(),
            counter_name: None,
            enum_class: false,
            namespace: None,
            extern_c: false,
            includes: Vec::new(),
            header_name: None,
        }
    }
}

impl EmitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let check = |what: &'static str, name: &str| {
            if is_identifier(name) {
                Ok(())
            } else {
                Err(ConfigError::InvalidIdentifier {
                    what,
                    name: name.to_string(),
                })
            }
        };
        check("enum name", &self.enum_name)?;
        check("function name", &self.function_name)?;
        if let Some(counter) = &self.counter_name {
            check("counter name", counter)?;
        }
        if let Some(namespace) = &self.namespace {
            for segment in namespace.split("::") {
                if !is_identifier(segment) {
                    return Err(ConfigError::InvalidIdentifier {
                        what: "namespace",
                        name: namespace.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Checks that need the word table.
    pub fn validate_against(&self, table: &WordTable) -> Result<(), ConfigError> {
        if let Some(counter) = &self.counter_name {
            if table.enumeration().iter().any(|(label, _)| label == counter) {
                return Err(ConfigError::CounterCollision(counter.clone()));
            }
            if table.max_value() == i64::MAX {
                return Err(ConfigError::CounterOverflow(counter.clone()));
            }
        }
        Ok(())
    }
}

/// The two logical output units.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generated {
    pub declarations: String,
    pub definitions: String,
}

/// Shared contract of the output backends.
pub trait Emitter {
    fn emit(&self, compiled: &CompiledSet, table: &WordTable) -> Result<Generated, fmt::Error>;
}

/// Backend names accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Code,
    Tree,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "C" | "c" | "C++" | "c++" => Ok(Self::Code),
            "tree" => Ok(Self::Tree),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// A configured backend.
#[derive(Debug, Clone)]
pub enum Backend {
    Code(CodeEmitter),
    Tree(TreeEmitter),
}

impl Backend {
    pub fn new(kind: BackendKind, config: EmitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        match kind {
            BackendKind::Code => Ok(Self::Code(CodeEmitter::new(config))),
            BackendKind::Tree if config.header_name.is_some() => Err(ConfigError::SplitTreeOutput),
            BackendKind::Tree => Ok(Self::Tree(TreeEmitter)),
        }
    }
}

impl Emitter for Backend {
    fn emit(&self, compiled: &CompiledSet, table: &WordTable) -> Result<Generated, fmt::Error> {
        match self {
            Self::Code(emitter) => emitter.emit(compiled, table),
            Self::Tree(emitter) => emitter.emit(compiled, table),
        }
    }
}

/// Where the output units go.
///
/// `Single` is the one-destination case: both units are written to the same
/// writer, declarations first.
pub enum Sinks<W: Write> {
    Single(W),
    Split { declarations: W, definitions: W },
}

impl<W: Write> Sinks<W> {
    pub fn declarations(&mut self) -> &mut W {
        match self {
            Self::Single(sink) => sink,
            Self::Split { declarations, .. } => declarations,
        }
    }

    pub fn definitions(&mut self) -> &mut W {
        match self {
            Self::Single(sink) => sink,
            Self::Split { definitions, .. } => definitions,
        }
    }

    pub fn write(&mut self, generated: &Generated) -> io::Result<()> {
        self.declarations()
            .write_all(generated.declarations.as_bytes())?;
        self.declarations().flush()?;
        self.definitions()
            .write_all(generated.definitions.as_bytes())?;
        self.definitions().flush()
    }
}
