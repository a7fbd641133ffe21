//! C / C++ code backend.
//!
//! Generated layout (single destination):
//!
//! ```c
//! #ifndef TRIE_HASH_PerfectHash
//! #define TRIE_HASH_PerfectHash
//! #include <stddef.h>
//! #include <stdint.h>
//! enum PerfectKey {
//!     Red = 1,
//!     Unknown = -1,
//! };
//! static enum PerfectKey PerfectHash(const char *string, size_t length);
//! static enum PerfectKey PerfectHash3(const char *string)
//! {
//!     switch(string[0]) {
//!     case 'R':
//!         ...
//!     }
//!     return Unknown;
//! }
//! static enum PerfectKey PerfectHash(const char *string, size_t length)
//! {
//!     switch (length) {
//!     case 3:
//!         return PerfectHash3(string);
//!     default:
//!         return Unknown;
//!     }
//! }
//! #endif
//! ```
//!
//! With a separate header the entry function has external linkage and the
//! definitions unit includes the header instead of repeating the guard.

use std::collections::BTreeSet;
use std::fmt::{self, Write};

use crate::ambiguity::{case_variants, fold_chunk, fold_mask, DispatchMode};
use crate::emit::{EmitConfig, Emitter, Generated};
use crate::matcher::node_mode;
use crate::pipeline::CompiledSet;
use crate::trie::{ByteTrie, NodeId};
use crate::word_table::WordTable;

const INDENT: &str = "    ";

fn char_literal(b: u8) -> String {
    match b {
        b'\'' => "'\\''".to_string(),
        b'\\' => "'\\\\'".to_string(),
        0x20..=0x7e => format!("'{}'", b as char),
        _ => format!("'\\x{b:02x}'"),
    }
}

fn quote_include(header: &str) -> String {
    if header.starts_with('<') || header.starts_with('"') {
        header.to_string()
    } else {
        format!("\"{header}\"")
    }
}

/// Emits nested `switch` dispatch code.
#[derive(Debug, Clone)]
pub struct CodeEmitter {
    config: EmitConfig,
}

impl CodeEmitter {
    pub fn new(config: EmitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EmitConfig {
        &self.config
    }

    fn is_split(&self) -> bool {
        self.config.header_name.is_some()
    }

    fn return_type(&self) -> String {
        if self.config.enum_class {
            self.config.enum_name.clone()
        } else {
            format!("enum {}", self.config.enum_name)
        }
    }

    fn enumerator(&self, label: &str) -> String {
        if self.config.enum_class {
            format!("{}::{}", self.config.enum_name, label)
        } else {
            label.to_string()
        }
    }

    fn entry_storage(&self) -> &'static str {
        if self.is_split() {
            ""
        } else {
            "static "
        }
    }

    fn open_namespace(&self, out: &mut String) -> fmt::Result {
        if let Some(namespace) = &self.config.namespace {
            writeln!(out, "namespace {namespace} {{")?;
        }
        Ok(())
    }

    fn close_namespace(&self, out: &mut String) -> fmt::Result {
        if let Some(namespace) = &self.config.namespace {
            writeln!(out, "}} // namespace {namespace}")?;
        }
        Ok(())
    }

    fn open_extern_c(&self, out: &mut String) -> fmt::Result {
        if self.config.extern_c {
            writeln!(out, "#ifdef __cplusplus")?;
            writeln!(out, "extern \"C\" {{")?;
            writeln!(out, "#endif")?;
        }
        Ok(())
    }

    fn close_extern_c(&self, out: &mut String) -> fmt::Result {
        if self.config.extern_c {
            writeln!(out, "#ifdef __cplusplus")?;
            writeln!(out, "}}")?;
            writeln!(out, "#endif")?;
        }
        Ok(())
    }

    fn write_declarations(&self, out: &mut String, table: &WordTable) -> fmt::Result {
        let guard = format!("TRIE_HASH_{}", self.config.function_name);
        writeln!(out, "#ifndef {guard}")?;
        writeln!(out, "#define {guard}")?;
        writeln!(out, "#include <stddef.h>")?;
        writeln!(out, "#include <stdint.h>")?;
        for header in &self.config.includes {
            writeln!(out, "#include {}", quote_include(header))?;
        }

        self.open_namespace(out)?;
        let class = if self.config.enum_class { "class " } else { "" };
        writeln!(out, "enum {class}{} {{", self.config.enum_name)?;
        for (label, value) in table.enumeration() {
            writeln!(out, "{INDENT}{label} = {value},")?;
        }
        if let Some(counter) = &self.config.counter_name {
            let count = table.max_value().checked_add(1).ok_or(fmt::Error)?;
            writeln!(out, "{INDENT}{counter} = {count},")?;
        }
        writeln!(out, "}};")?;

        self.open_extern_c(out)?;
        writeln!(
            out,
            "{}{} {}(const char *string, size_t length);",
            self.entry_storage(),
            self.return_type(),
            self.config.function_name
        )?;
        self.close_extern_c(out)?;
        self.close_namespace(out)?;

        if self.is_split() {
            writeln!(out, "#endif")?;
        }
        Ok(())
    }

    fn write_load_helpers(&self, out: &mut String, widths: &BTreeSet<usize>) -> fmt::Result {
        writeln!(out, "#include <string.h>")?;
        writeln!(out, "#ifndef TRIE_HASH_ONECHAR")?;
        writeln!(
            out,
            "#if defined(__BYTE_ORDER__) && __BYTE_ORDER__ == __ORDER_BIG_ENDIAN__"
        )?;
        writeln!(
            out,
            "#define TRIE_HASH_ONECHAR(c, s, l) (((uint64_t)(unsigned char)(c)) << ((l) - 8 - (s)))"
        )?;
        writeln!(out, "#else")?;
        writeln!(
            out,
            "#define TRIE_HASH_ONECHAR(c, s, l) (((uint64_t)(unsigned char)(c)) << (s))"
        )?;
        writeln!(out, "#endif")?;
        writeln!(out, "#endif")?;
        for &width in widths {
            let bits = width * 8;
            writeln!(
                out,
                "static inline uint{bits}_t {}_load{bits}(const char *p)",
                self.config.function_name
            )?;
            writeln!(out, "{{")?;
            writeln!(out, "{INDENT}uint{bits}_t v;")?;
            writeln!(out, "{INDENT}memcpy(&v, p, sizeof v);")?;
            writeln!(out, "{INDENT}return v;")?;
            writeln!(out, "}}")?;
        }
        Ok(())
    }

    fn chunk_expr(&self, offset: usize, width: usize, mode: DispatchMode) -> String {
        let load = if width == 1 {
            format!("string[{offset}]")
        } else {
            format!(
                "{}_load{}(string + {offset})",
                self.config.function_name,
                width * 8
            )
        };
        match mode {
            DispatchMode::Folded if width == 8 => format!("{load} | {:#x}ULL", fold_mask(width)),
            DispatchMode::Folded => format!("{load} | {:#x}", fold_mask(width)),
            DispatchMode::Exact | DispatchMode::CaseVariants => load,
        }
    }

    fn case_label(chunk: &[u8]) -> String {
        if chunk.len() == 1 {
            return char_literal(chunk[0]);
        }
        let bits = chunk.len() * 8;
        chunk
            .iter()
            .enumerate()
            .map(|(i, &b)| format!("TRIE_HASH_ONECHAR({}, {}, {bits})", char_literal(b), i * 8))
            .collect::<Vec<_>>()
            .join(" | ")
    }

    fn write_node(
        &self,
        out: &mut String,
        trie: &ByteTrie,
        id: NodeId,
        offset: usize,
        level: usize,
        ignore_case: bool,
    ) -> fmt::Result {
        let pad = INDENT.repeat(level);
        let node = trie.node(id);
        if node.is_leaf() {
            if let Some(terminal) = &node.terminal {
                writeln!(out, "{pad}return {};", self.enumerator(&terminal.label))?;
            }
            return Ok(());
        }

        let width = trie.children(id).next().map_or(1, |(key, _)| key.len());
        let mode = node_mode(trie, id, ignore_case);
        writeln!(out, "{pad}switch({}) {{", self.chunk_expr(offset, width, mode))?;
        for (key, child) in trie.children(id) {
            let labels = match mode {
                DispatchMode::Exact => vec![key.to_vec()],
                DispatchMode::Folded => vec![fold_chunk(key)],
                DispatchMode::CaseVariants => case_variants(key),
            };
            for label in &labels {
                writeln!(out, "{pad}case {}:", Self::case_label(label))?;
            }
            self.write_node(out, trie, child, offset + width, level + 1, ignore_case)?;
            if !trie.node(child).is_leaf() {
                writeln!(out, "{pad}{INDENT}break;")?;
            }
        }
        writeln!(out, "{pad}}}")
    }

    fn write_length_function(
        &self,
        out: &mut String,
        trie: &ByteTrie,
        length: usize,
        compiled: &CompiledSet,
    ) -> fmt::Result {
        writeln!(
            out,
            "static {} {}{length}(const char *string)",
            self.return_type(),
            self.config.function_name
        )?;
        writeln!(out, "{{")?;
        if trie.root().is_leaf() {
            writeln!(out, "{INDENT}(void) string;")?;
        }
        self.write_node(out, trie, ByteTrie::ROOT, 0, 1, compiled.ignore_case)?;
        if !trie.root().is_leaf() || trie.root().terminal.is_none() {
            writeln!(
                out,
                "{INDENT}return {};",
                self.enumerator(&compiled.fallback.label)
            )?;
        }
        writeln!(out, "}}")
    }

    fn write_entry_function(&self, out: &mut String, compiled: &CompiledSet) -> fmt::Result {
        let fallback = self.enumerator(&compiled.fallback.label);
        writeln!(
            out,
            "{}{} {}(const char *string, size_t length)",
            self.entry_storage(),
            self.return_type(),
            self.config.function_name
        )?;
        writeln!(out, "{{")?;
        if compiled.tries.is_empty() {
            writeln!(out, "{INDENT}(void) string;")?;
        }
        writeln!(out, "{INDENT}switch (length) {{")?;
        for length in compiled.lengths() {
            writeln!(out, "{INDENT}case {length}:")?;
            writeln!(
                out,
                "{INDENT}{INDENT}return {}{length}(string);",
                self.config.function_name
            )?;
        }
        writeln!(out, "{INDENT}default:")?;
        writeln!(out, "{INDENT}{INDENT}return {fallback};")?;
        writeln!(out, "{INDENT}}}")?;
        writeln!(out, "}}")
    }

    fn write_definitions(&self, out: &mut String, compiled: &CompiledSet) -> fmt::Result {
        if let Some(header) = &self.config.header_name {
            writeln!(out, "#include {}", quote_include(header))?;
        }
        let widths: BTreeSet<usize> = compiled
            .tries
            .values()
            .flat_map(|trie| trie.level_widths().into_iter().flatten())
            .filter(|&w| w > 1)
            .collect();
        if !widths.is_empty() {
            self.write_load_helpers(out, &widths)?;
        }

        self.open_namespace(out)?;
        for (&length, trie) in &compiled.tries {
            self.write_length_function(out, trie, length, compiled)?;
        }
        self.open_extern_c(out)?;
        self.write_entry_function(out, compiled)?;
        self.close_extern_c(out)?;
        self.close_namespace(out)?;

        if !self.is_split() {
            writeln!(out, "#endif")?;
        }
        Ok(())
    }
}

impl Emitter for CodeEmitter {
    fn emit(&self, compiled: &CompiledSet, table: &WordTable) -> Result<Generated, fmt::Error> {
        let mut generated = Generated::default();
        self.write_declarations(&mut generated.declarations, table)?;
        self.write_definitions(&mut generated.definitions, compiled)?;
        log::info!(
            "Generated {} lengths, {} bytes of code.",
            compiled.tries.len(),
            generated.declarations.len() + generated.definitions.len()
        );
        Ok(generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{compile, CompileConfig};

    fn colours() -> WordTable {
        let mut table = WordTable::new();
        table.push(b"Red", "Red".into(), Some(1)).unwrap();
        table.push(b"Green", "Green".into(), None).unwrap();
        table.push(b"Blue", "Blue".into(), Some(5)).unwrap();
        table.set_fallback(Some("Unknown".into()), -1);
        table
    }

    fn generate(table: &WordTable, compile_config: CompileConfig, config: EmitConfig) -> String {
        let compiled = compile(table, &compile_config).unwrap();
        let generated = CodeEmitter::new(config).emit(&compiled, table).unwrap();
        generated.declarations + &generated.definitions
    }

    #[test]
    fn emits_enumeration_and_length_dispatch() {
        let code = generate(&colours(), CompileConfig::default(), EmitConfig::default());
        assert!(code.contains("enum PerfectKey {\n    Red = 1,\n    Green = 2,\n    Blue = 5,\n    Unknown = -1,\n};"));
        assert!(code.contains("case 3:\n        return PerfectHash3(string);"));
        assert!(code.contains("case 4:\n        return PerfectHash4(string);"));
        assert!(code.contains("case 5:\n        return PerfectHash5(string);"));
        assert!(code.contains("default:\n        return Unknown;"));
        assert!(code.contains("return Green;"));
        assert!(code.starts_with("#ifndef TRIE_HASH_PerfectHash\n"));
        assert!(code.ends_with("#endif\n"));
    }

    #[test]
    fn breaks_after_nested_switches() {
        let code = generate(&colours(), CompileConfig::default(), EmitConfig::default());
        let expected = "\
static enum PerfectKey PerfectHash3(const char *string)
{
    switch(string[0]) {
    case 'R':
        switch(string[1]) {
        case 'e':
            switch(string[2]) {
            case 'd':
                return Red;
            }
            break;
        }
        break;
    }
    return Unknown;
}
";
        assert!(code.contains(expected), "{code}");
    }

    #[test]
    fn folds_letters_and_spells_out_ambiguous_bytes() {
        let mut table = WordTable::new();
        table.push(b"ab", "ab".into(), None).unwrap();
        table.push(b"-b", "dash_b".into(), None).unwrap();
        let config = CompileConfig {
            ignore_case: true,
            ..Default::default()
        };
        let code = generate(&table, config, EmitConfig::default());
        // root mixes '-' and 'a': no mask, explicit arms for both cases of 'a'
        assert!(code.contains("switch(string[0]) {\n    case '-':"));
        assert!(code.contains("    case 'A':\n    case 'a':\n"));
        // the second byte is a letter in every branch
        assert!(code.contains("switch(string[1] | 0x20) {"));
        assert!(!code.contains("switch(string[0] | 0x20)"));
    }

    #[test]
    fn multi_byte_reads_use_load_helpers() {
        let mut table = WordTable::new();
        table.push(b"Content", "Content".into(), None).unwrap();
        let config = CompileConfig {
            ignore_case: true,
            multi_byte: true,
            ..Default::default()
        };
        let code = generate(&table, config, EmitConfig::default());
        assert!(code.contains("static inline uint32_t PerfectHash_load32(const char *p)"));
        assert!(code.contains("switch(PerfectHash_load32(string + 0) | 0x20202020) {"));
        assert!(code.contains(
            "case TRIE_HASH_ONECHAR('c', 0, 32) | TRIE_HASH_ONECHAR('o', 8, 32) | TRIE_HASH_ONECHAR('n', 16, 32) | TRIE_HASH_ONECHAR('t', 24, 32):"
        ));
        assert!(code.contains("switch(PerfectHash_load16(string + 4) | 0x2020) {"));
        assert!(code.contains("switch(string[6] | 0x20) {"));
        assert!(!code.contains("PerfectHash_load64"));
    }

    #[test]
    fn split_output_includes_header() {
        let config = EmitConfig {
            header_name: Some("colours.h".into()),
            extern_c: true,
            counter_name: Some("ColourCount".into()),
            ..Default::default()
        };
        let compiled = compile(&colours(), &CompileConfig::default()).unwrap();
        let generated = CodeEmitter::new(config).emit(&compiled, &colours()).unwrap();
        assert!(generated.declarations.ends_with("#endif\n"));
        assert!(generated.declarations.contains("    ColourCount = 6,\n"));
        assert!(generated
            .declarations
            .contains("extern \"C\" {\n#endif\nenum PerfectKey PerfectHash(const char *string, size_t length);"));
        assert!(generated.definitions.starts_with("#include \"colours.h\"\n"));
        assert!(!generated.definitions.contains("#endif\n#endif"));
        assert!(!generated.definitions.contains("static enum PerfectKey PerfectHash("));
    }

    #[test]
    fn enum_class_qualifies_enumerators() {
        let config = EmitConfig {
            enum_class: true,
            namespace: Some("http".into()),
            enum_name: "Header".into(),
            includes: vec!["<cstddef>".into(), "extra.h".into()],
            ..Default::default()
        };
        let code = generate(&colours(), CompileConfig::default(), config);
        assert!(code.contains("namespace http {\nenum class Header {"));
        assert!(code.contains("return Header::Red;"));
        assert!(code.contains("return Header::Unknown;"));
        assert!(code.contains("static Header PerfectHash(const char *string, size_t length)"));
        assert!(code.contains("#include <cstddef>\n#include \"extra.h\"\n"));
        assert!(code.contains("} // namespace http"));
    }

    #[test]
    fn escapes_char_literals() {
        assert_eq!(char_literal(b'a'), "'a'");
        assert_eq!(char_literal(b'\''), "'\\''");
        assert_eq!(char_literal(b'\\'), "'\\\\'");
        assert_eq!(char_literal(0xe9), "'\\xe9'");
        assert_eq!(char_literal(b'\r'), "'\\x0d'");
    }

    #[test]
    fn empty_table_still_compiles_to_a_fallback() {
        let code = generate(&WordTable::new(), CompileConfig::default(), EmitConfig::default());
        assert!(code.contains("(void) string;"));
        assert!(code.contains("default:\n        return Unknown;"));
        assert!(code.contains("    Unknown = -1,\n"));
    }
}
