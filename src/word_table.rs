//! Word table: the ordered `(word, label, value)` entries a hash is compiled from.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

/// Label used for the fallback when the input declares none.
pub const DEFAULT_FALLBACK_LABEL: &str = "Unknown";

/// Value used for the fallback when the input declares none.
pub const DEFAULT_FALLBACK_VALUE: i64 = -1;

/// A single word and the enumerator it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    #[serde(serialize_with = "serialize_bytes_lossy")]
    pub word: Vec<u8>,
    pub label: String,
    pub value: i64,
}

/// Result for inputs that match no word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fallback {
    pub label: String,
    pub value: i64,
}

impl Default for Fallback {
    fn default() -> Self {
        Self {
            label: DEFAULT_FALLBACK_LABEL.to_string(),
            value: DEFAULT_FALLBACK_VALUE,
        }
    }
}

/// Raised when an entry needs an automatic value but the counter already
/// handed out (or observed) `i64::MAX`.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no value left for an entry without an explicit value; the counter passed i64::MAX")]
pub struct ValueOverflow;

/// Source of values for entries without an explicit one. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    /// `None` once `i64::MAX` is taken.
    next: Option<i64>,
}

impl Default for Counter {
    fn default() -> Self {
        Self { next: Some(0) }
    }
}

impl Counter {
    /// Record an explicit value; the next assigned value will be greater.
    pub fn observe(&mut self, value: i64) {
        self.next = match (self.next, value.checked_add(1)) {
            (Some(next), Some(after)) => Some(next.max(after)),
            _ => None,
        };
    }

    /// Hand out the next value.
    pub fn assign(&mut self) -> Result<i64, ValueOverflow> {
        let value = self.next.ok_or(ValueOverflow)?;
        self.next = value.checked_add(1);
        Ok(value)
    }

    pub fn peek(&self) -> Option<i64> {
        self.next
    }
}

/// Ordered collection of entries plus the fallback.
///
/// Labels behave like map keys: declaring a label again updates its value for
/// every entry carrying it. Words behave the same way: a repeated word keeps
/// only its latest label and value.
#[derive(Debug, Clone, Default)]
pub struct WordTable {
    entries: Vec<Entry>,
    word_index: HashMap<Vec<u8>, usize>,
    labels: Vec<(String, i64)>,
    label_index: HashMap<String, usize>,
    fallback: Fallback,
    counter: Counter,
}

impl WordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a word. Returns the value the entry ended up with.
    pub fn push(
        &mut self,
        word: &[u8],
        label: String,
        value: Option<i64>,
    ) -> Result<i64, ValueOverflow> {
        let value = match value {
            Some(explicit) => {
                self.counter.observe(explicit);
                explicit
            }
            None => self.counter.assign()?,
        };
        self.define_label(&label, value);

        let entry = Entry {
            word: word.to_vec(),
            label,
            value,
        };
        match self.word_index.get(word) {
            Some(&idx) => {
                log::warn!(
                    "word {:?} declared twice; {} replaces {}",
                    String::from_utf8_lossy(word),
                    entry.label,
                    self.entries[idx].label
                );
                self.entries[idx] = entry;
            }
            None => {
                self.word_index.insert(word.to_vec(), self.entries.len());
                self.entries.push(entry);
            }
        }
        Ok(value)
    }

    /// Declare the fallback result. The value seeds the counter like any explicit value.
    pub fn set_fallback(&mut self, label: Option<String>, value: i64) {
        let label = label.unwrap_or_else(|| self.fallback.label.clone());
        self.counter.observe(value);
        self.define_label(&label, value);
        self.fallback = Fallback { label, value };
    }

    fn define_label(&mut self, label: &str, value: i64) {
        match self.label_index.get(label) {
            Some(&idx) => {
                if self.labels[idx].1 != value {
                    log::warn!(
                        "label {} redefined from {} to {}",
                        label,
                        self.labels[idx].1,
                        value
                    );
                }
                self.labels[idx].1 = value;
                for entry in self.entries.iter_mut().filter(|e| e.label == label) {
                    entry.value = value;
                }
                if self.fallback.label == label {
                    self.fallback.value = value;
                }
            }
            None => {
                self.label_index.insert(label.to_string(), self.labels.len());
                self.labels.push((label.to_string(), value));
            }
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn fallback(&self) -> &Fallback {
        &self.fallback
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Look up the current value of a label.
    pub fn value_of(&self, label: &str) -> Option<i64> {
        self.label_index.get(label).map(|&idx| self.labels[idx].1)
    }

    /// All enumerators in declaration order, the fallback included exactly once.
    ///
    /// An implicit fallback is listed last.
    pub fn enumeration(&self) -> Vec<(String, i64)> {
        let mut labels = self.labels.clone();
        if !self.label_index.contains_key(&self.fallback.label) {
            labels.push((self.fallback.label.clone(), self.fallback.value));
        }
        labels
    }

    /// Largest value in the enumeration.
    pub fn max_value(&self) -> i64 {
        self.enumeration()
            .iter()
            .map(|(_, value)| *value)
            .max()
            .unwrap_or(self.fallback.value)
    }

    /// Distinct word lengths, ascending.
    pub fn lengths(&self) -> BTreeSet<usize> {
        self.entries.iter().map(|e| e.word.len()).collect()
    }

    /// Pairs of distinct words that are equal ignoring ASCII case.
    pub fn case_collisions(&self) -> Vec<(&Entry, &Entry)> {
        let mut seen: HashMap<Vec<u8>, &Entry> = HashMap::new();
        let mut collisions = Vec::new();
        for entry in &self.entries {
            let folded = entry.word.to_ascii_lowercase();
            if let Some(first) = seen.get(&folded) {
                collisions.push((*first, entry));
            } else {
                seen.insert(folded, entry);
            }
        }
        collisions
    }
}

/// Default label for a word: `_` becomes `__`, then `-` becomes `_`.
pub fn escape_label(word: &[u8]) -> String {
    let mut label = String::with_capacity(word.len());
    for &b in word {
        match b {
            b'_' => label.push_str("__"),
            b'-' => label.push('_'),
            other => label.push(other as char),
        }
    }
    label
}

/// ASCII identifier check used for every generated name.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn serialize_bytes_lossy<S: serde::Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}
