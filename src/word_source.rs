//! Reading word lists.
//!
//! One declaration per line:
//!
//! ```text
//! [label ~] word [= value]      an entry
//! [label ~] = value             the fallback
//! ```
//!
//! Blank lines are ignored. Anything else aborts the whole read, since a
//! skipped line would silently change the generated value space.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::word_table::{escape_label, is_identifier, WordTable};

/// Errors returned while reading a word list.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: invalid value {text:?}")]
    InvalidValue { line: usize, text: String },
    #[error("line {line}: {label:?} is not a valid identifier{hint}")]
    InvalidLabel {
        line: usize,
        label: String,
        hint: &'static str,
    },
    #[error("line {line}: no value left after i64::MAX; give the word an explicit value")]
    ValueOverflow { line: usize },
}

/// One parsed line of the word list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Entry {
        word: Vec<u8>,
        label: String,
        value: Option<i64>,
    },
    Fallback {
        label: Option<String>,
        value: i64,
    },
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Open a word list; `-` reads standard input and `.gz` files are decompressed.
pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead>, SourceError> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path)?;
    if is_gzip(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn split_once(text: &[u8], delimiter: u8) -> Option<(&[u8], &[u8])> {
    let at = text.iter().position(|&b| b == delimiter)?;
    Some((&text[..at], &text[at + 1..]))
}

fn parse_value(text: &[u8], line: usize) -> Result<i64, SourceError> {
    let invalid = || SourceError::InvalidValue {
        line,
        text: lossy(text),
    };
    let text = std::str::from_utf8(text).map_err(|_| invalid())?;
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).map_err(|_| invalid())?,
        None => digits.parse::<i64>().map_err(|_| invalid())?,
    };
    Ok(if negative { -magnitude } else { magnitude })
}

fn single_token<'a>(text: &'a [u8], line: usize, what: &str) -> Result<Option<&'a [u8]>, SourceError> {
    let mut tokens = text
        .split(|b| b.is_ascii_whitespace())
        .filter(|token| !token.is_empty());
    let first = tokens.next();
    if let Some(extra) = tokens.next() {
        return Err(SourceError::Syntax {
            line,
            message: format!("unexpected token {:?} after {what}", lossy(extra)),
        });
    }
    Ok(first)
}

/// Parse a single line. Returns `None` for blank lines.
///
/// Words are taken as raw bytes; only labels and values have to be ASCII.
pub fn parse_line(text: &[u8], line: usize) -> Result<Option<Declaration>, SourceError> {
    let text = text.trim_ascii();
    if text.is_empty() {
        return Ok(None);
    }

    let (label_part, rest) = match split_once(text, b'~') {
        Some((label, rest)) => (Some(label), rest),
        None => (None, text),
    };
    let (word_part, value_part) = match split_once(rest, b'=') {
        Some((word, value)) => (word, Some(value)),
        None => (rest, None),
    };
    if rest.contains(&b'~') || value_part.map_or(false, |v| v.contains(&b'=')) {
        return Err(SourceError::Syntax {
            line,
            message: "expected `[label ~] word [= value]`".to_string(),
        });
    }

    let label = match label_part {
        Some(part) => match single_token(part, line, "label")? {
            Some(label) => match std::str::from_utf8(label) {
                Ok(label) if is_identifier(label) => Some(label.to_string()),
                _ => {
                    return Err(SourceError::InvalidLabel {
                        line,
                        label: lossy(label),
                        hint: "",
                    })
                }
            },
            None => {
                return Err(SourceError::Syntax {
                    line,
                    message: "empty label before `~`".to_string(),
                })
            }
        },
        None => None,
    };
    let value = match value_part {
        Some(part) => match single_token(part, line, "value")? {
            Some(value) => Some(parse_value(value, line)?),
            None => {
                return Err(SourceError::Syntax {
                    line,
                    message: "missing value after `=`".to_string(),
                })
            }
        },
        None => None,
    };

    match single_token(word_part, line, "word")? {
        Some(word) => {
            let label = match label {
                Some(label) => label,
                None => {
                    let derived = escape_label(word);
                    if !is_identifier(&derived) {
                        return Err(SourceError::InvalidLabel {
                            line,
                            label: derived,
                            hint: "; give the word an explicit `label ~`",
                        });
                    }
                    derived
                }
            };
            Ok(Some(Declaration::Entry {
                word: word.to_vec(),
                label,
                value,
            }))
        }
        None => match value {
            Some(value) => Ok(Some(Declaration::Fallback { label, value })),
            None => Err(SourceError::Syntax {
                line,
                message: "expected a word or `= value`".to_string(),
            }),
        },
    }
}

/// Read a complete word table.
///
/// Lines are split on `\n` only, so words may hold any byte but newline;
/// a trailing `\r` is dropped with the surrounding whitespace.
pub fn read_word_table<R: BufRead>(reader: R) -> Result<WordTable, SourceError> {
    let mut table = WordTable::new();
    for (idx, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        let number = idx + 1;
        match parse_line(&line, number)? {
            Some(Declaration::Entry { word, label, value }) => {
                table
                    .push(&word, label, value)
                    .map_err(|_| SourceError::ValueOverflow { line: number })?;
            }
            Some(Declaration::Fallback { label, value }) => table.set_fallback(label, value),
            None => {}
        }
    }
    log::debug!(
        "read {} words, fallback {} = {}",
        table.len(),
        table.fallback().label,
        table.fallback().value
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_line_form() {
        assert_eq!(
            parse_line(b"Red = 1", 1).unwrap(),
            Some(Declaration::Entry {
                word: b"Red".to_vec(),
                label: "Red".into(),
                value: Some(1)
            })
        );
        assert_eq!(
            parse_line(b"  Green  ", 2).unwrap(),
            Some(Declaration::Entry {
                word: b"Green".to_vec(),
                label: "Green".into(),
                value: None
            })
        );
        assert_eq!(
            parse_line(b"ContentType ~ Content-Type = 0x10", 3).unwrap(),
            Some(Declaration::Entry {
                word: b"Content-Type".to_vec(),
                label: "ContentType".into(),
                value: Some(16)
            })
        );
        assert_eq!(
            parse_line(b"Unknown ~ = -1", 4).unwrap(),
            Some(Declaration::Fallback {
                label: Some("Unknown".into()),
                value: -1
            })
        );
        assert_eq!(
            parse_line(b"= 0", 5).unwrap(),
            Some(Declaration::Fallback {
                label: None,
                value: 0
            })
        );
        assert_eq!(parse_line(b"   ", 6).unwrap(), None);
    }

    #[test]
    fn derives_escaped_labels() {
        match parse_line(b"x-forwarded_for", 1).unwrap() {
            Some(Declaration::Entry { label, .. }) => assert_eq!(label, "x_forwarded__for"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(matches!(
            parse_line(b"two words", 7),
            Err(SourceError::Syntax { line: 7, .. })
        ));
        assert!(matches!(
            parse_line(b"word = ", 8),
            Err(SourceError::Syntax { line: 8, .. })
        ));
        assert!(matches!(
            parse_line(b"word = twelve", 9),
            Err(SourceError::InvalidValue { line: 9, .. })
        ));
        assert!(matches!(
            parse_line(b"a ~ b ~ c", 10),
            Err(SourceError::Syntax { line: 10, .. })
        ));
        assert!(matches!(
            parse_line(b"~", 11),
            Err(SourceError::Syntax { line: 11, .. })
        ));
        assert!(matches!(
            parse_line(b"1.0", 12),
            Err(SourceError::InvalidLabel { line: 12, .. })
        ));
        assert!(matches!(
            parse_line(b"bad-label! ~ word", 13),
            Err(SourceError::InvalidLabel { line: 13, .. })
        ));
    }

    #[test]
    fn reads_the_colour_example() {
        let input = "Red = 1\nGreen\nBlue = 5\nUnknown ~ = -1\n";
        let table = read_word_table(input.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.value_of("Green"), Some(2));
        assert_eq!(table.fallback().value, -1);
    }

    #[test]
    fn reports_the_failing_line_number() {
        let input = "Red\n\nbroken line here\n";
        let err = read_word_table(input.as_bytes()).unwrap_err();
        assert!(matches!(err, SourceError::Syntax { line: 3, .. }));
    }

    #[test]
    fn keeps_non_utf8_words_as_bytes() {
        let table = read_word_table(&b"Latin ~ caf\xe9\nOther\r\n"[..]).unwrap();
        assert_eq!(table.entries()[0].word, b"caf\xe9");
        assert_eq!(table.entries()[0].label, "Latin");
        assert_eq!(table.entries()[1].word, b"Other");
        assert_eq!(table.value_of("Other"), Some(1));
    }

    #[test]
    fn non_ascii_words_need_an_explicit_label() {
        let err = read_word_table(&b"plain\ncaf\xe9\n"[..]).unwrap_err();
        assert!(matches!(err, SourceError::InvalidLabel { line: 2, .. }), "{err}");
        assert!(matches!(
            parse_line(b"caf\xe9 ~ cafe", 1),
            Err(SourceError::InvalidLabel { line: 1, .. })
        ));
        assert!(matches!(
            parse_line(b"cafe = \xe9", 1),
            Err(SourceError::InvalidValue { line: 1, .. })
        ));
    }

    #[test]
    fn reports_counter_overflow_with_its_line() {
        let input = "top = 9223372036854775807\nnext\n";
        let err = read_word_table(input.as_bytes()).unwrap_err();
        assert!(matches!(err, SourceError::ValueOverflow { line: 2 }), "{err}");
    }

    #[test]
    fn reads_gzip_compressed_lists() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("words.txt.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(b"alpha\nbeta = 4\n").unwrap();
        encoder.finish().unwrap();

        let table = read_word_table(open_reader(&path).unwrap()).unwrap();
        assert_eq!(table.value_of("beta"), Some(4));
    }
}
