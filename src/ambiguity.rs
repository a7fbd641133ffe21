//! Case-folding safety analysis for the bit-OR trick.
//!
//! ASCII letters differ from their other case by exactly one bit (`0x20`), so
//! `b | 0x20` compares both cases of a letter at once. The trick is only sound
//! for bytes where the OR lands on the byte's own lowercase form and no other
//! byte lands there too. For example `'-' | 0x20 == '-'`, but so does
//! `'\r' | 0x20`, so `'-'` must never be compared through the mask.

/// The bit that separates ASCII upper and lower case.
pub const CASE_BIT: u8 = 0x20;

const fn build_unambiguous_table() -> [bool; 256] {
    let mut table = [false; 256];
    let mut b = 0usize;
    while b < 256 {
        let byte = b as u8;
        let lower = byte.to_ascii_lowercase();
        let mut safe = byte | CASE_BIT == lower;
        let mut c = 0usize;
        while safe && c < 256 {
            let other = c as u8;
            if other != byte && other | CASE_BIT == lower && other.to_ascii_lowercase() != lower {
                safe = false;
            }
            c += 1;
        }
        table[b] = safe;
        b += 1;
    }
    table
}

static UNAMBIGUOUS: [bool; 256] = build_unambiguous_table();

/// Whether `b | CASE_BIT` is a sound case-insensitive comparison for `b`.
#[inline]
pub fn is_unambiguous(b: u8) -> bool {
    UNAMBIGUOUS[b as usize]
}

/// A chunk is unambiguous iff every byte in it is.
pub fn chunk_is_unambiguous(chunk: &[u8]) -> bool {
    chunk.iter().all(|&b| is_unambiguous(b))
}

/// Offset of the first byte for which the OR trick is unsafe.
pub fn first_ambiguous(chunk: &[u8]) -> Option<usize> {
    chunk.iter().position(|&b| !is_unambiguous(b))
}

/// Largest power of two not exceeding `min(remaining, max_width)`, never below 1.
pub fn alignment(remaining: usize, max_width: usize) -> usize {
    let limit = remaining.min(max_width).max(1);
    1 << (usize::BITS - 1 - limit.leading_zeros())
}

/// Earliest safe chunk boundary for `key`.
///
/// Without case folding this is just the aligned width of the key. With it,
/// the chunk must end before the first ambiguous byte, and an ambiguous byte
/// at offset zero gets a chunk of its own.
pub fn split_point(key: &[u8], max_width: usize, ignore_case: bool) -> usize {
    let safe_len = if ignore_case {
        first_ambiguous(key).unwrap_or(key.len())
    } else {
        key.len()
    };
    alignment(safe_len, max_width)
}

/// How a dispatch node compares the input chunk against its child keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Byte-exact comparison.
    Exact,
    /// `chunk | mask` against the lowercase key, one arm per child.
    Folded,
    /// Exact comparison, with one arm per upper/lower permutation of the key.
    CaseVariants,
}

/// Pick the dispatch mode for a node with the given child keys.
pub fn dispatch_mode<'a, I>(keys: I, ignore_case: bool) -> DispatchMode
where
    I: IntoIterator<Item = &'a [u8]>,
{
    if !ignore_case {
        return DispatchMode::Exact;
    }
    if keys.into_iter().all(chunk_is_unambiguous) {
        DispatchMode::Folded
    } else {
        DispatchMode::CaseVariants
    }
}

/// The fold mask for a chunk of `width` bytes, e.g. `0x2020` for two bytes.
pub fn fold_mask(width: usize) -> u64 {
    (0..width).fold(0u64, |mask, i| mask | (u64::from(CASE_BIT) << (8 * i)))
}

/// Apply the bit-OR fold to every byte of a chunk.
pub fn fold_chunk(chunk: &[u8]) -> Vec<u8> {
    chunk.iter().map(|&b| b | CASE_BIT).collect()
}

/// Every upper/lower permutation of the letters in `key`, in ascending byte order.
pub fn case_variants(key: &[u8]) -> Vec<Vec<u8>> {
    let mut variants: Vec<Vec<u8>> = vec![Vec::with_capacity(key.len())];
    for &b in key {
        if b.is_ascii_alphabetic() {
            let (upper, lower) = (b.to_ascii_uppercase(), b.to_ascii_lowercase());
            variants = variants
                .into_iter()
                .flat_map(|prefix| {
                    let mut with_upper = prefix.clone();
                    with_upper.push(upper);
                    let mut with_lower = prefix;
                    with_lower.push(lower);
                    [with_upper, with_lower]
                })
                .collect();
        } else {
            for variant in &mut variants {
                variant.push(b);
            }
        }
    }
    variants.sort();
    variants
}
