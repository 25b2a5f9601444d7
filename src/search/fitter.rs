//! Fits search records under the index's per-record byte ceiling.
//!
//! The index rejects records whose JSON encoding exceeds a fixed size. A record
//! that is too large has its `parsed_content` shortened from the end, in steps
//! of at least 10% (or 100 characters), until it fits. Every other field is
//! written verbatim. When the fixed fields alone are already over the ceiling
//! the content is cut down to nothing and the record is returned oversized;
//! callers log that case and attempt the write anyway.

use serde::Serialize;
use std::io;

use crate::search::record::SearchRecord;

/// Per-record size ceiling of the hosted index, in bytes.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 100_000;

/// Suffix appended to shortened content.
pub const TRUNCATION_MARKER: &str = "...";

/// Smallest number of characters removed per iteration.
const MIN_REDUCTION_CHARS: usize = 100;

/// A fitted record plus what the fitter observed while producing it.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub record: SearchRecord,
    /// `true` when `parsed_content` was shortened.
    pub truncated: bool,
    /// Size of the returned record's JSON encoding.
    pub serialized_bytes: usize,
    pub max_bytes: usize,
}

impl FitOutcome {
    pub fn within_budget(&self) -> bool {
        self.serialized_bytes <= self.max_bytes
    }
}

/// Shorten `record.parsed_content` until the record serializes to at most
/// `max_bytes` bytes, or the content is empty.
///
/// Records already within budget come back untouched.
pub fn fit(mut record: SearchRecord, max_bytes: usize) -> FitOutcome {
    let mut size = serialized_len(&record);
    if size <= max_bytes || record.parsed_content.is_empty() {
        return FitOutcome {
            record,
            truncated: false,
            serialized_bytes: size,
            max_bytes,
        };
    }

    let original = std::mem::take(&mut record.parsed_content);
    let mut kept = original.chars().count();

    while size > max_bytes && kept > 0 {
        kept = next_cut(&original, kept);
        record.parsed_content = shortened(&original, kept);
        size = serialized_len(&record);
    }

    FitOutcome {
        record,
        truncated: true,
        serialized_bytes: size,
        max_bytes,
    }
}

/// Number of characters to keep after one more reduction step.
///
/// Always strictly less than `kept`.
fn next_cut(text: &str, kept: usize) -> usize {
    let reduction = (kept / 10).max(MIN_REDUCTION_CHARS);
    let cut = kept.saturating_sub(reduction);
    if cut == 0 {
        return 0;
    }

    let cut_byte = byte_offset(text, cut);
    if text[cut_byte..].starts_with(char::is_whitespace) {
        return cut;
    }

    let prefix = &text[..cut_byte];
    let Some((ws_byte, _)) = prefix.char_indices().rev().find(|(_, c)| c.is_whitespace()) else {
        return cut;
    };

    // Snap back to the word boundary only if it sits in the last 20% of the cut.
    let ws_chars = prefix[..ws_byte].chars().count();
    if ws_chars * 5 >= cut * 4 {
        ws_chars
    } else {
        cut
    }
}

/// The first `kept` characters of `text` followed by the marker, or an empty
/// string when nothing printable is left.
fn shortened(text: &str, kept: usize) -> String {
    let prefix = text[..byte_offset(text, kept)].trim_end();
    if prefix.is_empty() {
        String::new()
    } else {
        format!("{prefix}{TRUNCATION_MARKER}")
    }
}

/// Byte index of the `chars`-th character, or the length when out of range.
fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(idx, _)| idx)
}

/// Counts bytes written without buffering them.
struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Length in bytes of the JSON encoding of `value`.
///
/// A value that fails to serialize is reported as `usize::MAX`, i.e. never
/// within any budget.
pub fn serialized_len<T: Serialize>(value: &T) -> usize {
    let mut counter = ByteCounter(0);
    match serde_json::to_writer(&mut counter, value) {
        Ok(()) => counter.0,
        Err(_) => usize::MAX,
    }
}
