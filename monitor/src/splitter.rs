//! Line splitting across poll boundaries.
//!
//! A poll fetches an arbitrary byte range, so its last line is usually
//! incomplete. [`split`] joins the carried-over tail with the new bytes,
//! cuts on `\n`, and hands back the unterminated remainder to be carried
//! into the next poll. Splitting happens on bytes, before UTF-8 decoding,
//! so a multi-byte character straddling a range edge is never mangled.

/// Longest unterminated tail carried between polls.
pub const MAX_PARTIAL_BYTES: usize = 64 * 1024;

/// Output of [`split`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    /// Complete, trimmed, non-empty lines in file order.
    pub lines: Vec<String>,

    /// Bytes after the last line terminator (possibly empty).
    pub partial: Vec<u8>,
}

/// Splits `partial ++ new_bytes` into complete lines and a new partial tail.
#[must_use]
pub fn split(partial: &[u8], new_bytes: &[u8]) -> Split {
    let mut buffer = Vec::with_capacity(partial.len() + new_bytes.len());
    buffer.extend_from_slice(partial);
    buffer.extend_from_slice(new_bytes);

    let mut segments: Vec<&[u8]> = buffer.split(|b| *b == b'\n').collect();
    // `split` always yields at least one segment; the last one is the tail.
    let tail = segments.pop().unwrap_or_default().to_vec();

    let lines = segments.into_iter().filter_map(clean_line).collect();

    Split {
        lines,
        partial: tail,
    }
}

/// Cuts `partial` down to `max` bytes, returning how many were dropped.
///
/// The head of the line is kept, so a timestamp prefix survives.
pub fn cap_partial(partial: &mut Vec<u8>, max: usize) -> usize {
    let excess = partial.len().saturating_sub(max);
    partial.truncate(max.min(partial.len()));
    excess
}

/// Decodes one raw line, stripping a byte-order mark and surrounding
/// whitespace (including a trailing `\r`). Empty results are dropped.
fn clean_line(raw: &[u8]) -> Option<String> {
    let decoded = String::from_utf8_lossy(raw);
    let trimmed = decoded.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
