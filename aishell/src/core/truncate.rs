//! Output normalization before command output enters the transcript.

/// Marker placed before the retained suffix of truncated output.
pub const TRUNCATION_MARKER: &str = "\n[...output truncated...]\n";

/// Default ceiling, in characters.
pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 12_000;

/// Keep at most `max_chars` trailing characters of `output`.
///
/// When anything is dropped the result is [`TRUNCATION_MARKER`] followed by the
/// last `max_chars` characters. Returns the text and whether it was truncated.
pub fn truncate_output(output: &str, max_chars: usize) -> (String, bool) {
    let total = output.chars().count();
    if total <= max_chars {
        return (output.to_string(), false);
    }
    (mark_truncated(tail_chars(output, max_chars)), true)
}

/// Prefix already-shortened output with the marker.
pub fn mark_truncated(tail: &str) -> String {
    let mut buf = String::with_capacity(TRUNCATION_MARKER.len() + tail.len());
    buf.push_str(TRUNCATION_MARKER);
    buf.push_str(tail);
    buf
}

/// The last `n` characters of `s`.
pub fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
