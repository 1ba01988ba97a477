//! Splits a line of admin input into words on ASCII whitespace.

/// Split `line` into whitespace-separated words, dropping any trailing
/// newline first. Empty input yields an empty vector.
pub fn split_words(line: &str) -> Vec<String> {
    line.trim_end_matches('\n')
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
