//! Parses a client command line into a tree operation and renders the
//! outcome into a fixed-capacity response buffer.
//!
//! Grammar: `q <key>` (query), `a <key> <value>` (add), `d <key>` (delete).
//! Anything else yields `"malformed command"` rather than an `Error`: a bad
//! client command is a normal protocol outcome, not a control-plane fault.

use submerge_base::{err, Result};
use submerge_rowdb::{AddOutcome, DeleteOutcome, QueryOutcome, Tree};

pub fn interpret_command(
    cmd: &str,
    response: &mut String,
    capacity: usize,
    tree: &Tree,
) -> Result<()> {
    if capacity == 0 {
        return Err(err("response capacity must be at least 1"));
    }
    response.clear();

    let mut words = cmd.split_whitespace();
    let outcome = match words.next() {
        Some("q") => match (words.next(), words.next()) {
            (Some(key), None) => match tree.query(key) {
                QueryOutcome::Found(value) => value,
                QueryOutcome::NotFound => "key not found".to_string(),
            },
            _ => "malformed command".to_string(),
        },
        Some("a") => match (words.next(), words.next(), words.next()) {
            (Some(key), Some(value), None) => match tree.add(key, value) {
                AddOutcome::Ok => "ok".to_string(),
                AddOutcome::Exists => format!("key {key} already exists"),
            },
            _ => "malformed command".to_string(),
        },
        Some("d") => match (words.next(), words.next()) {
            (Some(key), None) => match tree.delete(key) {
                DeleteOutcome::Ok => "ok".to_string(),
                DeleteOutcome::NotFound => "key not found".to_string(),
            },
            _ => "malformed command".to_string(),
        },
        _ => "malformed command".to_string(),
    };

    truncate_into(&outcome, capacity, response);
    Ok(())
}

fn truncate_into(text: &str, capacity: usize, out: &mut String) {
    let max = capacity - 1;
    if text.len() <= max {
        out.push_str(text);
        return;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    out.push_str(&text[..end]);
}
