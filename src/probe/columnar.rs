//! Parser for whitespace-aligned command output (`top`, `ps`, `lsof`, ...).
//!
//! The header row is the first line containing both sentinel column names. Every
//! later non-blank line is split into at most as many tokens as there are columns,
//! so the last column keeps its embedded whitespace. Lines with too few tokens are
//! skipped.

use std::collections::HashMap;

/// One parsed row keyed by header column name.
pub type ColumnRecord = HashMap<String, String>;

/// Parse `output` into records. Returns an empty vector when no header is found.
pub fn parse_columnar(output: &str, sentinels: [&str; 2]) -> Vec<ColumnRecord> {
    let mut lines = output.lines();

    let header = lines.by_ref().find(|line| {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        sentinels.iter().all(|sentinel| tokens.contains(sentinel))
    });

    let columns: Vec<&str> = match header {
        Some(header) => header.split_whitespace().collect(),
        None => return Vec::new(),
    };

    lines
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let values = split_limited(line, columns.len());
            if values.len() < columns.len() {
                return None;
            }
            Some(
                columns
                    .iter()
                    .zip(values)
                    .map(|(column, value)| (column.to_string(), value.to_string()))
                    .collect(),
            )
        })
        .collect()
}

/// Split on whitespace into at most `limit` tokens; the last token holds the rest
/// of the line with its inner whitespace intact.
pub fn split_limited(line: &str, limit: usize) -> Vec<&str> {
    let mut tokens = Vec::with_capacity(limit);
    let mut rest = line.trim();

    while !rest.is_empty() && limit > 0 {
        if tokens.len() + 1 == limit {
            tokens.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                tokens.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                tokens.push(rest);
                break;
            }
        }
    }

    tokens
}
