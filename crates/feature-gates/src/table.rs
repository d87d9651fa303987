//! Markdown table extraction
//!
//! Only pipe tables are recognised: a header line, a separator line made of
//! dashes and colons, then zero or more data lines. Each line must start and
//! end with `|`. A table ends at the first line that is not a data line.

use std::collections::BTreeMap;
use thiserror::Error;

/// One data line, keyed by header cell.
pub type TableRow = BTreeMap<String, String>;

/// A pipe table as it appears in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Non-empty header cells, in column order
    pub headers: Vec<String>,
    /// Data lines split into trimmed cells
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Zip every data line against the headers by position.
    ///
    /// Short lines leave trailing headers out of the mapping; lines whose
    /// cells are all empty are skipped.
    pub fn into_rows(self) -> Vec<TableRow> {
        let headers = self.headers;
        self.rows
            .into_iter()
            .filter(|cells| cells.iter().any(|c| !c.is_empty()))
            .map(|cells| headers.iter().cloned().zip(cells).collect())
            .collect()
    }
}

/// Find every pipe table in `text`, in document order.
pub fn find_tables(text: &str) -> Vec<RawTable> {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let mut tables = Vec::new();
    let mut i = 0;

    while i + 1 < lines.len() {
        if !is_pipe_line(lines[i]) || !is_separator_line(lines[i + 1]) {
            i += 1;
            continue;
        }

        let headers: Vec<String> = split_cells(lines[i])
            .into_iter()
            .filter(|h| !h.is_empty())
            .collect();

        let mut rows = Vec::new();
        let mut j = i + 2;
        while j < lines.len() && is_pipe_line(lines[j]) {
            rows.push(split_cells(lines[j]));
            j += 1;
        }

        tables.push(RawTable { headers, rows });
        i = j;
    }

    tables
}

/// The document has fewer tables than a requested index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("table {index} not found (document has {found} tables)")]
pub struct MissingTable {
    pub index: usize,
    pub found: usize,
}

/// Extract the rows of the `index`-th table (zero based).
pub fn extract_table(text: &str, index: usize) -> Result<Vec<TableRow>, MissingTable> {
    Ok(extract_tables(text, &[index])?
        .into_iter()
        .next()
        .unwrap_or_default())
}

/// Extract several tables in one pass, in the order of `indices`.
///
/// Any missing index fails the whole extraction; callers treat that as a
/// change in the document's structure.
pub fn extract_tables(text: &str, indices: &[usize]) -> Result<Vec<Vec<TableRow>>, MissingTable> {
    let tables = find_tables(text);
    indices
        .iter()
        .map(|&index| {
            tables
                .get(index)
                .cloned()
                .map(RawTable::into_rows)
                .ok_or(MissingTable {
                    index,
                    found: tables.len(),
                })
        })
        .collect()
}

fn is_pipe_line(line: &str) -> bool {
    let line = line.trim_start();
    line.len() >= 2 && line.starts_with('|') && line.ends_with('|')
}

fn is_separator_line(line: &str) -> bool {
    is_pipe_line(line)
        && line.contains('-')
        && line
            .trim()
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

/// Split `| a | b |` into `["a", "b"]`, honouring `\|` escapes.
fn split_cells(line: &str) -> Vec<String> {
    let line = line.trim();
    let inner = &line[1..line.len() - 1];

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    cells.push(current);

    cells.into_iter().map(|c| c.trim().to_string()).collect()
}
