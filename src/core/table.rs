// src/core/table.rs

//! Renders decoded replies as aligned text tables for interactive use.

use crate::core::protocol::Response;
use serde_json::{Map, Value};
use std::io::{self, Write};

/// Cells longer than this are truncated with `...`.
pub const DEFAULT_CELL_WIDTH: usize = 60;

const NO_ROWS: &str = "(no rows)";

/// Formats a JSON value for a table cell. Strings are shown without quotes,
/// nested arrays and objects as compact JSON.
pub fn cell_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Shortens `s` to at most `max_len` characters, ending in `...` when cut.
/// A `max_len` of 0 means [`DEFAULT_CELL_WIDTH`].
pub fn truncate_cell(s: &str, max_len: usize) -> String {
    let max_len = if max_len == 0 {
        DEFAULT_CELL_WIDTH
    } else {
        max_len
    };
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return s.chars().take(max_len).collect();
    }
    let mut out: String = s.chars().take(max_len - 3).collect();
    out.push_str("...");
    out
}

/// Writes `rows` under `headers` as a bordered table:
///
/// ```text
/// +----+-------+
/// | id | value |
/// +----+-------+
/// | 1  | hello |
/// +----+-------+
/// ```
///
/// Missing cells render empty; cells beyond the header count are ignored.
pub fn render_table<W: Write>(
    headers: &[String],
    rows: &[Vec<String>],
    out: &mut W,
) -> io::Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let rule = {
        let parts: Vec<String> = widths.iter().map(|w| "-".repeat(w + 2)).collect();
        format!("+{}+", parts.join("+"))
    };
    let format_row = |cells: &[String]| {
        let parts: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                let pad = width - cell.chars().count();
                format!(" {cell}{} ", " ".repeat(pad))
            })
            .collect();
        format!("|{}|", parts.join("|"))
    };

    writeln!(out, "{rule}")?;
    writeln!(out, "{}", format_row(headers))?;
    writeln!(out, "{rule}")?;
    for row in rows {
        writeln!(out, "{}", format_row(row.as_slice()))?;
    }
    writeln!(out, "{rule}")
}

/// Writes a reply in the most useful shape for it:
/// - a `rows` array becomes one table row per record, columns sorted by name;
/// - a `found`/`row` lookup becomes a single-row table;
/// - anything else becomes a two-column `key | value` table.
///
/// Empty results print `(no rows)`.
pub fn render_response<W: Write>(res: &Response, out: &mut W) -> io::Result<()> {
    if let Some(rows) = res.rows() {
        let Some(first) = rows.first() else {
            return writeln!(out, "{NO_ROWS}");
        };
        let headers = sorted_keys(first.as_object());
        let body: Vec<Vec<String>> = rows
            .iter()
            .map(|row| record_cells(&headers, row.as_object()))
            .collect();
        return render_table(&headers, &body, out);
    }

    if let Some(found) = res.found() {
        if !found {
            return writeln!(out, "{NO_ROWS}");
        }
        let headers = sorted_keys(res.row());
        let body = vec![record_cells(&headers, res.row())];
        return render_table(&headers, &body, out);
    }

    let mut keys: Vec<&String> = res.fields().keys().collect();
    keys.sort();
    let body: Vec<Vec<String>> = keys
        .into_iter()
        .map(|key| {
            vec![
                key.clone(),
                truncate_cell(&cell_string(&res.fields()[key]), DEFAULT_CELL_WIDTH),
            ]
        })
        .collect();
    render_table(&["key".to_string(), "value".to_string()], &body, out)
}

fn sorted_keys(record: Option<&Map<String, Value>>) -> Vec<String> {
    let mut keys: Vec<String> = record
        .map(|r| r.keys().cloned().collect())
        .unwrap_or_default();
    keys.sort();
    keys
}

fn record_cells(headers: &[String], record: Option<&Map<String, Value>>) -> Vec<String> {
    headers
        .iter()
        .map(|h| {
            let value = record.and_then(|r| r.get(h)).unwrap_or(&Value::Null);
            truncate_cell(&cell_string(value), DEFAULT_CELL_WIDTH)
        })
        .collect()
}
