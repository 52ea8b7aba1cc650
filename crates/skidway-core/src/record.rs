//! Tabular row model shared by the sheet and feature-service sides.
//!
//! A [`RowSet`] is an ordered header plus loosely typed rows, the common
//! denominator of a spreadsheet tab (`values.get` returns a ragged array
//! of JSON scalars) and a feature query (attributes keyed by field name).

use serde_json::Value;
use std::collections::HashMap;

/// An ordered header and the rows beneath it.
///
/// Rows may be ragged (shorter than the header); missing cells read as
/// `Null`. Column lookup is by exact header name.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    header: Vec<String>,
    rows: Vec<Vec<Value>>,
    index: HashMap<String, usize>,
}

impl RowSet {
    /// Build a row set from a header and data rows.
    pub fn new(header: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let index = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            header,
            rows,
            index,
        }
    }

    /// Build a row set from raw sheet values, treating the first row as
    /// the header. Header cells are stringified; an empty input yields an
    /// empty set.
    pub fn from_values(mut values: Vec<Vec<Value>>) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let header = values
            .remove(0)
            .into_iter()
            .map(|cell| cell_to_string(&cell).unwrap_or_default())
            .collect();
        Self::new(header, values)
    }

    /// The column header, in order.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by header name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Cell at `(row, column name)`. `None` if the column is unknown;
    /// `Null` if the row is shorter than the header.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        static NULL: Value = Value::Null;
        let col = self.column_index(column)?;
        let row = self.rows.get(row)?;
        Some(row.get(col).unwrap_or(&NULL))
    }

    /// Raw data rows.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// String form of the cell at `(row, column)`, `None` when the cell
    /// is null, blank, or the column unknown.
    pub fn text(&self, row: usize, column: &str) -> Option<String> {
        self.cell(row, column).and_then(cell_to_string)
    }
}

/// Coerce a cell to a non-empty string.
///
/// Numbers are rendered without a trailing `.0` so that sheet-side numeric
/// identifiers compare equal to their feature-service string form.
pub fn cell_to_string(cell: &Value) -> Option<String> {
    match cell {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else {
                n.as_f64().map(|f| {
                    if f.fract() == 0.0 && f.abs() < 1e15 {
                        format!("{}", f as i64)
                    } else {
                        f.to_string()
                    }
                })
            }
        }
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Coerce a cell to a float. Blank and null cells are `None`; strings are
/// parsed after trimming.
pub fn cell_to_f64(cell: &Value) -> Option<f64> {
    match cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Coerce a cell to an integer, accepting integral floats (`"84115.0"`).
pub fn cell_to_i64(cell: &Value) -> Option<i64> {
    match cell {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        }
        _ => None,
    }
}
