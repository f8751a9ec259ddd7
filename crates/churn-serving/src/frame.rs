//! Tabular view over a batch of request instances
//!
//! Columns take the key order of the first record. Every other record must
//! carry exactly the same keys (in any order); values are reordered to
//! match. Anything that does not fit a rectangular table of scalars is a
//! client input error.

use churn_common::FeatureRecord;
use serde_json::Value;
use thiserror::Error;

/// Why a batch of instances could not be laid out as a table
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    /// `instances` was an empty list
    #[error("instances must contain at least one record")]
    Empty,

    /// A record had no fields at all
    #[error("instance {row} has no features")]
    EmptyRecord {
        /// Zero-based row index
        row: usize,
    },

    /// A record's key set differs from the first record's
    #[error("instance {row} does not match the columns of instance 0: {detail}")]
    Ragged {
        /// Zero-based row index
        row: usize,
        /// Which keys were missing or unexpected
        detail: String,
    },

    /// A value was an array or object
    #[error("instance {row} feature '{column}' must be a scalar, got {kind}")]
    NonScalar {
        /// Zero-based row index
        row: usize,
        /// Feature name
        column: String,
        /// JSON kind that was found
        kind: &'static str,
    },
}

/// A single table cell
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    /// Numbers and booleans (true = 1, false = 0)
    Number(f64),
    /// Strings
    Text(String),
    /// JSON null
    Missing,
}

impl Cell {
    fn from_value(value: &Value, row: usize, column: &str) -> Result<Self, FrameError> {
        match value {
            Value::Null => Ok(Cell::Missing),
            Value::Bool(b) => Ok(Cell::Number(if *b { 1.0 } else { 0.0 })),
            // serde_json numbers without arbitrary_precision always fit f64
            Value::Number(n) => Ok(n.as_f64().map(Cell::Number).unwrap_or(Cell::Missing)),
            Value::String(s) => Ok(Cell::Text(s.clone())),
            Value::Array(_) => Err(FrameError::NonScalar {
                row,
                column: column.to_string(),
                kind: "array",
            }),
            Value::Object(_) => Err(FrameError::NonScalar {
                row,
                column: column.to_string(),
                kind: "object",
            }),
        }
    }

    /// Numeric value, parsing numeric strings
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(x) => Some(*x),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            Cell::Missing => None,
        }
    }
}

/// Row-major table with named columns
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    /// Lay out request instances as a table, preserving row order
    pub fn from_instances(instances: &[FeatureRecord]) -> Result<Self, FrameError> {
        let first = instances.first().ok_or(FrameError::Empty)?;
        if first.is_empty() {
            return Err(FrameError::EmptyRecord { row: 0 });
        }
        let columns: Vec<String> = first.keys().cloned().collect();

        let mut rows = Vec::with_capacity(instances.len());
        for (row, record) in instances.iter().enumerate() {
            if record.len() != columns.len() || columns.iter().any(|c| !record.contains_key(c)) {
                return Err(FrameError::Ragged {
                    row,
                    detail: describe_mismatch(&columns, record),
                });
            }

            let cells = columns
                .iter()
                .map(|column| Cell::from_value(&record[column.as_str()], row, column))
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(cells);
        }

        Ok(Self { columns, rows })
    }

    /// Column names in table order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Index of a named column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Number of rows
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Rows in input order
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }
}

fn describe_mismatch(columns: &[String], record: &FeatureRecord) -> String {
    let missing: Vec<&str> = columns
        .iter()
        .filter(|c| !record.contains_key(c.as_str()))
        .map(String::as_str)
        .collect();
    let unexpected: Vec<&str> = record
        .keys()
        .filter(|k| !columns.contains(k))
        .map(String::as_str)
        .collect();

    match (missing.is_empty(), unexpected.is_empty()) {
        (false, false) => format!(
            "missing [{}], unexpected [{}]",
            missing.join(", "),
            unexpected.join(", ")
        ),
        (false, true) => format!("missing [{}]", missing.join(", ")),
        (true, false) => format!("unexpected [{}]", unexpected.join(", ")),
        (true, true) => "column mismatch".to_string(),
    }
}
