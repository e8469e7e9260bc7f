//! Typed query results.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::template::{ResultColumn, SemanticType};

/// One typed value in a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Text(String),
    Integer(i64),
    Decimal(f64),
    Date(NaiveDate),
    /// Stored as written by the query (e.g. `42.5` means 42.5%).
    Percentage(f64),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Numeric value of an integer, decimal or percentage cell.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Integer(i) => Some(*i as f64),
            Cell::Decimal(d) | Cell::Percentage(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The semantic type this cell satisfies, or `None` for `Null`.
    pub fn semantic_type(&self) -> Option<SemanticType> {
        match self {
            Cell::Null => None,
            Cell::Text(_) => Some(SemanticType::Text),
            Cell::Integer(_) => Some(SemanticType::Integer),
            Cell::Decimal(_) => Some(SemanticType::Decimal),
            Cell::Date(_) => Some(SemanticType::Date),
            Cell::Percentage(_) => Some(SemanticType::Percentage),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Decimal(d) => write!(f, "{}", d),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Cell::Percentage(p) => write!(f, "{}%", p),
        }
    }
}

/// Rows typed according to a template's result columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabularResult {
    pub columns: Vec<ResultColumn>,
    pub rows: Vec<Vec<Cell>>,
}

impl TabularResult {
    pub fn new(columns: Vec<ResultColumn>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by case-insensitive name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// All values of one column, top to bottom.
    pub fn column_values(&self, name: &str) -> Option<Vec<&Cell>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().filter_map(|row| row.get(index)).collect())
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(column, cell)| {
                        let value = serde_json::to_value(cell).unwrap_or(serde_json::Value::Null);
                        (column.name.clone(), value)
                    })
                    .collect()
            })
            .collect()
    }
}
