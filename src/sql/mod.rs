//! SQL support shared by the registry, the composer and the gateway.
//!
//! - [`analysis`] - parsing and structural inspection of template bodies
//! - [`value`] - bound parameter values

pub mod analysis;
pub mod value;

#[cfg(test)]
pub mod test_utils;

pub use analysis::{parse_query, AnalysisError};
pub use value::SqlValue;

/// Quote an identifier for SQLite using double quotes, doubling any
/// embedded quote character.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
