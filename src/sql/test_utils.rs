//! Test utilities for composed statement validation.
//!
//! Composed statements are re-parsed with sqlparser-rs to check that the
//! rewrite produced syntactically valid SQLite.

use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

/// Validates that a SQL string parses as SQLite.
pub fn validate_sql(sql: &str) -> Result<(), String> {
    Parser::parse_sql(&SQLiteDialect {}, sql)
        .map(|_| ())
        .map_err(|e| format!("Invalid SQL: {}\nSQL: {}", e, sql))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_sql() {
        validate_sql("SELECT * FROM sales").unwrap();
        validate_sql("WITH filtered_base AS (SELECT * FROM sales WHERE region IN (?1, ?2)) SELECT COUNT(*) FROM filtered_base").unwrap();
    }

    #[test]
    fn test_validate_invalid_sql() {
        assert!(validate_sql("SELEC * FORM sales").is_err());
    }
}
