//! Predicate construction.
//!
//! Turns a [`FilterSelection`] into a `WHERE` condition over the base table
//! with numbered placeholders, plus the values to bind to them. Conditions
//! appear in a fixed order (date, segment, region, category) and set values
//! in sorted order, so equal selections always produce equal predicates.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Dimension, FilterError, FilterSelection};
use crate::sql::{quote_ident, SqlValue};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Base-table columns the filter dimensions apply to.
///
/// This is also the `[filters]` table of the settings file; keys left out
/// keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterColumns {
    pub date: String,
    pub segment: String,
    pub region: String,
    pub category: String,
}

impl Default for FilterColumns {
    fn default() -> Self {
        Self {
            date: "order_date".to_string(),
            segment: "segment".to_string(),
            region: "region".to_string(),
            category: "category".to_string(),
        }
    }
}

impl FilterColumns {
    pub fn column(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::Segment => &self.segment,
            Dimension::Region => &self.region,
            Dimension::Category => &self.category,
        }
    }

    /// Every column must be a bare identifier.
    pub fn validate(&self) -> Result<(), FilterError> {
        for (key, column) in [
            ("date", &self.date),
            ("segment", &self.segment),
            ("region", &self.region),
            ("category", &self.category),
        ] {
            if !IDENTIFIER.is_match(column) {
                return Err(FilterError::InvalidColumn {
                    key,
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }
}

/// A filter condition with its bound values.
///
/// Placeholder `?n` binds `params()[n - 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    conditions: Vec<String>,
    params: Vec<SqlValue>,
}

impl Predicate {
    /// Build the predicate for `filter`, numbering placeholders from `?1`.
    pub fn build(filter: &FilterSelection, columns: &FilterColumns) -> Self {
        let mut predicate = Predicate::default();

        let date = format!("date({})", quote_ident(&columns.date));
        match (filter.date_from(), filter.date_to()) {
            (Some(from), Some(to)) => {
                let from = predicate.bind(SqlValue::Date(from));
                let to = predicate.bind(SqlValue::Date(to));
                predicate
                    .conditions
                    .push(format!("{} BETWEEN {} AND {}", date, from, to));
            }
            (Some(from), None) => {
                let from = predicate.bind(SqlValue::Date(from));
                predicate.conditions.push(format!("{} >= {}", date, from));
            }
            (None, Some(to)) => {
                let to = predicate.bind(SqlValue::Date(to));
                predicate.conditions.push(format!("{} <= {}", date, to));
            }
            (None, None) => {}
        }

        for dimension in Dimension::ALL {
            let values = filter.values(dimension);
            if values.is_empty() {
                continue;
            }
            let placeholders: Vec<String> = values
                .iter()
                .map(|v| predicate.bind(SqlValue::text(v.as_str())))
                .collect();
            predicate.conditions.push(format!(
                "{} IN ({})",
                quote_ident(columns.column(dimension)),
                placeholders.join(", ")
            ));
        }

        predicate
    }

    fn bind(&mut self, value: SqlValue) -> String {
        self.params.push(value);
        format!("?{}", self.params.len())
    }

    /// True when the predicate restricts nothing.
    pub fn is_trivial(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn into_params(self) -> Vec<SqlValue> {
        self.params
    }

    /// The condition text; `TRUE` when nothing is restricted.
    pub fn to_sql(&self) -> String {
        if self.is_trivial() {
            "TRUE".to_string()
        } else {
            self.conditions.join(" AND ")
        }
    }

    /// `SELECT * FROM <table>` restricted by this predicate. A trivial
    /// predicate adds no `WHERE` clause.
    pub fn select_from(&self, table: &str) -> String {
        if self.is_trivial() {
            format!("SELECT * FROM {}", quote_ident(table))
        } else {
            format!("SELECT * FROM {} WHERE {}", quote_ident(table), self.to_sql())
        }
    }
}
