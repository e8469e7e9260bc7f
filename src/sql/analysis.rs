//! Structural inspection of template bodies.
//!
//! Templates are parsed with the SQLite dialect of `sqlparser` and inspected
//! on the syntax tree, never by searching the SQL text. The functions here
//! answer the questions the registry and the composer ask before touching a
//! template:
//!
//! - is the body exactly one query?
//! - does the outermost query read from the declared base table?
//! - which CTE names does the body define, at any depth?
//! - which placeholders does it use?

use std::ops::ControlFlow;

use sqlparser::ast::{
    Cte, Expr, Ident, ObjectName, Query, SetExpr, Statement, TableFactor, TableWithJoins, Value,
    Visit, Visitor,
};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::{Parser, ParserError};

/// Errors raised while parsing a template body.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("SQL parse error: {0}")]
    Parse(#[from] ParserError),

    #[error("body is empty")]
    Empty,

    #[error("body contains more than one statement")]
    MultipleStatements,

    #[error("body is not a query")]
    NotAQuery,
}

/// Parse `sql` as exactly one query statement.
pub fn parse_query(sql: &str) -> Result<Query, AnalysisError> {
    let statements = Parser::parse_sql(&SQLiteDialect {}, sql)?;
    let mut statements = statements.into_iter();

    match (statements.next(), statements.next()) {
        (Some(Statement::Query(query)), None) => Ok(*query),
        (Some(_), Some(_)) => Err(AnalysisError::MultipleStatements),
        (Some(_), None) => Err(AnalysisError::NotAQuery),
        (None, _) => Err(AnalysisError::Empty),
    }
}

/// The single identifier of an unqualified object name.
pub fn single_ident(name: &ObjectName) -> Option<&Ident> {
    match name.0.as_slice() {
        [ident] => Some(ident),
        _ => None,
    }
}

/// SQLite resolves unquoted and quoted identifiers case-insensitively.
pub fn ident_matches(ident: &Ident, name: &str) -> bool {
    ident.value.eq_ignore_ascii_case(name)
}

// =============================================================================
// Top-level source resolution
// =============================================================================

/// Does the outermost query read from `base`?
///
/// A reference counts as top-level when it sits in the outermost `FROM` or
/// `JOIN` list, inside a derived table in that list, or inside a CTE of the
/// query that the outermost `FROM` reads from. References that only occur
/// in expression subqueries (scalar ratios, `IN`, `EXISTS`) do not count.
pub fn reads_from_base(query: &Query, base: &str) -> bool {
    let mut visited = Vec::new();
    query_reads(query, base, &[], &mut visited)
}

fn query_reads<'a>(
    query: &'a Query,
    base: &str,
    outer: &[&'a Cte],
    visited: &mut Vec<String>,
) -> bool {
    let mut scope: Vec<&'a Cte> = outer.to_vec();
    if let Some(with) = &query.with {
        scope.extend(with.cte_tables.iter());
    }
    set_expr_reads(&query.body, base, &scope, visited)
}

fn set_expr_reads<'a>(
    body: &'a SetExpr,
    base: &str,
    scope: &[&'a Cte],
    visited: &mut Vec<String>,
) -> bool {
    match body {
        SetExpr::Select(select) => select
            .from
            .iter()
            .any(|table| table_with_joins_reads(table, base, scope, visited)),
        SetExpr::Query(query) => query_reads(query, base, scope, visited),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_reads(left, base, scope, visited)
                || set_expr_reads(right, base, scope, visited)
        }
        _ => false,
    }
}

fn table_with_joins_reads<'a>(
    table: &'a TableWithJoins,
    base: &str,
    scope: &[&'a Cte],
    visited: &mut Vec<String>,
) -> bool {
    factor_reads(&table.relation, base, scope, visited)
        || table
            .joins
            .iter()
            .any(|join| factor_reads(&join.relation, base, scope, visited))
}

fn factor_reads<'a>(
    factor: &'a TableFactor,
    base: &str,
    scope: &[&'a Cte],
    visited: &mut Vec<String>,
) -> bool {
    match factor {
        TableFactor::Table { name, .. } => {
            let Some(ident) = single_ident(name) else {
                return false;
            };
            if ident_matches(ident, base) {
                return true;
            }
            let key = ident.value.to_ascii_lowercase();
            if visited.contains(&key) {
                return false;
            }
            match scope
                .iter()
                .find(|cte| ident_matches(&cte.alias.name, &ident.value))
            {
                Some(&cte) => {
                    visited.push(key);
                    query_reads(&cte.query, base, scope, visited)
                }
                None => false,
            }
        }
        TableFactor::Derived { subquery, .. } => query_reads(subquery, base, scope, visited),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => table_with_joins_reads(table_with_joins, base, scope, visited),
        _ => false,
    }
}

// =============================================================================
// Whole-tree collectors
// =============================================================================

#[derive(Default)]
struct CteNames {
    names: Vec<String>,
}

impl Visitor for CteNames {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(with) = &query.with {
            self.names
                .extend(with.cte_tables.iter().map(|cte| cte.alias.name.value.clone()));
        }
        ControlFlow::Continue(())
    }
}

/// Names of every CTE defined anywhere in the query, outermost first.
pub fn cte_names(query: &Query) -> Vec<String> {
    let mut collector = CteNames::default();
    let _ = query.visit(&mut collector);
    collector.names
}

#[derive(Default)]
struct Placeholders {
    found: Vec<String>,
}

impl Visitor for Placeholders {
    type Break = ();

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        if let Expr::Value(Value::Placeholder(placeholder)) = expr {
            if !self.found.contains(placeholder) {
                self.found.push(placeholder.clone());
            }
        }
        ControlFlow::Continue(())
    }
}

/// Distinct placeholders in order of first appearance (e.g. `:top_n`, `?`).
pub fn placeholders(query: &Query) -> Vec<String> {
    let mut collector = Placeholders::default();
    let _ = query.visit(&mut collector);
    collector.found
}
