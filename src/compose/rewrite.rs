//! Mutable tree walk that points a template at the staging relation.

use std::collections::HashMap;
use std::ops::ControlFlow;

use sqlparser::ast::{
    Expr, Ident, ObjectName, Query, TableAlias, TableFactor, Value, VisitMut, VisitorMut,
};

use super::{ComposeError, STAGING_RELATION};
use crate::sql::analysis::{ident_matches, single_ident};

/// Redirects base-table references and numbers slot placeholders.
///
/// Every `TableFactor::Table` naming the base (outer query, joins, derived
/// tables, CTE bodies, expression subqueries) becomes `filtered_base`. A
/// reference without an alias takes the base name as its alias so qualified
/// columns keep resolving. `:slot` placeholders become `?n`.
pub(crate) struct BaseRewriter<'a> {
    base: &'a str,
    slots: &'a HashMap<String, usize>,
    rewritten: usize,
}

impl<'a> BaseRewriter<'a> {
    pub(crate) fn new(base: &'a str, slots: &'a HashMap<String, usize>) -> Self {
        Self {
            base,
            slots,
            rewritten: 0,
        }
    }

    /// Rewrite `query` in place, returning how many base references moved.
    pub(crate) fn rewrite(mut self, query: &mut Query) -> Result<usize, ComposeError> {
        match query.visit(&mut self) {
            ControlFlow::Continue(()) => Ok(self.rewritten),
            ControlFlow::Break(err) => Err(err),
        }
    }
}

impl VisitorMut for BaseRewriter<'_> {
    type Break = ComposeError;

    fn pre_visit_table_factor(&mut self, factor: &mut TableFactor) -> ControlFlow<Self::Break> {
        let TableFactor::Table { name, alias, .. } = factor else {
            return ControlFlow::Continue(());
        };

        match single_ident(name).cloned() {
            Some(ident) if ident_matches(&ident, self.base) => {
                *name = ObjectName(vec![Ident::new(STAGING_RELATION)]);
                if alias.is_none() {
                    *alias = Some(TableAlias {
                        name: ident,
                        columns: Vec::new(),
                    });
                }
                self.rewritten += 1;
            }
            Some(_) => {}
            None => {
                if name.0.last().is_some_and(|last| ident_matches(last, self.base)) {
                    return ControlFlow::Break(ComposeError::UnsupportedConstruct(format!(
                        "qualified reference to the base table: {}",
                        name
                    )));
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &mut Expr) -> ControlFlow<Self::Break> {
        if let Expr::Value(Value::Placeholder(placeholder)) = expr {
            match self.slots.get(placeholder.as_str()) {
                Some(index) => *placeholder = format!("?{}", index),
                None => {
                    return ControlFlow::Break(ComposeError::UnsupportedConstruct(format!(
                        "undeclared placeholder {}",
                        placeholder
                    )))
                }
            }
        }
        ControlFlow::Continue(())
    }
}
