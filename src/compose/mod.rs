//! Query composition.
//!
//! Narrows a registered template to a filter selection without touching the
//! template's text:
//!
//! ```text
//! FilterSelection ──▶ Predicate ──▶ WITH filtered_base AS (SELECT * FROM "sales" WHERE …)
//!                                          │
//! RegisteredTemplate.ast ──clone──▶ BaseRewriter (sales → filtered_base, :slot → ?n)
//!                                          │
//!                                          ▼
//!                         WITH filtered_base AS (…), <template CTEs> <template query>
//! ```
//!
//! Filter values bind to `?1..?k` and template slots to `?k+1..`. The only
//! things ever written into statement text are quoted column names from
//! configuration and the template's own SQL.

mod rewrite;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::filter::{FilterColumns, FilterSelection, Predicate};
use crate::sql::analysis::{cte_names, reads_from_base};
use crate::sql::SqlValue;
use crate::template::{QueryTemplate, RegisteredTemplate};

use rewrite::BaseRewriter;

/// Name of the CTE holding the filtered base rows.
pub const STAGING_RELATION: &str = "filtered_base";

/// Errors raised while composing a statement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComposeError {
    #[error("template '{template}' has no top-level reference to '{base}'")]
    Rewrite { template: String, base: String },

    #[error("unsupported construct: {0}")]
    UnsupportedConstruct(String),
}

pub type ComposeResult<T> = Result<T, ComposeError>;

/// A statement ready for the gateway. Parameter `i` (zero-based) binds
/// placeholder `?{i + 1}`.
#[derive(Debug, Clone)]
pub struct ComposedQuery {
    pub statement_text: String,
    pub parameters: Vec<SqlValue>,
    pub source_template: Arc<QueryTemplate>,
}

/// Builds [`ComposedQuery`] values. Pure; holds only the filter columns.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    columns: FilterColumns,
}

impl Composer {
    pub fn new(columns: FilterColumns) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &FilterColumns {
        &self.columns
    }

    pub fn compose(
        &self,
        template: &RegisteredTemplate,
        filter: &FilterSelection,
    ) -> ComposeResult<ComposedQuery> {
        let composed = self.compose_inner(template, filter);
        match &composed {
            Ok(query) => debug!(
                template = %template.name(),
                statement = %query.statement_text,
                params = query.parameters.len(),
                "composed statement"
            ),
            Err(e) => warn!(template = %template.name(), error = %e, "composition failed"),
        }
        composed
    }

    fn compose_inner(
        &self,
        registered: &RegisteredTemplate,
        filter: &FilterSelection,
    ) -> ComposeResult<ComposedQuery> {
        let template = registered.template();
        let base = template.base_alias.as_str();

        for name in cte_names(registered.ast()) {
            if name.eq_ignore_ascii_case(base) || name.eq_ignore_ascii_case(STAGING_RELATION) {
                return Err(ComposeError::UnsupportedConstruct(format!(
                    "CTE '{}' shadows a reserved relation",
                    name
                )));
            }
        }
        if !reads_from_base(registered.ast(), base) {
            return Err(ComposeError::Rewrite {
                template: template.name.clone(),
                base: base.to_string(),
            });
        }

        let predicate = Predicate::build(filter, &self.columns);
        let first_slot = predicate.params().len() + 1;
        let slots: HashMap<String, usize> = template
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (slot.placeholder(), first_slot + i))
            .collect();

        let mut query = registered.ast().clone();
        let rewritten = BaseRewriter::new(base, &slots).rewrite(&mut query)?;
        if rewritten == 0 {
            return Err(ComposeError::Rewrite {
                template: template.name.clone(),
                base: base.to_string(),
            });
        }

        let with = query.with.take();
        let mut statement = String::from("WITH ");
        if with.as_ref().is_some_and(|w| w.recursive) {
            statement.push_str("RECURSIVE ");
        }
        statement.push_str(STAGING_RELATION);
        statement.push_str(" AS (");
        statement.push_str(&predicate.select_from(base));
        statement.push(')');
        if let Some(with) = &with {
            for cte in &with.cte_tables {
                statement.push_str(", ");
                statement.push_str(&cte.to_string());
            }
        }
        statement.push(' ');
        statement.push_str(&query.to_string());

        let mut parameters = predicate.into_params();
        parameters.extend(template.slots.iter().map(|slot| slot.value.clone()));

        Ok(ComposedQuery {
            statement_text: statement,
            parameters,
            source_template: Arc::clone(template),
        })
    }
}
