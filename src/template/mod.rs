//! Query templates.
//!
//! A [`QueryTemplate`] is a hand-written analytical query over one base
//! table, plus the description of what it returns. Templates know nothing
//! about filters: the composer narrows them at request time.
//!
//! ```text
//! QueryTemplate ──register──▶ RegistryBuilder ──build──▶ TemplateRegistry
//!      (text)                  (parse + validate)          (name → Arc<RegisteredTemplate>)
//! ```
//!
//! Templates come from two places: the built-in [`library`] and TOML files
//! read by [`loader`].

pub mod library;
pub mod loader;
mod registry;

pub use registry::{RegistryBuilder, RegistryError, RegistryResult, TemplateRegistry};

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlparser::ast::Query;

use crate::sql::{parse_query, AnalysisError, SqlValue};

/// Semantic type of a result column. Drives how the gateway reads cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Text,
    Integer,
    Decimal,
    Date,
    Percentage,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Text => "text",
            SemanticType::Integer => "integer",
            SemanticType::Decimal => "decimal",
            SemanticType::Date => "date",
            SemanticType::Percentage => "percentage",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,
}

impl ResultColumn {
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
        }
    }
}

/// A declared named parameter. The body references it as `:name`; the
/// composer binds `value` in its place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub name: String,
    pub value: SqlValue,
}

impl Slot {
    /// The placeholder text as it appears in the body.
    pub fn placeholder(&self) -> String {
        format!(":{}", self.name)
    }
}

/// A saved analytical query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTemplate {
    /// Unique registry key.
    pub name: String,
    /// The table the outermost `FROM` reads from.
    pub base_alias: String,
    pub body: String,
    pub result_columns: Vec<ResultColumn>,
    #[serde(default)]
    pub slots: Vec<Slot>,
    #[serde(default)]
    pub description: Option<String>,
}

impl QueryTemplate {
    pub fn new(
        name: impl Into<String>,
        base_alias: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_alias: base_alias.into(),
            body: body.into(),
            result_columns: Vec::new(),
            slots: Vec::new(),
            description: None,
        }
    }

    pub fn column(mut self, name: impl Into<String>, semantic_type: SemanticType) -> Self {
        self.result_columns.push(ResultColumn::new(name, semantic_type));
        self
    }

    pub fn slot(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.slots.push(Slot {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Look up a declared slot by name (without the leading `:`).
    pub fn slot_value(&self, name: &str) -> Option<&SqlValue> {
        self.slots.iter().find(|s| s.name == name).map(|s| &s.value)
    }
}

/// A template with its body parsed once, ready for composition.
#[derive(Debug, Clone)]
pub struct RegisteredTemplate {
    template: Arc<QueryTemplate>,
    ast: Query,
}

impl RegisteredTemplate {
    /// Parse the body. Structural checks happen in [`RegistryBuilder::register`].
    pub fn parse(template: QueryTemplate) -> Result<Self, AnalysisError> {
        let ast = parse_query(&template.body)?;
        Ok(Self {
            template: Arc::new(template),
            ast,
        })
    }

    pub fn name(&self) -> &str {
        &self.template.name
    }

    pub fn template(&self) -> &Arc<QueryTemplate> {
        &self.template
    }

    pub fn ast(&self) -> &Query {
        &self.ast
    }
}
