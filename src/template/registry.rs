//! Template registry.
//!
//! Built once at startup and read-only afterwards. Registration parses each
//! body and rejects anything the composer could not narrow safely, so a
//! registry that builds is a registry whose templates compose.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use super::{QueryTemplate, RegisteredTemplate};
use crate::sql::analysis::{placeholders, reads_from_base};

/// Errors raised while registering or looking up templates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("template '{0}' is already registered")]
    DuplicateTemplate(String),

    #[error("template '{name}' is invalid: {reason}")]
    InvalidTemplate { name: String, reason: String },

    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

fn invalid(template: &QueryTemplate, reason: impl Into<String>) -> RegistryError {
    RegistryError::InvalidTemplate {
        name: template.name.clone(),
        reason: reason.into(),
    }
}

/// Collects templates before the registry is frozen.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    templates: BTreeMap<String, Arc<RegisteredTemplate>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a template.
    pub fn register(&mut self, template: QueryTemplate) -> RegistryResult<()> {
        if self.templates.contains_key(&template.name) {
            return Err(RegistryError::DuplicateTemplate(template.name));
        }
        let registered = validate(template)?;
        debug!(template = %registered.name(), "registered template");
        self.templates
            .insert(registered.name().to_string(), Arc::new(registered));
        Ok(())
    }

    /// Register every template, stopping at the first failure.
    pub fn register_all(
        &mut self,
        templates: impl IntoIterator<Item = QueryTemplate>,
    ) -> RegistryResult<()> {
        for template in templates {
            self.register(template)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn build(self) -> TemplateRegistry {
        TemplateRegistry {
            templates: self.templates,
        }
    }
}

fn validate(template: QueryTemplate) -> RegistryResult<RegisteredTemplate> {
    if template.name.trim().is_empty() {
        return Err(invalid(&template, "name is empty"));
    }
    if template.base_alias.trim().is_empty() {
        return Err(invalid(&template, "base table is empty"));
    }

    // Result columns
    if template.result_columns.is_empty() {
        return Err(invalid(&template, "no result columns declared"));
    }
    let mut seen = HashSet::new();
    for column in &template.result_columns {
        if !seen.insert(column.name.to_ascii_lowercase()) {
            return Err(invalid(
                &template,
                format!("result column '{}' is declared twice", column.name),
            ));
        }
    }

    // Slots
    let mut slot_names = HashSet::new();
    for slot in &template.slots {
        if !slot_names.insert(slot.name.as_str()) {
            return Err(invalid(
                &template,
                format!("slot '{}' is declared twice", slot.name),
            ));
        }
    }

    let registered = match RegisteredTemplate::parse(template.clone()) {
        Ok(registered) => registered,
        Err(e) => return Err(invalid(&template, e.to_string())),
    };
    let ast = registered.ast();

    if !reads_from_base(ast, &template.base_alias) {
        return Err(invalid(
            &template,
            format!(
                "the outermost query does not read from '{}'",
                template.base_alias
            ),
        ));
    }

    let used = placeholders(ast);
    for placeholder in &used {
        match placeholder.strip_prefix(':') {
            Some(name) if template.slot_value(name).is_some() => {}
            Some(name) => {
                return Err(invalid(
                    &template,
                    format!("placeholder ':{}' has no declared slot", name),
                ))
            }
            None => {
                return Err(invalid(
                    &template,
                    format!("placeholder '{}' is not a named slot", placeholder),
                ))
            }
        }
    }
    for slot in &template.slots {
        if !used.contains(&slot.placeholder()) {
            return Err(invalid(
                &template,
                format!("slot '{}' is never used", slot.name),
            ));
        }
    }

    Ok(registered)
}

/// Immutable name → template map.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, Arc<RegisteredTemplate>>,
}

impl TemplateRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn lookup(&self, name: &str) -> RegistryResult<&Arc<RegisteredTemplate>> {
        self.templates
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTemplate(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Template names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RegisteredTemplate>> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
