//! Template files.
//!
//! Extra templates can be declared in TOML and listed under
//! `[templates] files` in the settings:
//!
//! ```toml
//! [[template]]
//! name = "west_top_states"
//! base = "sales"
//! description = "Top states by sales"
//! body = """
//! SELECT state, ROUND(SUM(sales), 2) AS sales
//! FROM sales GROUP BY state ORDER BY sales DESC LIMIT :top_n
//! """
//! columns = [
//!   { name = "state", type = "text" },
//!   { name = "sales", type = "decimal" },
//! ]
//!
//! [[template.slots]]
//! name = "top_n"
//! value = 5
//! ```
//!
//! Slot values may be integers, floats, strings, booleans or bare dates.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use super::{QueryTemplate, RegistryError, ResultColumn, Slot};
use crate::sql::SqlValue;

/// Errors raised while reading a template file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read template file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse template file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(
        "{}: template '{template}' slot '{slot}' has an unsupported value ({kind})",
        path.display()
    )]
    SlotValue {
        path: PathBuf,
        template: String,
        slot: String,
        kind: String,
    },

    #[error("{}: {source}", path.display())]
    Register {
        path: PathBuf,
        #[source]
        source: RegistryError,
    },
}

pub type LoadResult<T> = Result<T, LoadError>;

#[derive(Debug, Deserialize)]
struct TemplateFile {
    #[serde(default)]
    template: Vec<TemplateEntry>,
}

#[derive(Debug, Deserialize)]
struct TemplateEntry {
    name: String,
    base: String,
    #[serde(default)]
    description: Option<String>,
    body: String,
    #[serde(default)]
    columns: Vec<ResultColumn>,
    #[serde(default)]
    slots: Vec<SlotEntry>,
}

#[derive(Debug, Deserialize)]
struct SlotEntry {
    name: String,
    value: toml::Value,
}

/// Read and parse one template file.
pub fn load_file(path: impl AsRef<Path>) -> LoadResult<Vec<QueryTemplate>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_templates(&content, path)
}

/// Parse template declarations; `origin` names the source in errors.
pub fn parse_templates(content: &str, origin: impl AsRef<Path>) -> LoadResult<Vec<QueryTemplate>> {
    let origin = origin.as_ref();
    let file: TemplateFile = toml::from_str(content).map_err(|source| LoadError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;

    file.template
        .into_iter()
        .map(|entry| -> LoadResult<QueryTemplate> {
            let slots = entry
                .slots
                .into_iter()
                .map(|slot| -> LoadResult<Slot> {
                    let value = slot_value(&slot.value).ok_or_else(|| LoadError::SlotValue {
                        path: origin.to_path_buf(),
                        template: entry.name.clone(),
                        slot: slot.name.clone(),
                        kind: slot.value.type_str().to_string(),
                    })?;
                    Ok(Slot {
                        name: slot.name,
                        value,
                    })
                })
                .collect::<LoadResult<Vec<_>>>()?;

            Ok(QueryTemplate {
                name: entry.name,
                base_alias: entry.base,
                body: entry.body.trim().to_string(),
                result_columns: entry.columns,
                slots,
                description: entry.description,
            })
        })
        .collect()
}

fn slot_value(value: &toml::Value) -> Option<SqlValue> {
    match value {
        toml::Value::Integer(i) => Some(SqlValue::Integer(*i)),
        toml::Value::Float(f) => Some(SqlValue::Real(*f)),
        toml::Value::String(s) => Some(SqlValue::Text(s.clone())),
        toml::Value::Boolean(b) => Some(SqlValue::Integer(i64::from(*b))),
        toml::Value::Datetime(dt) => match (dt.date, dt.time, dt.offset) {
            (Some(d), None, None) => {
                NaiveDate::from_ymd_opt(i32::from(d.year), u32::from(d.month), u32::from(d.day))
                    .map(SqlValue::Date)
            }
            _ => None,
        },
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}
