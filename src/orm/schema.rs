//! Entity descriptors: per-type table metadata and canned SQL templates.
//!
//! A [`TableSchema`] is built exactly once per entity type and shared by
//! reference between every record of that type. Statement shapes are computed
//! here, not per call; only argument values vary at execution time.

use super::field::{FieldDef, FieldKind};
use crate::db::PLACEHOLDER;
use std::sync::Arc;

/// Definition-time schema errors. These indicate a programming error and are
/// fatal at startup, never per-request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("duplicate primary key for field: {0}")]
    DuplicatePrimaryKey(String),
    #[error("primary key not found for table: {0}")]
    MissingPrimaryKey(String),
    #[error("field `{name}` of kind {kind} cannot be a primary key")]
    IneligiblePrimaryKey { name: String, kind: FieldKind },
    #[error("duplicate field name: {0}")]
    DuplicateField(String),
}

/// The five statement shapes generated per entity type.
#[derive(Debug, Clone)]
pub struct SqlTemplates {
    pub select: String,
    pub insert: String,
    pub update: String,
    pub delete: String,
    pub random: String,
}

/// Immutable per-type metadata: table name, primary key, ordered non-key
/// fields, and SQL templates.
#[derive(Debug)]
pub struct TableSchema {
    table: String,
    key: FieldDef,
    fields: Vec<FieldDef>,
    templates: SqlTemplates,
}

impl TableSchema {
    /// Build the descriptor from the declared fields.
    ///
    /// Exactly one field must be marked primary key and its kind must be
    /// key-eligible; any violation is a definition-time error, returned
    /// deterministically before any record exists.
    pub fn build(table: &str, fields: Vec<FieldDef>) -> Result<Arc<Self>, SchemaError> {
        let mut key: Option<FieldDef> = None;
        let mut non_key = Vec::with_capacity(fields.len());

        for field in fields {
            if key.as_ref().is_some_and(|k| k.name == field.name)
                || non_key.iter().any(|f: &FieldDef| f.name == field.name)
            {
                return Err(SchemaError::DuplicateField(field.name));
            }
            if field.primary_key {
                if !field.kind.key_eligible() {
                    return Err(SchemaError::IneligiblePrimaryKey {
                        name: field.name,
                        kind: field.kind,
                    });
                }
                if key.is_some() {
                    return Err(SchemaError::DuplicatePrimaryKey(field.name));
                }
                key = Some(field);
            } else {
                non_key.push(field);
            }
        }

        let key = key.ok_or_else(|| SchemaError::MissingPrimaryKey(table.to_string()))?;
        let templates = build_templates(table, &key.name, &non_key);
        Ok(Arc::new(Self {
            table: table.to_string(),
            key,
            fields: non_key,
            templates,
        }))
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &FieldDef {
        &self.key
    }

    /// Non-key fields in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        if self.key.name == name {
            return Some(&self.key);
        }
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn templates(&self) -> &SqlTemplates {
        &self.templates
    }
}

fn build_templates(table: &str, key: &str, fields: &[FieldDef]) -> SqlTemplates {
    let columns = fields
        .iter()
        .map(|f| format!("`{}`", f.name))
        .collect::<Vec<_>>()
        .join(", ");
    let slots = fields
        .iter()
        .map(|_| PLACEHOLDER.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let assignments = fields
        .iter()
        .map(|f| format!("`{}`={PLACEHOLDER}", f.name))
        .collect::<Vec<_>>()
        .join(", ");

    let select = if fields.is_empty() {
        format!("SELECT `{key}` FROM `{table}`")
    } else {
        format!("SELECT `{key}`, {columns} FROM `{table}`")
    };

    SqlTemplates {
        select,
        insert: format!("INSERT INTO `{table}` ({columns}) VALUES ({slots})"),
        update: format!("UPDATE `{table}` SET {assignments} WHERE `{key}`={PLACEHOLDER}"),
        delete: format!("DELETE FROM `{table}` WHERE `{key}`={PLACEHOLDER}"),
        // Biased sampling heuristic: picks a random value inside
        // [min(key), max(key)] and scans upward from it, so rows after a gap
        // are over-represented. Acceptable when keys are densely packed; not
        // uniform random selection.
        random: format!(
            "SELECT * FROM `{table}` AS t1 JOIN \
             (SELECT ROUND(RAND() * ((SELECT MAX(`{key}`) FROM `{table}`) - \
             (SELECT MIN(`{key}`) FROM `{table}`)) + \
             (SELECT MIN(`{key}`) FROM `{table}`)) AS `{key}`) AS t2 \
             WHERE t1.`{key}` >= t2.`{key}` ORDER BY t1.`{key}`"
        ),
    }
}
