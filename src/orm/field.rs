//! Schema fields: one column's semantic type, primary-key status, and
//! default-value policy.

use crate::db::Value;
use std::fmt;
use std::sync::Arc;

/// Semantic column type.
///
/// Each kind fixes a SQL type string and whether the column may serve as the
/// primary key (boolean/text/blob columns never do).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Boolean,
    Integer,
    Float,
    Text,
    Blob,
}

impl FieldKind {
    pub fn default_sql_type(self) -> &'static str {
        match self {
            Self::String => "varchar(128)",
            Self::Boolean => "boolean",
            Self::Integer => "bigint",
            Self::Float => "real",
            Self::Text => "text",
            Self::Blob => "blob",
        }
    }

    pub fn key_eligible(self) -> bool {
        matches!(self, Self::String | Self::Integer | Self::Float)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Blob => "blob",
        };
        f.write_str(name)
    }
}

/// Default-value policy: a fixed value or a zero-arg generator invoked each
/// time the default is needed.
#[derive(Clone)]
pub enum FieldDefault {
    Value(Value),
    Generate(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl FieldDefault {
    pub fn resolve(&self) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            Self::Generate(f) => f(),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "Value({v:?})"),
            Self::Generate(_) => f.write_str("Generate(..)"),
        }
    }
}

/// One declared column.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub sql_type: String,
    pub primary_key: bool,
    pub default: Option<FieldDefault>,
}

impl FieldDef {
    fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            sql_type: kind.default_sql_type().to_string(),
            primary_key: false,
            default: None,
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn float(name: &str) -> Self {
        Self::new(name, FieldKind::Float)
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn blob(name: &str) -> Self {
        Self::new(name, FieldKind::Blob)
    }

    /// Override the SQL type string, e.g. `varchar(64)` for a string column.
    pub fn sql_type(mut self, ddl: &str) -> Self {
        self.sql_type = ddl.to_string();
        self
    }

    /// Mark this column as the primary key. Eligibility is checked when the
    /// table schema is built.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    pub fn default_with(mut self, generate: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(FieldDefault::Generate(Arc::new(generate)));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_fix_sql_types() {
        assert_eq!(FieldKind::String.default_sql_type(), "varchar(128)");
        assert_eq!(FieldKind::Integer.default_sql_type(), "bigint");
        assert_eq!(FieldKind::Float.default_sql_type(), "real");
        assert_eq!(FieldKind::Boolean.default_sql_type(), "boolean");
        assert_eq!(FieldKind::Text.default_sql_type(), "text");
        assert_eq!(FieldKind::Blob.default_sql_type(), "blob");
    }

    #[test]
    fn key_eligibility_policy() {
        assert!(FieldKind::String.key_eligible());
        assert!(FieldKind::Integer.key_eligible());
        assert!(FieldKind::Float.key_eligible());
        assert!(!FieldKind::Boolean.key_eligible());
        assert!(!FieldKind::Text.key_eligible());
        assert!(!FieldKind::Blob.key_eligible());
    }

    #[test]
    fn builder_overrides() {
        let f = FieldDef::string("email").sql_type("varchar(64)").primary_key();
        assert_eq!(f.sql_type, "varchar(64)");
        assert!(f.primary_key);

        let f = FieldDef::integer("admin").default_value(0i64);
        assert_eq!(
            f.default.as_ref().map(FieldDefault::resolve),
            Some(Value::Integer(0))
        );

        let f = FieldDef::float("created_at").default_with(|| Value::Real(42.0));
        assert_eq!(
            f.default.as_ref().map(FieldDefault::resolve),
            Some(Value::Real(42.0))
        );
    }
}
