//! Model descriptors
//!
//! A [`Model`] is pure schema metadata: a named, ordered set of fields, each
//! carrying its SQL type, primary-key flag, and optional foreign-key
//! reference. Models own no runtime state; the one exception is the
//! append-only index registry filled by [`crate::index::make_index`] and
//! drained at schema build.

use crate::error::QueryError;
use crate::fragment::Fragment;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a model descriptor.
pub type ModelRef = Arc<Model>;

/// Per-field value encoder applied by the write pipeline before binding.
pub type EncodeFn = Arc<dyn Fn(&Value) -> Result<Value, QueryError> + Send + Sync>;

/// The SQL rendering of a field type: base type plus column modifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlType {
    pub base_type: String,
    pub modifiers: Vec<String>,
}

/// A foreign-key reference to a column on another model.
#[derive(Clone)]
pub struct FieldReference {
    pub model: ModelRef,
    pub column: String,
}

/// Metadata for a single model field.
#[derive(Clone)]
pub struct FieldType {
    pub sql_type: SqlType,
    pub primary: bool,
    pub references: Option<FieldReference>,
    pub encode: Option<EncodeFn>,
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldType")
            .field("sql_type", &self.sql_type)
            .field("primary", &self.primary)
            .field(
                "references",
                &self.references.as_ref().map(|r| {
                    format!("{}::{}", r.model.name(), r.column)
                }),
            )
            .finish()
    }
}

impl FieldType {
    fn new(base_type: &str) -> Self {
        Self {
            sql_type: SqlType {
                base_type: base_type.to_string(),
                modifiers: vec!["NOT NULL".to_string()],
            },
            primary: false,
            references: None,
            encode: None,
        }
    }

    /// Whether this field is nullable (no NOT NULL modifier).
    pub fn nullable(&self) -> bool {
        !self.sql_type.modifiers.iter().any(|m| m == "NOT NULL")
    }

    /// Whether the column value is supplied by the database when omitted on
    /// insert (serial counters, generated primary keys).
    pub fn generated(&self) -> bool {
        self.sql_type.base_type == "serial"
            || self.sql_type.modifiers.iter().any(|m| m.starts_with("DEFAULT"))
    }

    /// Placeholder cast required so text-encoded parameters compare and
    /// insert correctly against non-text columns.
    pub fn bind_cast(&self) -> Option<&str> {
        let base = self.sql_type.base_type.as_str();
        if base == "uuid" || base.starts_with("timestamp") || base.ends_with("[]") {
            Some(base)
        } else {
            None
        }
    }

    /// Run the field's encode step, if any.
    pub fn encode_value(&self, key: &str, value: Value) -> Result<Value, QueryError> {
        match &self.encode {
            Some(encode) => encode(&value).map_err(|e| match e {
                QueryError::Encode { message, .. } => QueryError::encode(key, message),
                other => other,
            }),
            None => Ok(value),
        }
    }
}

/// Schema descriptor for one table.
pub struct Model {
    name: String,
    fields: Vec<(String, FieldType)>,
    indexes: Mutex<Vec<Fragment>>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish()
    }
}

impl Model {
    pub fn new(name: impl Into<String>, fields: Vec<(&str, FieldType)>) -> ModelRef {
        Arc::new(Self {
            name: name.into(),
            fields: fields
                .into_iter()
                .map(|(key, field)| (key.to_string(), field))
                .collect(),
            indexes: Mutex::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldType)> {
        self.fields.iter().map(|(key, field)| (key.as_str(), field))
    }

    /// Look up a field by key. Unknown keys are a fatal schema error, never a
    /// silent `None`.
    pub fn field(&self, key: &str) -> Result<&FieldType, QueryError> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, field)| field)
            .ok_or_else(|| QueryError::unknown_field(&self.name, key))
    }

    /// Keys of all primary-key fields, in declaration order.
    pub fn primary_keys(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, field)| field.primary)
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Append an index-creation fragment for schema build.
    pub fn register_index(&self, fragment: Fragment) {
        self.indexes.lock().push(fragment);
    }

    /// Snapshot of the registered index-creation fragments.
    pub fn indexes(&self) -> Vec<Fragment> {
        self.indexes.lock().clone()
    }
}

pub fn text() -> FieldType {
    FieldType::new("text")
}

pub fn integer() -> FieldType {
    FieldType::new("integer")
}

pub fn real() -> FieldType {
    FieldType::new("real")
}

pub fn boolean() -> FieldType {
    FieldType::new("boolean")
}

pub fn uuid_type() -> FieldType {
    FieldType::new("uuid")
}

pub fn timestamp() -> FieldType {
    FieldType::new("timestamp without time zone")
}

pub fn serial() -> FieldType {
    FieldType::new("serial")
}

/// A text column constrained to an enumerated set at the application level.
pub fn text_enum() -> FieldType {
    FieldType::new("text")
}

/// A jsonb column; values are bound as JSON payloads directly.
pub fn jsonb() -> FieldType {
    FieldType::new("jsonb")
}

/// An array of the inner type. Values encode to the engine's array literal
/// syntax (`{"a","b"}`) and bind with an array cast.
pub fn array(inner: FieldType) -> FieldType {
    let inner_encode = inner.encode.clone();
    let mut field = inner.clone();
    field.sql_type.base_type = format!("{}[]", inner.sql_type.base_type);
    field.encode = Some(Arc::new(move |value: &Value| {
        let items = value.as_array().ok_or_else(|| {
            QueryError::encode("<array>", "expected an array value")
        })?;
        let mut encoded = Vec::with_capacity(items.len());
        for item in items {
            let item = match &inner_encode {
                Some(encode) => encode(item)?,
                None => item.clone(),
            };
            let text = serde_json::to_string(&item)
                .map_err(|e| QueryError::encode("<array>", e.to_string()))?;
            encoded.push(text);
        }
        Ok(Value::String(format!("{{{}}}", encoded.join(","))))
    }));
    field
}

/// Remove the NOT NULL constraint from a field.
pub fn optional(mut inner: FieldType) -> FieldType {
    inner.sql_type.modifiers.retain(|m| m != "NOT NULL");
    inner
}

/// Mark a field as the primary key.
pub fn primary(mut inner: FieldType) -> FieldType {
    inner.primary = true;
    inner.sql_type.modifiers.push("PRIMARY KEY".to_string());
    inner
}

/// A database-generated primary key; omitted from inserts and returned via
/// RETURNING.
pub fn primary_generated(mut inner: FieldType) -> FieldType {
    inner.primary = true;
    inner
        .sql_type
        .modifiers
        .push("DEFAULT public.uuid_generate_v4()".to_string());
    inner.sql_type.modifiers.push("PRIMARY KEY".to_string());
    inner
}

/// The conventional generated uuid primary key.
pub fn generated_id() -> FieldType {
    primary_generated(uuid_type())
}

/// A foreign key referencing `column` on `model`. The SQL type is inherited
/// from the referenced column.
pub fn reference(model: &ModelRef, column: &str) -> Result<FieldType, QueryError> {
    let target = model.field(column)?;
    let mut field = FieldType::new(&target.sql_type.base_type);
    field.references = Some(FieldReference {
        model: model.clone(),
        column: column.to_string(),
    });
    Ok(field)
}
