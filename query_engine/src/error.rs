use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("no field \"{field}\" on model \"{model}\"")]
    UnknownField { model: String, field: String },

    #[error(
        "this query would remove every row from \"{table}\"; add a filter or call allow_delete_all() explicitly"
    )]
    UnsafeDelete { table: String },

    #[error("cannot encode value for \"{field}\": {message}")]
    Encode { field: String, message: String },

    #[error("database error: {message}\nquery:\n{sql}\nvalues: {values:?}")]
    Database {
        message: String,
        sql: String,
        values: Vec<Value>,
    },

    #[error("cannot decode column \"{column}\": {message}")]
    Decode { column: String, message: String },
}

impl QueryError {
    pub fn unknown_field(model: &str, field: &str) -> Self {
        Self::UnknownField {
            model: model.to_string(),
            field: field.to_string(),
        }
    }

    pub fn encode(field: &str, message: impl Into<String>) -> Self {
        Self::Encode {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn decode(column: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.to_string(),
            message: message.into(),
        }
    }
}
