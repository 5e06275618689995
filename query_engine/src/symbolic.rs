//! Symbolic field resolution
//!
//! A [`ModelResolver`] is the lazy field-access facade handed to `filter_with`
//! and `with` callbacks. Resolving a key yields an explicit tagged symbol:
//! a plain column, or a relation that carries both the foreign-key column and
//! a nested resolver scoped to a correlated sub-query. Building symbols
//! performs no I/O and renders no SQL; fragments materialize only when a
//! symbol is consumed by a clause.

use crate::error::QueryError;
use crate::fragment::{raw, seq, Fragment};
use crate::model::ModelRef;
use crate::query::QueryData;
use serde_json::Value;

/// How a selected value decodes out of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Decode {
    /// A plain column value, read as-is under its select key.
    Column,
    /// A single JSON object produced by a correlated sub-select.
    JsonRow,
    /// A JSON array of rows; SQL NULL (zero matches) normalizes to `[]`.
    JsonRows,
    /// A scalar aggregate (count and friends).
    Scalar,
}

/// Anything that can appear in a SELECT list and decode its own result.
#[derive(Debug, Clone)]
pub struct Selector {
    /// Synthetic key; unique so flattened nested selections never collide.
    pub id: String,
    /// The SELECT-list expression.
    pub select: Fragment,
    pub decode: Decode,
}

impl Selector {
    pub fn decode_value(&self, value: Value) -> Value {
        match self.decode {
            Decode::JsonRows if value.is_null() => Value::Array(Vec::new()),
            _ => value,
        }
    }
}

/// A resolved model column under a specific query alias.
#[derive(Debug, Clone)]
pub struct ColumnSelector {
    id: String,
    key: String,
    column: String,
}

impl ColumnSelector {
    pub(crate) fn new(key: &str, column: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            key: key.to_string(),
            column,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The column reference as a fragment, usable in any expression position.
    pub fn fragment(&self) -> Fragment {
        raw(self.column.clone())
    }

    pub fn selector(&self) -> Selector {
        Selector {
            id: self.id.clone(),
            select: self.fragment(),
            decode: Decode::Column,
        }
    }
}

/// A resolved field: either a plain column or a foreign-key relation.
#[derive(Debug, Clone)]
pub enum FieldSymbol {
    Column(ColumnSelector),
    Relation(RelationSymbol),
}

impl FieldSymbol {
    /// The column view of the symbol. For relations this is the foreign-key
    /// column itself.
    pub fn column(&self) -> &ColumnSelector {
        match self {
            FieldSymbol::Column(column) => column,
            FieldSymbol::Relation(relation) => &relation.column,
        }
    }

    pub fn relation(&self) -> Option<&RelationSymbol> {
        match self {
            FieldSymbol::Column(_) => None,
            FieldSymbol::Relation(relation) => Some(relation),
        }
    }
}

/// A foreign-key field: the FK column on the outer query plus a resolver over
/// the referenced model, pre-filtered so the referenced primary key equals
/// the outer foreign-key column.
#[derive(Debug, Clone)]
pub struct RelationSymbol {
    column: ColumnSelector,
    resolver: ModelResolver,
}

impl RelationSymbol {
    /// The foreign-key column on the outer query.
    pub fn fk_column(&self) -> &ColumnSelector {
        &self.column
    }

    /// The correlated resolver over the referenced model.
    pub fn resolver(&self) -> &ModelResolver {
        &self.resolver
    }
}

/// Lazy field-access facade over a query descriptor.
#[derive(Debug, Clone)]
pub struct ModelResolver {
    query: QueryData,
}

impl ModelResolver {
    pub fn new(query: &QueryData) -> Self {
        Self {
            query: query.clone(),
        }
    }

    pub fn model(&self) -> &ModelRef {
        &self.query.model
    }

    pub(crate) fn query(&self) -> &QueryData {
        &self.query
    }

    /// Resolve a field key to a tagged symbol. Unknown keys are fatal.
    pub fn resolve(&self, key: &str) -> Result<FieldSymbol, QueryError> {
        let field = self.query.model.field(key)?;
        let column = ColumnSelector::new(key, self.query.column_sql(key));

        let Some(references) = &field.references else {
            return Ok(FieldSymbol::Column(column));
        };

        // Correlate the referenced model back to this query's alias; the
        // nested descriptor renders as a sub-query filtered on the FK.
        let mut nested = QueryData::empty(references.model.clone());
        let join_clause = seq(vec![
            raw(self.query.column_sql(key)),
            raw(" = "),
            raw(nested.column_sql(&references.column)),
        ]);
        nested.wheres.push(join_clause);

        Ok(FieldSymbol::Relation(RelationSymbol {
            column,
            resolver: ModelResolver { query: nested },
        }))
    }

    /// Resolve a key directly to its column view.
    pub fn column(&self, key: &str) -> Result<ColumnSelector, QueryError> {
        Ok(self.resolve(key)?.column().clone())
    }

    /// Resolve a key to its correlated relation resolver; an error when the
    /// field carries no reference.
    pub fn relation(&self, key: &str) -> Result<ModelResolver, QueryError> {
        match self.resolve(key)? {
            FieldSymbol::Relation(relation) => Ok(relation.resolver.clone()),
            FieldSymbol::Column(_) => Err(QueryError::unknown_field(
                self.query.model.name(),
                &format!("{key} (not a reference field)"),
            )),
        }
    }
}
