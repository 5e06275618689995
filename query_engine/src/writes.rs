//! Write pipeline
//!
//! Insert, update, and delete statements built over the same fragment tree as
//! selects. Values pass through the field's encode step before binding, and
//! deletes refuse to render until a filter (or an explicit full-table opt-in)
//! is applied.

use crate::client::{DatabaseClient, Row};
use crate::error::QueryError;
use crate::fragment::{bind, join_fragments, raw, render, seq, Fragment};
use crate::model::{FieldType, ModelRef};
use crate::query::{add_where_clause, where_to_sql, Clause, QueryData};
use crate::reflect::{column_name, quote_ident, table_name};
use crate::symbolic::ModelResolver;
use serde_json::Value;

/// A statement that can render itself for execution, standalone or inside a
/// transaction batch.
pub trait WriteStatement {
    fn to_fragment(&self) -> Result<Fragment, QueryError>;

    fn to_sql(&self) -> Result<(String, Vec<Value>), QueryError> {
        render(&self.to_fragment()?)
    }
}

/// Encode a field value and wrap it as a bindable fragment with the field's
/// placeholder cast.
fn value_fragment(field: &FieldType, key: &str, value: Value) -> Result<Fragment, QueryError> {
    let encoded = field.encode_value(key, value)?;
    if encoded.is_null() {
        // Untyped nulls cannot be bound; inline instead.
        return Ok(raw("NULL"));
    }
    let mut parts = vec![bind(encoded)];
    if let Some(cast) = field.bind_cast() {
        parts.push(raw(format!("::{cast}")));
    }
    Ok(seq(parts))
}

fn returning_clause(model: &ModelRef) -> Option<Fragment> {
    let keys = model.primary_keys();
    if keys.is_empty() {
        return None;
    }
    let columns = keys
        .into_iter()
        .map(|key| Some(raw(column_name(key))))
        .collect();
    Some(seq(vec![
        raw(" RETURNING "),
        join_fragments(columns, raw(", ")),
    ]))
}

/// A single-row INSERT. Generated primary keys come back through RETURNING.
#[derive(Debug, Clone)]
pub struct InsertQuery {
    model: ModelRef,
    record: Vec<(String, Value)>,
}

/// Start an INSERT of one record. Keys validate against the model when the
/// statement renders.
pub fn insert(model: &ModelRef, record: Row) -> InsertQuery {
    InsertQuery {
        model: model.clone(),
        record: record.into_iter().collect(),
    }
}

impl InsertQuery {
    pub async fn execute(&self, db: &dyn DatabaseClient) -> Result<Row, QueryError> {
        let (sql, values) = self.to_sql()?;
        crate::trace_log!(sql = %sql, "executing insert");
        let rows = db.execute(&sql, &values).await?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }
}

impl WriteStatement for InsertQuery {
    fn to_fragment(&self) -> Result<Fragment, QueryError> {
        let mut columns = Vec::with_capacity(self.record.len());
        let mut binds = Vec::with_capacity(self.record.len());
        for (key, value) in &self.record {
            let field = self.model.field(key)?;
            columns.push(Some(raw(column_name(key))));
            binds.push(Some(value_fragment(field, key, value.clone())?));
        }

        let mut parts = vec![
            raw(format!("INSERT INTO {} (", table_name(&self.model))),
            join_fragments(columns, raw(", ")),
            raw(") VALUES ("),
            join_fragments(binds, raw(", ")),
            raw(")"),
        ];
        if let Some(returning) = returning_clause(&self.model) {
            parts.push(returning);
        }
        Ok(seq(parts))
    }
}

/// Insert several records atomically. Every insert runs inside one
/// transaction; any failure rolls the whole batch back and nothing is kept.
pub async fn insert_all(
    db: &dyn DatabaseClient,
    model: &ModelRef,
    records: Vec<Row>,
) -> Result<Vec<Row>, QueryError> {
    db.execute("BEGIN", &[]).await?;

    let mut returned = Vec::with_capacity(records.len());
    for record in records {
        match insert(model, record).execute(db).await {
            Ok(row) => returned.push(row),
            Err(err) => {
                db.execute("ROLLBACK", &[]).await?;
                return Err(err);
            }
        }
    }

    db.execute("COMMIT", &[]).await?;
    Ok(returned)
}

/// One SET assignment: an encoded value or an engine-produced expression.
#[derive(Debug, Clone)]
enum Assignment {
    Value(Value),
    Expr(Fragment),
}

/// An UPDATE with encoded assignments, optional filters, and optional
/// RETURNING keys.
#[derive(Debug, Clone)]
pub struct UpdateQuery {
    data: QueryData,
    assignments: Vec<(String, Assignment)>,
    returning: Vec<String>,
}

/// Start an UPDATE over a model.
pub fn update(model: &ModelRef) -> UpdateQuery {
    UpdateQuery {
        data: QueryData::empty(model.clone()),
        assignments: Vec::new(),
        returning: Vec::new(),
    }
}

impl UpdateQuery {
    /// Assign a value; it passes through the field's encode step and binds
    /// with the field's cast.
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.assignments
            .push((key.to_string(), Assignment::Value(value.into())));
        self
    }

    /// Assign an expression verbatim (another column, an arithmetic update).
    pub fn set_expr(mut self, key: &str, expr: Fragment) -> Self {
        self.assignments
            .push((key.to_string(), Assignment::Expr(expr)));
        self
    }

    /// Assign an expression built from the symbolic resolver scoped to this
    /// update's alias, for column-to-column updates.
    pub fn set_with<F>(mut self, key: &str, build: F) -> Result<Self, QueryError>
    where
        F: FnOnce(&ModelResolver) -> Result<Fragment, QueryError>,
    {
        let fragment = build(&ModelResolver::new(&self.data))?;
        self.assignments
            .push((key.to_string(), Assignment::Expr(fragment)));
        Ok(self)
    }

    pub fn filter(self, clause: impl Into<Clause>) -> Result<Self, QueryError> {
        Ok(Self {
            data: add_where_clause(self.data, clause.into())?,
            ..self
        })
    }

    /// Return the named columns of every updated row.
    pub fn returning(mut self, keys: &[&str]) -> Self {
        self.returning = keys.iter().map(|key| key.to_string()).collect();
        self
    }

    pub async fn execute(&self, db: &dyn DatabaseClient) -> Result<Vec<Row>, QueryError> {
        let (sql, values) = self.to_sql()?;
        crate::trace_log!(sql = %sql, "executing update");
        db.execute(&sql, &values).await
    }
}

impl WriteStatement for UpdateQuery {
    fn to_fragment(&self) -> Result<Fragment, QueryError> {
        let mut sets = Vec::with_capacity(self.assignments.len());
        for (key, assignment) in &self.assignments {
            let field = self.data.model.field(key)?;
            let rhs = match assignment {
                Assignment::Value(value) => value_fragment(field, key, value.clone())?,
                Assignment::Expr(expr) => expr.clone(),
            };
            sets.push(Some(seq(vec![
                raw(format!("{} = ", column_name(key))),
                rhs,
            ])));
        }

        let mut parts = vec![
            Some(seq(vec![
                raw(format!(
                    "UPDATE {} AS {} SET ",
                    table_name(&self.data.model),
                    quote_ident(&self.data.id)
                )),
                join_fragments(sets, raw(", ")),
            ])),
            where_to_sql(&self.data.wheres),
        ];
        if !self.returning.is_empty() {
            for key in &self.returning {
                self.data.model.field(key)?;
            }
            let columns = self
                .returning
                .iter()
                .map(|key| Some(raw(column_name(key))))
                .collect();
            parts.push(Some(seq(vec![
                raw("RETURNING "),
                join_fragments(columns, raw(", ")),
            ])));
        }
        Ok(join_fragments(parts, raw(" ")))
    }
}

/// A DELETE guarded against running unfiltered. The guard drops on the first
/// filter, or explicitly via [`RemoveQuery::allow_delete_all`].
#[derive(Debug, Clone)]
pub struct RemoveQuery {
    data: QueryData,
    protect: bool,
    returning: Vec<String>,
}

/// Start a DELETE over a model, guarded.
pub fn remove(model: &ModelRef) -> RemoveQuery {
    RemoveQuery {
        data: QueryData::empty(model.clone()),
        protect: true,
        returning: Vec::new(),
    }
}

impl RemoveQuery {
    pub fn filter(self, clause: impl Into<Clause>) -> Result<Self, QueryError> {
        Ok(Self {
            data: add_where_clause(self.data, clause.into())?,
            protect: false,
            ..self
        })
    }

    /// Opt in to deleting every row of the table.
    pub fn allow_delete_all(mut self) -> Self {
        self.protect = false;
        self
    }

    /// Return the named columns of every deleted row.
    pub fn returning(mut self, keys: &[&str]) -> Self {
        self.returning = keys.iter().map(|key| key.to_string()).collect();
        self
    }

    pub async fn execute(&self, db: &dyn DatabaseClient) -> Result<Vec<Row>, QueryError> {
        let (sql, values) = self.to_sql()?;
        crate::trace_log!(sql = %sql, "executing delete");
        db.execute(&sql, &values).await
    }
}

impl WriteStatement for RemoveQuery {
    fn to_fragment(&self) -> Result<Fragment, QueryError> {
        // Refuse before any SQL exists.
        if self.protect {
            return Err(QueryError::UnsafeDelete {
                table: table_name(&self.data.model),
            });
        }
        let mut parts = vec![
            Some(raw(format!(
                "DELETE FROM {} AS {}",
                table_name(&self.data.model),
                quote_ident(&self.data.id)
            ))),
            where_to_sql(&self.data.wheres),
        ];
        if !self.returning.is_empty() {
            for key in &self.returning {
                self.data.model.field(key)?;
            }
            let columns = self
                .returning
                .iter()
                .map(|key| Some(raw(column_name(key))))
                .collect();
            parts.push(Some(seq(vec![
                raw("RETURNING "),
                join_fragments(columns, raw(", ")),
            ])));
        }
        Ok(join_fragments(parts, raw(" ")))
    }
}

/// Run several write statements as one transaction. Every statement renders
/// before anything is sent, so guard errors surface with no SQL issued; the
/// statements then execute sequentially inside `BEGIN`/`COMMIT` and any
/// failure rolls the whole batch back. Returns each statement's rows.
pub async fn transact(
    db: &dyn DatabaseClient,
    statements: &[&dyn WriteStatement],
) -> Result<Vec<Vec<Row>>, QueryError> {
    let mut rendered = Vec::with_capacity(statements.len());
    for statement in statements {
        rendered.push(statement.to_sql()?);
    }

    db.execute("BEGIN", &[]).await?;
    let mut results = Vec::with_capacity(rendered.len());
    for (sql, values) in rendered {
        crate::trace_log!(sql = %sql, "executing transaction statement");
        match db.execute(&sql, &values).await {
            Ok(rows) => results.push(rows),
            Err(err) => {
                db.execute("ROLLBACK", &[]).await?;
                return Err(err);
            }
        }
    }
    db.execute("COMMIT", &[]).await?;
    Ok(results)
}
