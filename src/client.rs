//! Postgres-backed [`DatabaseClient`]
//!
//! Bridges the engine's JSON-shaped values onto sqlx. Binding goes by JSON
//! variant; decoding goes by the column's Postgres type name, so result rows
//! come back as plain JSON maps without per-model decode code.
//!
//! Transactions arrive as literal `BEGIN`/`COMMIT`/`ROLLBACK` statements. A
//! `BEGIN` pins one pooled connection inside the client and every following
//! statement runs on that same session until the transaction ends; otherwise
//! each statement through the pool could land on a different connection and
//! the transaction would not be atomic. Statements without bound values go
//! through the simple query protocol, which also accepts `;`-joined batches
//! (the prepared protocol takes exactly one command).

use async_trait::async_trait;
use config::DatabaseConfig;
use query_engine::{DatabaseClient, QueryError, Row};
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgDatabaseError, PgErrorPosition, PgPoolOptions, PgRow};
use sqlx::{Column, Executor, PgPool, Postgres, Row as _, TypeInfo};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::errors::QueryHausError;

/// Pooled Postgres connection implementing the engine's client seam.
///
/// The client serializes statements while a transaction is open; concurrent
/// callers share the transaction the way they would share the original's
/// single connection.
pub struct PgClient {
    pool: PgPool,
    transaction: Mutex<Option<PoolConnection<Postgres>>>,
}

impl PgClient {
    /// Connect a pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, QueryHausError> {
        let mut pool_options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds));

        if config.max_lifetime_seconds > 0 {
            pool_options =
                pool_options.max_lifetime(Duration::from_secs(config.max_lifetime_seconds));
        }

        let pool = pool_options.connect(&config.connection_string()).await?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            transaction: Mutex::new(None),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DatabaseClient for PgClient {
    async fn execute(&self, sql: &str, values: &[Value]) -> Result<Vec<Row>, QueryError> {
        crate::debug_log!(sql = %sql, "executing statement");

        let mut transaction = self.transaction.lock().await;
        match statement_boundary(sql) {
            Boundary::Begin => {
                let mut conn = self
                    .pool
                    .acquire()
                    .await
                    .map_err(|e| database_error(e, sql, values))?;
                let result = run_statement(&mut *conn, sql, values).await;
                if result.is_ok() {
                    *transaction = Some(conn);
                }
                result
            }
            Boundary::End => {
                let result = match transaction.as_mut() {
                    Some(conn) => run_statement(&mut **conn, sql, values).await,
                    None => {
                        let mut conn = self
                            .pool
                            .acquire()
                            .await
                            .map_err(|e| database_error(e, sql, values))?;
                        run_statement(&mut *conn, sql, values).await
                    }
                };
                // Dropping the pinned connection returns it to the pool.
                *transaction = None;
                result
            }
            Boundary::Other => match transaction.as_mut() {
                Some(conn) => run_statement(&mut **conn, sql, values).await,
                None => {
                    let mut conn = self
                        .pool
                        .acquire()
                        .await
                        .map_err(|e| database_error(e, sql, values))?;
                    run_statement(&mut *conn, sql, values).await
                }
            },
        }
    }

    async fn close(&self) -> Result<(), QueryError> {
        *self.transaction.lock().await = None;
        self.pool.close().await;
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
enum Boundary {
    Begin,
    End,
    Other,
}

fn statement_boundary(sql: &str) -> Boundary {
    let command = sql.trim();
    if command.eq_ignore_ascii_case("BEGIN") {
        Boundary::Begin
    } else if command.eq_ignore_ascii_case("COMMIT") || command.eq_ignore_ascii_case("ROLLBACK") {
        Boundary::End
    } else {
        Boundary::Other
    }
}

async fn run_statement(
    conn: &mut sqlx::PgConnection,
    sql: &str,
    values: &[Value],
) -> Result<Vec<Row>, QueryError> {
    let rows = if values.is_empty() {
        conn.fetch_all(sqlx::raw_sql(sql)).await
    } else {
        let mut query = sqlx::query(sql);
        for value in values {
            query = match value {
                Value::Null => query.bind(None::<String>),
                Value::Bool(b) => query.bind(*b),
                Value::String(s) => query.bind(s.clone()),
                Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        query.bind(i)
                    } else if let Some(f) = n.as_f64() {
                        query.bind(f)
                    } else {
                        query.bind(n.to_string())
                    }
                }
                // Arrays and objects travel as JSONB payloads.
                other => query.bind(other.clone()),
            };
        }
        conn.fetch_all(query).await
    }
    .map_err(|e| database_error(e, sql, values))?;

    rows.iter().map(decode_row).collect()
}

fn database_error(error: sqlx::Error, sql: &str, values: &[Value]) -> QueryError {
    let mut annotated = sql.to_string();
    let message = match &error {
        sqlx::Error::Database(db) => {
            if let Some(PgErrorPosition::Original(position)) =
                db.try_downcast_ref::<PgDatabaseError>().and_then(|pg| pg.position())
            {
                annotated = annotate_position(sql, position);
            }
            db.message().to_string()
        }
        other => other.to_string(),
    };
    QueryError::Database {
        message,
        sql: annotated,
        values: values.to_vec(),
    }
}

/// Mark the server-reported error position inside the statement text.
/// Postgres reports a 1-based character index.
fn annotate_position(sql: &str, position: usize) -> String {
    let index = sql
        .char_indices()
        .map(|(i, _)| i)
        .nth(position.saturating_sub(1))
        .unwrap_or(sql.len());
    format!("{} >>> {}", &sql[..index], &sql[index..])
}

fn decode_row(row: &PgRow) -> Result<Row, QueryError> {
    let mut out = Row::new();
    for column in row.columns() {
        let name = column.name();
        out.insert(name.to_string(), decode_column(row, column.ordinal(), name, column.type_info().name())?);
    }
    Ok(out)
}

fn decode_column(
    row: &PgRow,
    index: usize,
    name: &str,
    type_name: &str,
) -> Result<Value, QueryError> {
    let decode_err = |e: sqlx::Error| QueryError::decode(name, e.to_string());

    let value = match type_name {
        "TEXT" | "VARCHAR" | "NAME" | "BPCHAR" => row
            .try_get::<Option<String>, _>(index)
            .map_err(decode_err)?
            .map(Value::String),
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)
            .map_err(decode_err)?
            .map(Value::Bool),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .map_err(decode_err)?
            .map(|v| Value::from(v as i64)),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)
            .map_err(decode_err)?
            .map(|v| Value::from(v as i64)),
        "INT8" => row
            .try_get::<Option<i64>, _>(index)
            .map_err(decode_err)?
            .map(Value::from),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)
            .map_err(decode_err)?
            .and_then(|v| serde_json::Number::from_f64(v as f64).map(Value::Number)),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)
            .map_err(decode_err)?
            .and_then(|v| serde_json::Number::from_f64(v).map(Value::Number)),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(index)
            .map_err(decode_err)?
            .map(|v| Value::String(v.to_string())),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .map_err(decode_err)?
            .map(|v| Value::String(v.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .map_err(decode_err)?
            .map(|v| Value::String(v.to_rfc3339())),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .map_err(decode_err)?
            .map(|v| Value::String(v.to_string())),
        "JSON" | "JSONB" => row
            .try_get::<Option<Value>, _>(index)
            .map_err(decode_err)?,
        "TEXT[]" | "VARCHAR[]" => row
            .try_get::<Option<Vec<String>>, _>(index)
            .map_err(decode_err)?
            .map(|v| Value::Array(v.into_iter().map(Value::String).collect())),
        "UUID[]" => row
            .try_get::<Option<Vec<uuid::Uuid>>, _>(index)
            .map_err(decode_err)?
            .map(|v| {
                Value::Array(v.into_iter().map(|u| Value::String(u.to_string())).collect())
            }),
        other => {
            return Err(QueryError::decode(
                name,
                format!("unsupported column type {other}"),
            ))
        }
    };

    Ok(value.unwrap_or(Value::Null))
}
