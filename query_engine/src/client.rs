//! Database client seam
//!
//! The engine never talks to a socket itself. It renders SQL plus positional
//! values and hands both to a [`DatabaseClient`] implementation; results come
//! back as JSON-shaped rows so selectors can decode them uniformly.

use crate::error::QueryError;
use async_trait::async_trait;
use serde_json::Value;

/// One result row: selected-field key to decoded value.
pub type Row = serde_json::Map<String, Value>;

/// The connection/transport collaborator the engine executes through.
///
/// Transactions are driven with literal `BEGIN`/`COMMIT`/`ROLLBACK`
/// statements sent through [`execute`](DatabaseClient::execute). The client
/// owns retry and timeout policy; the engine never retries.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Execute one statement (or `;`-joined batch) with bound positional
    /// values and return its rows.
    async fn execute(&self, sql: &str, values: &[Value]) -> Result<Vec<Row>, QueryError>;

    /// Release the underlying connection.
    async fn close(&self) -> Result<(), QueryError> {
        Ok(())
    }
}
