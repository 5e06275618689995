//! Offset pagination
//!
//! One round trip per page: the source query becomes a CTE, the total row
//! count and the page slice are both selected from it, and the slice comes
//! back as a single JSON array.

use crate::client::{DatabaseClient, Row};
use crate::error::QueryError;
use crate::fragment::{bind, raw, render, seq};
use crate::query::Query;
use serde_json::Value;

#[derive(Debug, Clone, Copy)]
pub struct PageOptions {
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Clone)]
pub struct PageResult {
    /// Total rows matching the source query, ignoring the page window.
    pub total: i64,
    /// Whether rows exist past this page.
    pub has_more: bool,
    pub page: Vec<Row>,
}

/// Fetch one page of a query along with its total count.
pub async fn page(
    db: &dyn DatabaseClient,
    options: PageOptions,
    source: &Query,
) -> Result<PageResult, QueryError> {
    let fragment = seq(vec![
        raw("WITH data_query as ("),
        source.to_fragment(),
        raw(") SELECT (SELECT count(dqc.*) FROM data_query as dqc) as total_count, \
             (SELECT json_agg(dq.*) FROM (SELECT dql.* FROM data_query as dql LIMIT "),
        bind(options.limit),
        raw(" OFFSET "),
        bind(options.offset),
        raw(") as dq) as data"),
    ]);

    let (sql, values) = render(&fragment)?;
    crate::trace_log!(sql = %sql, "executing page query");
    let rows = db.execute(&sql, &values).await?;
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| QueryError::decode("total_count", "page query returned no row"))?;

    let total = row
        .get("total_count")
        .and_then(Value::as_i64)
        .ok_or_else(|| QueryError::decode("total_count", "expected an integer count"))?;

    // json_agg over zero rows is SQL NULL, not an empty array.
    let page = match row.get("data").cloned().unwrap_or(Value::Null) {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(source.decode_row(map)),
                other => Err(QueryError::decode(
                    "data",
                    format!("expected a row object, got {other}"),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?,
        other => {
            return Err(QueryError::decode(
                "data",
                format!("expected a JSON array, got {other}"),
            ))
        }
    };

    let has_more = options.offset + page.len() as i64 != total;
    Ok(PageResult {
        total,
        has_more,
        page,
    })
}
