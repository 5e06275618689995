//! Query Engine - Typed query composition for Postgres
//!
//! This crate builds SQL from immutable fragment trees: model descriptors,
//! a copy-on-write select builder with symbolic field resolution, a write
//! pipeline with transaction batching, and schema/index/search helpers.
//! Execution happens through the [`DatabaseClient`] seam; the engine itself
//! never opens a connection.

pub mod aggregate;
pub mod client;
pub mod error;
pub mod fragment;
pub mod index;
pub mod model;
pub mod operators;
pub mod page;
pub mod query;
pub mod reflect;
pub mod search;
pub mod symbolic;
pub mod writes;

pub use aggregate::count;
pub use client::{DatabaseClient, Row};
pub use error::QueryError;
pub use fragment::{bind, join_fragments, raw, render, render_literal, seq, Fragment};
pub use index::{make_index, IndexHandle};
pub use model::{FieldType, Model, ModelRef};
pub use operators::{
    any_of, any_of_expr, equal, gt, gte, is, is_not, lt, lte, not_equal, op, Expression, WhereOp,
};
pub use page::{page, PageOptions, PageResult};
pub use query::{
    select, subselect, Clause, Filter, FilterValue, Query, QueryData, SortOrder, SubQuery,
};
pub use reflect::{create_table_sql, foreign_keys_sql, sql_name, table_name};
pub use search::{
    maintain_weighted_tsv, match_tsv, search_extensions, tsv_search_rank, TsvOptions, Weight,
};
pub use symbolic::{ColumnSelector, Decode, FieldSymbol, ModelResolver, RelationSymbol, Selector};
pub use writes::{insert, insert_all, remove, transact, update, WriteStatement};

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

#[cfg(test)]
mod integration_tests;
