//! Convenience re-exports for common QueryHaus usage
//!
//! This prelude module re-exports the most commonly used items from the QueryHaus ecosystem,
//! making it easier to import everything you need with a single use statement.
//!
//! # Example
//!
//! ```rust
//! use queryhaus::prelude::*;
//!
//! // Now you have access to all the common QueryHaus types and traits
//! ```

// Core QueryHaus components
pub use crate::client::PgClient;
pub use crate::errors::QueryHausError;
pub use crate::migration::{migrate, Migration};
pub use crate::schema::{build_schema_and_seed, reset_and_seed, SchemaBasis};
pub use crate::seeds::{run_seeds, Seed, SeedContext};

// Re-export centralized config
pub use config::{AppConfig, DatabaseConfig};

// Query engine surface
pub use query_engine::model;
pub use query_engine::operators::{
    any_of, any_of_expr, equal, gt, gte, is, is_not, lt, lte, not_equal, op,
};
pub use query_engine::{
    count, insert, insert_all, make_index, maintain_weighted_tsv, match_tsv, page, remove, select,
    subselect, transact, tsv_search_rank, update, Clause, DatabaseClient, Filter, Fragment, Model,
    ModelRef, PageOptions, PageResult, Query, QueryError, Row, Selector, SortOrder, TsvOptions,
    Weight, WriteStatement,
};

// Common external dependencies
pub use async_trait;
pub use serde_json;
pub use sqlx;
pub use tokio;

// Commonly used sqlx types
pub use sqlx::PgPool;
