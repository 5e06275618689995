//! # QueryHaus
//!
//! A typed query-composition layer for PostgreSQL: composable immutable query
//! descriptors, injection-safe SQL fragment assembly, nested JSON selections,
//! and a transactional write pipeline, plus schema bootstrap, migrations, and
//! a dependency-aware seed scheduler.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use queryhaus::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let db = PgClient::connect(&config.database).await?;
//!
//!     let user = Model::new(
//!         "User",
//!         vec![("id", model::generated_id()), ("name", model::text())],
//!     );
//!
//!     let record = Row::from_iter([("name".to_string(), json!("Sam"))]);
//!     let inserted = insert(&user, record).execute(&db).await?;
//!
//!     let rows = select(&user, &["name"])?
//!         .filter(Filter::new().field("id", inserted["id"].clone()))?
//!         .get(&db)
//!         .await?;
//!     println!("found: {rows:?}");
//!
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
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

pub mod client;
pub mod errors;
pub mod migration;
pub mod prelude;
pub mod schema;
pub mod seeds;

// Re-export the main public types for convenience
pub use client::PgClient;
pub use errors::QueryHausError;
pub use migration::{migrate, Migration, MigrationFn};
pub use schema::{build_schema_and_seed, reset_and_seed, SchemaBasis};
pub use seeds::{run_seeds, Seed, SeedContext, SeedFn};

// Re-export centralized config
pub use config::{AppConfig, DatabaseConfig};

// Re-export the engine crate and its core surface
pub use query_engine;
pub use query_engine::{
    count, insert, insert_all, make_index, page, remove, select, subselect, transact, update,
    DatabaseClient, Filter, Fragment, Model, ModelRef, PageOptions, Query, QueryError, Row,
    Selector, SortOrder,
};

// Re-export external dependencies used in public API
pub use async_trait;
pub use sqlx;
