//! Error types for the QueryHaus crate
//!
//! This module contains all error types that can be returned by QueryHaus operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryHausError {
    #[error("Database connection error: {0}")]
    DatabaseConnection(#[from] sqlx::Error),

    #[error(transparent)]
    Query(#[from] query_engine::QueryError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("Migration failed: {id}: {message}")]
    Migration { id: String, message: String },

    #[error("Seed failed: {name}: {message}")]
    Seed { name: String, message: String },
}
