//! Schema bootstrap
//!
//! Builds the whole schema from model descriptors in dependency-safe order:
//! extensions, custom before-statements, tables, foreign keys, registered
//! indexes, custom after-statements, then seeds. `reset_and_seed` drops the
//! public schema first, for test databases and local development.

use query_engine::{render_literal, DatabaseClient, ModelRef};
use std::sync::Arc;

use crate::errors::QueryHausError;
use crate::seeds::{run_seeds, Seed};

/// Everything needed to build (or rebuild) a schema.
#[derive(Default)]
pub struct SchemaBasis {
    /// Raw statements run before tables exist (extensions, types).
    pub before: Vec<String>,
    /// Raw statements run after tables and indexes (triggers).
    pub after: Vec<String>,
    pub models: Vec<ModelRef>,
    pub seeds: Vec<Seed>,
}

/// Create tables, constraints, and indexes for all models, then seed.
pub async fn build_schema_and_seed(
    db: Arc<dyn DatabaseClient>,
    basis: SchemaBasis,
) -> Result<(), QueryHausError> {
    db.execute("CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\"", &[])
        .await?;

    for statement in &basis.before {
        db.execute(statement, &[]).await?;
    }

    for model in &basis.models {
        let sql = query_engine::create_table_sql(model);
        crate::debug_log!(model = %model.name(), "creating table");
        db.execute(&sql, &[]).await?;
    }

    // Foreign keys run after every table exists, so reference order between
    // models never matters.
    let mut foreign_keys = Vec::new();
    for model in &basis.models {
        foreign_keys.extend(query_engine::foreign_keys_sql(model)?);
    }
    if !foreign_keys.is_empty() {
        db.execute(&foreign_keys.join(";\n"), &[]).await?;
    }

    let mut indexes = Vec::new();
    for model in &basis.models {
        for fragment in model.indexes() {
            indexes.push(render_literal(&fragment)?);
        }
    }
    if !indexes.is_empty() {
        db.execute(&indexes.join(";\n"), &[]).await?;
    }

    for statement in &basis.after {
        db.execute(statement, &[]).await?;
    }

    run_seeds(db, basis.seeds).await
}

/// Drop and recreate the public schema, then build and seed.
pub async fn reset_and_seed(
    db: Arc<dyn DatabaseClient>,
    basis: SchemaBasis,
) -> Result<(), QueryHausError> {
    db.execute("drop schema public cascade; create schema public", &[])
        .await?;
    build_schema_and_seed(db, basis).await
}
