//! One-way migrations
//!
//! Migrations are named async functions. The whole run happens inside one
//! transaction: the ledger table is created if missing, already-recorded ids
//! are skipped, pending migrations run in id order, and any failure rolls the
//! entire run back so a half-applied set never persists.

use futures_util::future::BoxFuture;
use query_engine::DatabaseClient;
use serde_json::{json, Value};

use crate::errors::QueryHausError;

const MIGRATION_TABLE: &str = "__queryhaus__migrations";

pub type MigrationFn = for<'a> fn(&'a dyn DatabaseClient) -> BoxFuture<'a, Result<(), QueryHausError>>;

/// A named migration step; ids order the run and key the ledger.
pub struct Migration {
    pub id: String,
    pub run: MigrationFn,
}

impl Migration {
    pub fn new(id: impl Into<String>, run: MigrationFn) -> Self {
        Self { id: id.into(), run }
    }
}

/// Run all pending migrations; returns the ids that ran.
pub async fn migrate(
    db: &dyn DatabaseClient,
    migrations: Vec<Migration>,
) -> Result<Vec<String>, QueryHausError> {
    db.execute("BEGIN", &[]).await?;

    let result = migrate_inner(db, migrations).await;
    match result {
        Ok(ran) => {
            db.execute("COMMIT", &[]).await?;
            Ok(ran)
        }
        Err(err) => {
            db.execute("ROLLBACK", &[]).await?;
            Err(err)
        }
    }
}

async fn migrate_inner(
    db: &dyn DatabaseClient,
    mut migrations: Vec<Migration>,
) -> Result<Vec<String>, QueryHausError> {
    db.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {MIGRATION_TABLE} (\n\
             id text PRIMARY KEY NOT NULL,\n\
             \"transacted_at\" timestamp without time zone NOT NULL DEFAULT now()\n\
             )"
        ),
        &[],
    )
    .await?;

    let recorded: Vec<Value> = db
        .execute(&format!("SELECT id FROM {MIGRATION_TABLE}"), &[])
        .await?
        .into_iter()
        .filter_map(|row| row.get("id").cloned())
        .collect();

    migrations.retain(|migration| !recorded.contains(&json!(migration.id)));
    migrations.sort_by(|a, b| a.id.cmp(&b.id));

    let mut ran = Vec::with_capacity(migrations.len());
    for migration in migrations {
        (migration.run)(db)
            .await
            .map_err(|e| QueryHausError::Migration {
                id: migration.id.clone(),
                message: e.to_string(),
            })?;
        db.execute(
            &format!("INSERT INTO {MIGRATION_TABLE} (id) VALUES ($1)"),
            &[json!(migration.id)],
        )
        .await?;
        crate::debug_log!(id = %migration.id, "ran migration");
        ran.push(migration.id);
    }

    Ok(ran)
}
