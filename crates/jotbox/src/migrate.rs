use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::sqlite_store;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = sqlite_store::open_pool(&config.db).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Idempotent schema creation, shared by the CLI `init` command and the
/// store tests.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            body TEXT NOT NULL,
            content_json TEXT,
            bucket TEXT,
            category TEXT,
            kind TEXT,
            summary TEXT,
            tags_json TEXT NOT NULL DEFAULT '[]',
            confidence REAL,
            triage_state TEXT NOT NULL DEFAULT 'pending',
            suggestion_json TEXT,
            triaged_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_items_state_created ON items(triage_state, created_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_items_owner_triaged ON items(owner, triaged_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
