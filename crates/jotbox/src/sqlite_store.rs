//! SQLite-backed [`ItemStore`] implementation.
//!
//! One row per item. The suggestion travels in a JSON document column
//! (`suggestion_json`) that is non-null exactly when `triage_state` is
//! `awaiting_approval`; the typed state machine in `jotbox-core` is the
//! source of that invariant, this module only round-trips it.
//!
//! Conditional updates are a single `UPDATE … WHERE id = ? AND
//! triage_state = ?`; a zero rows-affected result is disambiguated into
//! [`Error::NotFound`] vs [`Error::Conflict`] with a follow-up read.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::time::Duration;

use jotbox_core::classifier::ContextExample;
use jotbox_core::error::Error;
use jotbox_core::models::{Item, TriageState, TriageStatus};
use jotbox_core::store::ItemStore;

use crate::config::DbConfig;

const ITEM_COLUMNS: &str = "id, owner, body, content_json, bucket, category, kind, summary, \
                            tags_json, confidence, triage_state, suggestion_json, triaged_at, \
                            created_at, updated_at";

/// Opens the pool for the configured database file, creating the file and
/// its parent directories on first use. WAL mode keeps `jot serve` and a
/// cron-driven `jot triage` from blocking each other; the busy timeout
/// absorbs the short write locks WAL still takes.
pub async fn open_pool(config: &DbConfig) -> anyhow::Result<SqlitePool> {
    if let Some(dir) = config.path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating database directory {}", dir.display()))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("opening database {}", config.path.display()))
}

/// SQLite implementation of the [`ItemStore`] trait.
pub struct SqliteItemStore {
    pool: SqlitePool,
}

impl SqliteItemStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn db_err(e: sqlx::Error) -> Error {
    Error::Store(anyhow::Error::from(e))
}

fn parse_ts(ts: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| Error::Store(anyhow!("timestamp out of range: {}", ts)))
}

fn row_to_item(row: &SqliteRow) -> Result<Item, Error> {
    let id: String = row.get("id");

    let state_str: String = row.get("triage_state");
    let state = match state_str.as_str() {
        "pending" => TriageState::Pending,
        "failed" => TriageState::Failed,
        "awaiting_approval" => {
            let json: Option<String> = row.get("suggestion_json");
            let json = json.ok_or_else(|| {
                Error::Store(anyhow!("item {} is awaiting approval without a suggestion", id))
            })?;
            let suggestion = serde_json::from_str(&json)
                .map_err(|e| Error::Store(anyhow!("item {}: bad suggestion_json: {}", id, e)))?;
            TriageState::AwaitingApproval { suggestion }
        }
        "done" => {
            let ts: Option<i64> = row.get("triaged_at");
            let ts = ts
                .ok_or_else(|| Error::Store(anyhow!("item {} is done without triaged_at", id)))?;
            TriageState::Done {
                triaged_at: parse_ts(ts)?,
            }
        }
        other => {
            return Err(Error::Store(anyhow!(
                "item {}: unknown triage_state '{}'",
                id,
                other
            )));
        }
    };

    let bucket: Option<String> = row.get("bucket");
    let kind: Option<String> = row.get("kind");
    let tags_json: String = row.get("tags_json");

    Ok(Item {
        id,
        owner: row.get("owner"),
        body: row.get("body"),
        content_json: row.get("content_json"),
        bucket: bucket
            .map(|b| b.parse().map_err(|e: String| Error::Store(anyhow!(e))))
            .transpose()?,
        category: row.get("category"),
        kind: kind
            .map(|k| k.parse().map_err(|e: String| Error::Store(anyhow!(e))))
            .transpose()?,
        summary: row.get("summary"),
        tags: serde_json::from_str(&tags_json)
            .map_err(|e| Error::Store(anyhow!("bad tags_json: {}", e)))?,
        confidence: row.get("confidence"),
        state,
        created_at: parse_ts(row.get("created_at"))?,
        updated_at: parse_ts(row.get("updated_at"))?,
    })
}

fn suggestion_json(item: &Item) -> Result<Option<String>, Error> {
    item.suggestion()
        .map(|s| serde_json::to_string(s))
        .transpose()
        .map_err(|e| Error::Store(anyhow::Error::from(e)))
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    async fn insert(&self, item: &Item) -> Result<(), Error> {
        let tags = serde_json::to_string(&item.tags).map_err(anyhow::Error::from)?;
        sqlx::query(
            r#"
            INSERT INTO items (id, owner, body, content_json, bucket, category, kind, summary,
                               tags_json, confidence, triage_state, suggestion_json, triaged_at,
                               created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.owner)
        .bind(&item.body)
        .bind(&item.content_json)
        .bind(item.bucket.map(|b| b.as_str()))
        .bind(&item.category)
        .bind(item.kind.map(|k| k.as_str()))
        .bind(&item.summary)
        .bind(&tags)
        .bind(item.confidence)
        .bind(item.status().as_str())
        .bind(suggestion_json(item)?)
        .bind(item.triaged_at().map(|t| t.timestamp()))
        .bind(item.created_at.timestamp())
        .bind(item.updated_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Item, Error> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        row_to_item(&row)
    }

    async fn update(&self, item: &Item, expected: TriageStatus) -> Result<Item, Error> {
        let tags = serde_json::to_string(&item.tags).map_err(anyhow::Error::from)?;
        let result = sqlx::query(
            r#"
            UPDATE items SET
                owner = ?, body = ?, content_json = ?, bucket = ?, category = ?, kind = ?,
                summary = ?, tags_json = ?, confidence = ?, triage_state = ?,
                suggestion_json = ?, triaged_at = ?, updated_at = ?
            WHERE id = ? AND triage_state = ?
            "#,
        )
        .bind(&item.owner)
        .bind(&item.body)
        .bind(&item.content_json)
        .bind(item.bucket.map(|b| b.as_str()))
        .bind(&item.category)
        .bind(item.kind.map(|k| k.as_str()))
        .bind(&item.summary)
        .bind(&tags)
        .bind(item.confidence)
        .bind(item.status().as_str())
        .bind(suggestion_json(item)?)
        .bind(item.triaged_at().map(|t| t.timestamp()))
        .bind(item.updated_at.timestamp())
        .bind(&item.id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            // Disambiguate: row missing, or state moved under us?
            let found: Option<String> =
                sqlx::query_scalar("SELECT triage_state FROM items WHERE id = ?")
                    .bind(&item.id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(db_err)?;
            return match found {
                None => Err(Error::NotFound(item.id.clone())),
                Some(state) => Err(Error::Conflict {
                    id: item.id.clone(),
                    found: state
                        .parse()
                        .map_err(|e: String| Error::Store(anyhow!(e)))?,
                }),
            };
        }

        self.get(&item.id).await
    }

    async fn list_pending(&self, limit: usize, ids: Option<&[String]>) -> Result<Vec<Item>, Error> {
        let mut sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE triage_state = 'pending'"
        );
        if let Some(ids) = ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; ids.len()].join(", ");
            sql.push_str(&format!(" AND id IN ({placeholders})"));
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(ids) = ids {
            for id in ids {
                query = query.bind(id);
            }
        }
        let rows = query
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(row_to_item).collect()
    }

    async fn recent_done(
        &self,
        owner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ContextExample>, Error> {
        let mut sql = String::from(
            "SELECT body, bucket, category, kind FROM items WHERE triage_state = 'done'",
        );
        if owner.is_some() {
            sql.push_str(" AND owner = ?");
        }
        sql.push_str(" ORDER BY triaged_at DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(owner) = owner {
            query = query.bind(owner);
        }
        let rows = query
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                let bucket: Option<String> = row.get("bucket");
                let kind: Option<String> = row.get("kind");
                Ok(ContextExample {
                    body: row.get("body"),
                    bucket: bucket
                        .map(|b| b.parse().map_err(|e: String| Error::Store(anyhow!(e))))
                        .transpose()?,
                    category: row.get("category"),
                    kind: kind
                        .map(|k| k.parse().map_err(|e: String| Error::Store(anyhow!(e))))
                        .transpose()?,
                })
            })
            .collect()
    }

    async fn list(&self, status: Option<TriageStatus>, limit: usize) -> Result<Vec<Item>, Error> {
        let mut sql = format!("SELECT {ITEM_COLUMNS} FROM items");
        if status.is_some() {
            sql.push_str(" WHERE triage_state = ?");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }
        let rows = query
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(row_to_item).collect()
    }
}
