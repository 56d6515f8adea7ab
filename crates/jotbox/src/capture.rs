//! Note capture: create new pending items.
//!
//! Capture is the only path that writes content; triage and approval
//! never touch the body.

use anyhow::{bail, Result};
use std::sync::Arc;

use jotbox_core::models::{Bucket, Item};
use jotbox_core::store::ItemStore;

use crate::config::Config;
use crate::sqlite_store::{self, SqliteItemStore};

pub async fn run_add(
    config: &Config,
    text: &str,
    bucket: Option<String>,
    owner: Option<String>,
) -> Result<()> {
    if text.trim().is_empty() {
        bail!("note body must not be empty");
    }
    let bucket: Option<Bucket> = bucket
        .map(|b| b.parse().map_err(|e: String| anyhow::anyhow!(e)))
        .transpose()?;
    let owner = owner.unwrap_or_else(|| config.capture.owner.clone());

    let pool = sqlite_store::open_pool(&config.db).await?;
    let store: Arc<dyn ItemStore> = Arc::new(SqliteItemStore::new(pool.clone()));

    let mut item = Item::new(owner, text);
    item.bucket = bucket;
    store.insert(&item).await?;

    println!("captured {}", item.id);
    println!("  owner: {}", item.owner);
    if let Some(bucket) = item.bucket {
        println!("  bucket: {}", bucket);
    }
    println!("  state: {}", item.status());
    println!("ok");

    pool.close().await;
    Ok(())
}
