//! Review-side CLI commands: list, show, triage, approve, reject, reset.
//!
//! Each command builds its collaborators (pool, store, classifier,
//! engine) for the duration of the invocation — there is no persistent
//! background worker; a cron-driven `jot triage` is the scheduling model.

use anyhow::Result;
use std::sync::Arc;

use jotbox_core::approval::Approvals;
use jotbox_core::models::{Item, Overrides, TriageStatus};
use jotbox_core::store::ItemStore;
use jotbox_core::triage::{TriageEngine, TriageOptions};

use crate::classifier::create_classifier;
use crate::config::Config;
use crate::sqlite_store::{self, SqliteItemStore};

fn parse_status(s: &str) -> Result<TriageStatus> {
    s.parse().map_err(|e: String| anyhow::anyhow!(e))
}

fn print_item_line(item: &Item) {
    let snippet: String = item.body.chars().take(48).collect();
    let bucket = item
        .bucket
        .map(|b| b.as_str().to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}  {:<18} {:<10} {}",
        item.id,
        item.status(),
        bucket,
        snippet
    );
}

fn print_item_detail(item: &Item) {
    println!("id: {}", item.id);
    println!("owner: {}", item.owner);
    println!("state: {}", item.status());
    if let Some(bucket) = item.bucket {
        println!("bucket: {}", bucket);
    }
    if let Some(category) = &item.category {
        println!("category: {}", category);
    }
    if let Some(kind) = item.kind {
        println!("kind: {}", kind);
    }
    if let Some(summary) = &item.summary {
        println!("summary: {}", summary);
    }
    if !item.tags.is_empty() {
        println!("tags: {}", item.tags.join(", "));
    }
    if let Some(confidence) = item.confidence {
        println!("confidence: {:.2}", confidence);
    }
    if let Some(triaged_at) = item.triaged_at() {
        println!("triaged_at: {}", triaged_at.format("%Y-%m-%dT%H:%M:%SZ"));
    }
    if let Some(suggestion) = item.suggestion() {
        println!("suggestion:");
        println!(
            "  bucket: {}",
            suggestion
                .bucket
                .map(|b| b.as_str().to_string())
                .unwrap_or_else(|| "-".to_string())
        );
        println!("  category: {}", suggestion.category.as_deref().unwrap_or("-"));
        println!(
            "  kind: {}",
            suggestion
                .kind
                .map(|k| k.as_str().to_string())
                .unwrap_or_else(|| "-".to_string())
        );
        println!("  summary: {}", suggestion.summary.as_deref().unwrap_or("-"));
        if !suggestion.tags.is_empty() {
            println!("  tags: {}", suggestion.tags.join(", "));
        }
        if let Some(confidence) = suggestion.confidence {
            println!("  confidence: {:.2}", confidence);
        }
    }
    println!();
    println!("{}", item.body);
}

pub async fn run_list(config: &Config, state: Option<String>, limit: usize) -> Result<()> {
    let status = state.as_deref().map(parse_status).transpose()?;
    let pool = sqlite_store::open_pool(&config.db).await?;
    let store = SqliteItemStore::new(pool.clone());

    let items = store.list(status, limit).await?;
    for item in &items {
        print_item_line(item);
    }
    println!("{} item(s)", items.len());

    pool.close().await;
    Ok(())
}

pub async fn run_show(config: &Config, id: &str) -> Result<()> {
    let pool = sqlite_store::open_pool(&config.db).await?;
    let store = SqliteItemStore::new(pool.clone());

    let item = store.get(id).await?;
    print_item_detail(&item);

    pool.close().await;
    Ok(())
}

pub async fn run_triage(config: &Config, ids: Vec<String>, limit: Option<usize>) -> Result<()> {
    let pool = sqlite_store::open_pool(&config.db).await?;
    let store: Arc<dyn ItemStore> = Arc::new(SqliteItemStore::new(pool.clone()));
    let classifier = create_classifier(&config.classifier)?;

    let opts = TriageOptions {
        batch_size: limit.unwrap_or(config.triage.batch_size),
        context_limit: config.triage.context_limit,
    };
    let engine = TriageEngine::new(store, classifier, opts);

    let ids = if ids.is_empty() { None } else { Some(ids) };
    let report = engine.triage_batch(ids.as_deref()).await?;

    println!("triage");
    println!("  processed: {}", report.processed);
    println!("  succeeded: {}", report.succeeded);
    println!("  failed: {}", report.failed);
    println!("ok");

    pool.close().await;
    Ok(())
}

pub async fn run_approve(
    config: &Config,
    id: &str,
    bucket: Option<String>,
    category: Option<String>,
    kind: Option<String>,
) -> Result<()> {
    let overrides = Overrides {
        bucket: bucket
            .map(|b| b.parse().map_err(|e: String| anyhow::anyhow!(e)))
            .transpose()?,
        category,
        kind: kind
            .map(|k| k.parse().map_err(|e: String| anyhow::anyhow!(e)))
            .transpose()?,
    };

    let pool = sqlite_store::open_pool(&config.db).await?;
    let approvals = Approvals::new(Arc::new(SqliteItemStore::new(pool.clone())));

    let item = approvals.approve(id, &overrides).await?;
    println!("approved {}", item.id);
    print_item_detail(&item);

    pool.close().await;
    Ok(())
}

pub async fn run_reject(config: &Config, id: &str) -> Result<()> {
    let pool = sqlite_store::open_pool(&config.db).await?;
    let approvals = Approvals::new(Arc::new(SqliteItemStore::new(pool.clone())));

    let item = approvals.reject(id).await?;
    println!("rejected {}", item.id);
    println!("  state: {}", item.status());

    pool.close().await;
    Ok(())
}

pub async fn run_reset(config: &Config, id: &str) -> Result<()> {
    let pool = sqlite_store::open_pool(&config.db).await?;
    let approvals = Approvals::new(Arc::new(SqliteItemStore::new(pool.clone())));

    let item = approvals.reset(id).await?;
    println!("reset {}", item.id);
    println!("  state: {}", item.status());

    pool.close().await;
    Ok(())
}
