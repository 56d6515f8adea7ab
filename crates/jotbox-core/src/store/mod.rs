//! Storage abstraction for Jotbox items.
//!
//! The [`ItemStore`] trait defines all persistence operations the triage
//! runner and approval service need, enabling pluggable backends (SQLite,
//! in-memory for tests).
//!
//! The only concurrency-control discipline is [`ItemStore::update`]'s
//! conditional write: a state-changing write names the status it expects
//! the stored row to still be in, and loses with [`Error::Conflict`] when
//! another process got there first. No locks, no multi-item transactions.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::classifier::ContextExample;
use crate::error::Error;
use crate::models::{Item, TriageStatus};

/// Abstract storage backend for items.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert a newly captured item.
    async fn insert(&self, item: &Item) -> Result<(), Error>;

    /// Fetch an item by id. [`Error::NotFound`] if the id does not exist.
    async fn get(&self, id: &str) -> Result<Item, Error>;

    /// Conditionally persist `item`: the write applies only if the stored
    /// row's status still equals `expected`. Returns the stored item, or
    /// [`Error::Conflict`] when the status no longer matches,
    /// [`Error::NotFound`] when the row is gone.
    async fn update(&self, item: &Item, expected: TriageStatus) -> Result<Item, Error>;

    /// Pending items, newest first, capped at `limit`. When `ids` is
    /// given, the result is the intersection of those ids with the
    /// pending set.
    async fn list_pending(&self, limit: usize, ids: Option<&[String]>) -> Result<Vec<Item>, Error>;

    /// Recently completed items, most-recent-first by `triaged_at`,
    /// capped at `limit`. `owner` of `None` spans all owners. Used as
    /// classifier context, not for display.
    async fn recent_done(
        &self,
        owner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ContextExample>, Error>;

    /// Items filtered by status (or all items), newest first, capped at
    /// `limit`. Listing surface for the CLI and HTTP API.
    async fn list(&self, status: Option<TriageStatus>, limit: usize) -> Result<Vec<Item>, Error>;
}
