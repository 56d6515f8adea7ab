//! In-memory [`ItemStore`] implementation for testing.
//!
//! Uses a `HashMap` behind `std::sync::RwLock` for thread safety. The
//! conditional-update semantics match the SQLite backend exactly, so the
//! triage and approval tests exercise the same race behavior.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::classifier::ContextExample;
use crate::error::Error;
use crate::models::{Item, TriageStatus};

use super::ItemStore;

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, Item>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn insert(&self, item: &Item) -> Result<(), Error> {
        let mut items = self.items.write().unwrap();
        items.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Item, Error> {
        let items = self.items.read().unwrap();
        items
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn update(&self, item: &Item, expected: TriageStatus) -> Result<Item, Error> {
        let mut items = self.items.write().unwrap();
        let stored = items
            .get_mut(&item.id)
            .ok_or_else(|| Error::NotFound(item.id.clone()))?;
        if stored.status() != expected {
            return Err(Error::Conflict {
                id: item.id.clone(),
                found: stored.status(),
            });
        }
        *stored = item.clone();
        Ok(stored.clone())
    }

    async fn list_pending(&self, limit: usize, ids: Option<&[String]>) -> Result<Vec<Item>, Error> {
        let items = self.items.read().unwrap();
        let mut pending: Vec<Item> = items
            .values()
            .filter(|i| i.status() == TriageStatus::Pending)
            .filter(|i| ids.is_none_or(|ids| ids.iter().any(|id| *id == i.id)))
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn recent_done(
        &self,
        owner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ContextExample>, Error> {
        let items = self.items.read().unwrap();
        let mut done: Vec<&Item> = items
            .values()
            .filter(|i| i.status() == TriageStatus::Done)
            .filter(|i| owner.is_none_or(|o| i.owner == o))
            .collect();
        done.sort_by(|a, b| b.triaged_at().cmp(&a.triaged_at()));
        done.truncate(limit);
        Ok(done
            .into_iter()
            .map(|i| ContextExample {
                body: i.body.clone(),
                bucket: i.bucket,
                category: i.category.clone(),
                kind: i.kind,
            })
            .collect())
    }

    async fn list(&self, status: Option<TriageStatus>, limit: usize) -> Result<Vec<Item>, Error> {
        let items = self.items.read().unwrap();
        let mut out: Vec<Item> = items
            .values()
            .filter(|i| status.is_none_or(|s| i.status() == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit);
        Ok(out)
    }
}
