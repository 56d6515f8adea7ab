//! Approval service: commit or discard AI suggestions on user decision.
//!
//! Both operations are single-item, single-conditional-write. Bulk
//! approval, where a surface offers it, is just a loop over
//! [`Approvals::approve`] — there is no batch primitive here.

use std::sync::Arc;

use crate::error::Error;
use crate::models::{Item, Overrides, TriageStatus};
use crate::store::ItemStore;

/// Applies user decisions to items in `awaiting_approval`.
pub struct Approvals {
    store: Arc<dyn ItemStore>,
}

impl Approvals {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    /// Commit the suggestion into the authoritative fields, with any
    /// user-supplied overrides winning field-by-field. The item must be
    /// in `awaiting_approval`.
    pub async fn approve(&self, id: &str, overrides: &Overrides) -> Result<Item, Error> {
        let mut item = self.store.get(id).await?;
        item.apply_approval(overrides)?;
        let stored = self
            .store
            .update(&item, TriageStatus::AwaitingApproval)
            .await?;
        tracing::info!(item_id = %stored.id, bucket = ?stored.bucket, "suggestion approved");
        Ok(stored)
    }

    /// Discard the suggestion, leaving the authoritative fields exactly
    /// as they were before triage. The item must be in
    /// `awaiting_approval`.
    pub async fn reject(&self, id: &str) -> Result<Item, Error> {
        let mut item = self.store.get(id).await?;
        item.apply_rejection()?;
        let stored = self
            .store
            .update(&item, TriageStatus::AwaitingApproval)
            .await?;
        tracing::info!(item_id = %stored.id, "suggestion rejected");
        Ok(stored)
    }

    /// Move a `failed` item back to `pending` so the next triage pass
    /// picks it up. This is the external retry mechanism; nothing resets
    /// items automatically.
    pub async fn reset(&self, id: &str) -> Result<Item, Error> {
        let mut item = self.store.get(id).await?;
        item.reset()?;
        let stored = self.store.update(&item, TriageStatus::Failed).await?;
        tracing::info!(item_id = %stored.id, "item reset to pending");
        Ok(stored)
    }
}
