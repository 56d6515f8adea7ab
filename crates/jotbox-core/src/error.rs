//! Error taxonomy for the triage core.

use crate::models::TriageStatus;

/// Errors surfaced by stores, the triage runner, and the approval
/// service.
///
/// `NotFound`, `InvalidState`, and `Conflict` are caller-visible
/// conditions with distinct handling: a missing id is never retried, an
/// invalid state is a caller logic error, and a conflict means another
/// process already moved the item. `Classification` is recovered locally
/// by the batch runner (the item is marked failed and the batch
/// continues).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("item not found: {0}")]
    NotFound(String),

    #[error("item {id} is {found}, expected {expected}")]
    InvalidState {
        id: String,
        found: TriageStatus,
        expected: TriageStatus,
    },

    #[error("item {id} changed state concurrently (now {found})")]
    Conflict { id: String, found: TriageStatus },

    #[error("classification failed: {0}")]
    Classification(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
