//! # Jotbox Core
//!
//! Runtime-agnostic logic for Jotbox: the item model, the triage state
//! machine, the store and classifier abstractions, the batch triage
//! runner, and the approval workflow.
//!
//! This crate contains no tokio, sqlx, network I/O, or other
//! runtime-specific dependencies; the SQLite store and the OpenAI
//! classifier client live in the `jotbox` runtime crate.
//!
//! ## Lifecycle
//!
//! ```text
//!            classify ok                 approve / reject
//! pending ───────────────▶ awaiting_approval ───────────▶ done
//!    │ ▲                                                (terminal)
//!    │ └── reset (external)
//!    ▼
//! failed
//! ```

pub mod approval;
pub mod classifier;
pub mod error;
pub mod models;
pub mod store;
pub mod triage;

pub use approval::Approvals;
pub use classifier::{Classifier, ContextExample};
pub use error::Error;
pub use models::{Bucket, Item, Kind, Overrides, Suggestion, TriageState, TriageStatus};
pub use store::ItemStore;
pub use triage::{BatchReport, TriageEngine, TriageOptions, TriageOutcome};
