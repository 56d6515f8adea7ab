//! # Jotbox
//!
//! **A personal note-capture inbox with AI-assisted triage.**
//!
//! Notes enter the inbox as free text. A classification pass (an LLM
//! call) proposes bucket/category/kind metadata, and the user approves or
//! rejects the proposal. The state machine, batch runner, and approval
//! workflow live in `jotbox-core`; this crate supplies the SQLite store,
//! the OpenAI classifier client, and the CLI/HTTP surfaces.
//!
//! ## Workflow
//!
//! ```text
//! ┌─────────┐   jot triage    ┌────────────────────┐   approve/reject   ┌──────┐
//! │ pending │───────────────▶│ awaiting_approval   │──────────────────▶│ done │
//! └────┬────┘  (classifier)   └────────────────────┘                    └──────┘
//!      │  classify error                ▲
//!      ▼                               │ jot reset
//! ┌────────┐ ─────────────────────────┘
//! │ failed │
//! └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! jot init                          # create database
//! jot add "Buy noise-cancelling headphones"
//! jot triage                        # classify pending notes
//! jot list --state awaiting_approval
//! jot approve <id> --bucket work    # or: jot reject <id>
//! jot serve                         # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`migrate`] | Database schema migrations (idempotent) |
//! | [`sqlite_store`] | SQLite pool (WAL) and the `ItemStore` backend with conditional updates |
//! | [`classifier`] | OpenAI classifier client with retry/backoff |
//! | [`capture`] | Note capture (`jot add`) |
//! | [`review`] | Review commands: list, show, triage, approve, reject, reset |
//! | [`server`] | JSON HTTP API (Axum) with CORS |

pub mod capture;
pub mod classifier;
pub mod config;
pub mod migrate;
pub mod review;
pub mod server;
pub mod sqlite_store;

pub use sqlite_store::SqliteItemStore;
