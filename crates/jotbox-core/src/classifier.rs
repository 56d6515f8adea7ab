//! Classifier capability consumed by the triage runner.
//!
//! The core only specifies the contract; concrete implementations (the
//! OpenAI-backed client, the disabled stub) live in the runtime crate.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Bucket, Kind, Suggestion};

/// A recently classified item, passed to the classifier as an in-context
/// example to bias categorization consistency. Advisory only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextExample {
    pub body: String,
    pub bucket: Option<Bucket>,
    pub category: Option<String>,
    pub kind: Option<Kind>,
}

/// Proposes bucket/category/kind metadata for a note body.
///
/// A user-supplied `existing_bucket` constrains the output: the returned
/// suggestion must keep that bucket, never override it. Any error —
/// network, timeout, or unparseable model output — is a hard failure;
/// the classifier never manages item state itself.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        body: &str,
        existing_bucket: Option<Bucket>,
        examples: &[ContextExample],
    ) -> Result<Suggestion>;
}
