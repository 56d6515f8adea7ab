//! Batch triage runner.
//!
//! Selects pending items, invokes the [`Classifier`] with a shared set of
//! contextual examples, and advances each item's state with a conditional
//! store update. Items are processed independently: one item's
//! classification failure marks that item `failed` and the batch
//! continues.
//!
//! There is no retry loop here. Repeated external invocation (cron, an
//! HTTP trigger) is what surfaces `pending` items again, and `failed`
//! items re-enter the pipeline only via an explicit reset.

use std::sync::Arc;

use serde::Serialize;

use crate::classifier::{Classifier, ContextExample};
use crate::error::Error;
use crate::models::{Item, Suggestion, TriageStatus};
use crate::store::ItemStore;

/// Tuning knobs for a triage invocation.
#[derive(Debug, Clone)]
pub struct TriageOptions {
    /// Maximum pending items processed per batch invocation.
    pub batch_size: usize,
    /// Maximum recently-done items fetched as classifier context.
    pub context_limit: usize,
}

impl Default for TriageOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            context_limit: 20,
        }
    }
}

/// Result of classifying a single item.
#[derive(Debug, Clone, PartialEq)]
pub enum TriageOutcome {
    /// The item moved to `awaiting_approval` with this suggestion.
    Classified(Suggestion),
    /// The item was already past `pending` (or another process moved it
    /// mid-flight); the classifier was not invoked, or its result was
    /// discarded.
    AlreadyTriaged,
}

/// Aggregate counts for a batch invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Drives items from `pending` to `awaiting_approval` (or `failed`).
///
/// Holds its collaborators behind trait objects; the binary constructs
/// the store and classifier once and injects them here.
pub struct TriageEngine {
    store: Arc<dyn ItemStore>,
    classifier: Arc<dyn Classifier>,
    opts: TriageOptions,
}

impl TriageEngine {
    pub fn new(
        store: Arc<dyn ItemStore>,
        classifier: Arc<dyn Classifier>,
        opts: TriageOptions,
    ) -> Self {
        Self {
            store,
            classifier,
            opts,
        }
    }

    /// Classify a single item by id.
    ///
    /// Idempotent with respect to duplicate triggers: an item already in
    /// `awaiting_approval` or `done` reports
    /// [`TriageOutcome::AlreadyTriaged`] without a classifier call. A
    /// `failed` item is an [`Error::InvalidState`] — it must be reset
    /// first.
    pub async fn triage_one(&self, id: &str) -> Result<TriageOutcome, Error> {
        let item = self.store.get(id).await?;
        match item.status() {
            TriageStatus::Pending => {}
            TriageStatus::AwaitingApproval | TriageStatus::Done => {
                return Ok(TriageOutcome::AlreadyTriaged);
            }
            TriageStatus::Failed => {
                return Err(Error::InvalidState {
                    id: item.id,
                    found: TriageStatus::Failed,
                    expected: TriageStatus::Pending,
                });
            }
        }
        let examples = self
            .store
            .recent_done(None, self.opts.context_limit)
            .await?;
        self.triage_item(item, &examples).await
    }

    /// Process a batch of pending items.
    ///
    /// With `ids`, the candidate set is those ids intersected with
    /// `pending`; otherwise the newest pending items up to the batch
    /// size. One shared context set is fetched for the whole batch.
    /// Per-item failures are absorbed into the report; the batch itself
    /// only fails if candidate selection does.
    pub async fn triage_batch(&self, ids: Option<&[String]>) -> Result<BatchReport, Error> {
        let candidates = self.store.list_pending(self.opts.batch_size, ids).await?;
        let examples = self
            .store
            .recent_done(None, self.opts.context_limit)
            .await?;

        let mut report = BatchReport::default();
        for item in candidates {
            let id = item.id.clone();
            report.processed += 1;
            match self.triage_item(item, &examples).await {
                Ok(_) => report.succeeded += 1,
                Err(Error::Classification(reason)) => {
                    tracing::warn!(item_id = %id, %reason, "item failed classification");
                    report.failed += 1;
                }
                Err(err) => {
                    tracing::error!(item_id = %id, error = %err, "triage write failed");
                    report.failed += 1;
                }
            }
        }
        tracing::info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            "triage batch finished"
        );
        Ok(report)
    }

    async fn triage_item(
        &self,
        mut item: Item,
        examples: &[ContextExample],
    ) -> Result<TriageOutcome, Error> {
        if item.status() != TriageStatus::Pending {
            return Ok(TriageOutcome::AlreadyTriaged);
        }
        if item.body.trim().is_empty() {
            self.record_failure(&mut item).await?;
            return Err(Error::Classification("item body is empty".to_string()));
        }

        match self
            .classifier
            .classify(&item.body, item.bucket, examples)
            .await
        {
            Ok(suggestion) => {
                item.record_suggestion(suggestion.clone())?;
                match self.store.update(&item, TriageStatus::Pending).await {
                    Ok(_) => {
                        tracing::info!(item_id = %item.id, "item awaiting approval");
                        Ok(TriageOutcome::Classified(suggestion))
                    }
                    Err(Error::Conflict { id, found }) => {
                        // Another process already handled the item; its
                        // state wins and this classification is dropped.
                        tracing::warn!(item_id = %id, %found, "lost triage race, skipping");
                        Ok(TriageOutcome::AlreadyTriaged)
                    }
                    Err(err) => Err(err),
                }
            }
            Err(err) => {
                let reason = err.to_string();
                self.record_failure(&mut item).await?;
                Err(Error::Classification(reason))
            }
        }
    }

    async fn record_failure(&self, item: &mut Item) -> Result<(), Error> {
        item.mark_failed()?;
        match self.store.update(item, TriageStatus::Pending).await {
            Ok(_) | Err(Error::Conflict { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use anyhow::bail;
    use async_trait::async_trait;

    use super::*;
    use crate::models::{Bucket, Kind};
    use crate::store::memory::MemoryStore;

    /// Scripted classifier: fails for bodies listed in `fail_on`,
    /// otherwise returns a fixed suggestion. Counts calls and records
    /// the context size it was handed.
    struct StubClassifier {
        calls: AtomicUsize,
        fail_on: Vec<String>,
        last_context_len: Mutex<usize>,
    }

    impl StubClassifier {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on: Vec::new(),
                last_context_len: Mutex::new(0),
            }
        }

        fn failing_on(body: &str) -> Self {
            Self {
                fail_on: vec![body.to_string()],
                ..Self::new()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Classifier for StubClassifier {
        async fn classify(
            &self,
            body: &str,
            existing_bucket: Option<Bucket>,
            examples: &[ContextExample],
        ) -> anyhow::Result<Suggestion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_context_len.lock().unwrap() = examples.len();
            if self.fail_on.iter().any(|b| b == body) {
                bail!("model returned malformed output");
            }
            Ok(Suggestion {
                bucket: existing_bucket.or(Some(Bucket::Life)),
                category: Some("買いたい".to_string()),
                kind: Some(Kind::Reference),
                summary: Some("ヘッドフォン購入検討".to_string()),
                tags: vec!["headphones".to_string()],
                confidence: Some(0.85),
                ..Default::default()
            })
        }
    }

    fn engine(
        store: Arc<MemoryStore>,
        classifier: Arc<StubClassifier>,
    ) -> TriageEngine {
        TriageEngine::new(store, classifier, TriageOptions::default())
    }

    #[tokio::test]
    async fn triage_one_moves_item_to_awaiting_approval() {
        let store = Arc::new(MemoryStore::new());
        let classifier = Arc::new(StubClassifier::new());
        let item = Item::new("local", "Buy noise-cancelling headphones");
        store.insert(&item).await.unwrap();

        let outcome = engine(store.clone(), classifier)
            .triage_one(&item.id)
            .await
            .unwrap();

        assert!(matches!(outcome, TriageOutcome::Classified(_)));
        let stored = store.get(&item.id).await.unwrap();
        assert_eq!(stored.status(), TriageStatus::AwaitingApproval);
        assert_eq!(stored.suggestion().unwrap().bucket, Some(Bucket::Life));
    }

    #[tokio::test]
    async fn triage_one_is_idempotent_and_skips_classifier() {
        let store = Arc::new(MemoryStore::new());
        let classifier = Arc::new(StubClassifier::new());
        let item = Item::new("local", "note");
        store.insert(&item).await.unwrap();

        let engine = engine(store, classifier.clone());
        engine.triage_one(&item.id).await.unwrap();
        let second = engine.triage_one(&item.id).await.unwrap();

        assert_eq!(second, TriageOutcome::AlreadyTriaged);
        assert_eq!(classifier.calls(), 1);
    }

    #[tokio::test]
    async fn triage_one_on_failed_item_is_invalid_state() {
        let store = Arc::new(MemoryStore::new());
        let mut item = Item::new("local", "note");
        item.mark_failed().unwrap();
        store.insert(&item).await.unwrap();

        let err = engine(store, Arc::new(StubClassifier::new()))
            .triage_one(&item.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[tokio::test]
    async fn triage_one_missing_item_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let err = engine(store, Arc::new(StubClassifier::new()))
            .triage_one("ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn classifier_failure_marks_item_failed() {
        let store = Arc::new(MemoryStore::new());
        let item = Item::new("local", "bad note");
        store.insert(&item).await.unwrap();

        let err = engine(store.clone(), Arc::new(StubClassifier::failing_on("bad note")))
            .triage_one(&item.id)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Classification(_)));
        let stored = store.get(&item.id).await.unwrap();
        assert_eq!(stored.status(), TriageStatus::Failed);
        assert!(stored.suggestion().is_none());
    }

    #[tokio::test]
    async fn empty_body_fails_without_classifier_call() {
        let store = Arc::new(MemoryStore::new());
        let classifier = Arc::new(StubClassifier::new());
        let item = Item::new("local", "   ");
        store.insert(&item).await.unwrap();

        let err = engine(store.clone(), classifier.clone())
            .triage_one(&item.id)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Classification(_)));
        assert_eq!(classifier.calls(), 0);
        assert_eq!(
            store.get(&item.id).await.unwrap().status(),
            TriageStatus::Failed
        );
    }

    #[tokio::test]
    async fn batch_isolates_per_item_failures() {
        let store = Arc::new(MemoryStore::new());
        let a = Item::new("local", "first");
        let b = Item::new("local", "broken");
        let c = Item::new("local", "third");
        for item in [&a, &b, &c] {
            store.insert(item).await.unwrap();
        }

        let report = engine(store.clone(), Arc::new(StubClassifier::failing_on("broken")))
            .triage_batch(None)
            .await
            .unwrap();

        assert_eq!(
            report,
            BatchReport {
                processed: 3,
                succeeded: 2,
                failed: 1
            }
        );
        assert_eq!(
            store.get(&b.id).await.unwrap().status(),
            TriageStatus::Failed
        );
        for item in [&a, &c] {
            assert_eq!(
                store.get(&item.id).await.unwrap().status(),
                TriageStatus::AwaitingApproval
            );
        }
    }

    #[tokio::test]
    async fn batch_respects_batch_size_cap() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..5 {
            store
                .insert(&Item::new("local", format!("note {i}")))
                .await
                .unwrap();
        }

        let engine = TriageEngine::new(
            store,
            Arc::new(StubClassifier::new()),
            TriageOptions {
                batch_size: 2,
                ..Default::default()
            },
        );
        let report = engine.triage_batch(None).await.unwrap();
        assert_eq!(report.processed, 2);
    }

    #[tokio::test]
    async fn batch_skips_failed_items_unless_reset() {
        let store = Arc::new(MemoryStore::new());
        let mut failed = Item::new("local", "was broken");
        failed.mark_failed().unwrap();
        store.insert(&failed).await.unwrap();

        let engine = engine(store.clone(), Arc::new(StubClassifier::new()));
        let report = engine.triage_batch(None).await.unwrap();
        assert_eq!(report.processed, 0);

        // After an explicit reset the item is selectable again.
        let mut item = store.get(&failed.id).await.unwrap();
        item.reset().unwrap();
        store.update(&item, TriageStatus::Failed).await.unwrap();

        let report = engine.triage_batch(None).await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.succeeded, 1);
    }

    #[tokio::test]
    async fn batch_hands_shared_context_to_classifier() {
        let store = Arc::new(MemoryStore::new());
        let mut done = Item::new("local", "already sorted");
        done.record_suggestion(Suggestion::default()).unwrap();
        done.apply_approval(&Default::default()).unwrap();
        store.insert(&done).await.unwrap();
        store.insert(&Item::new("local", "new note")).await.unwrap();

        let classifier = Arc::new(StubClassifier::new());
        engine(store, classifier.clone())
            .triage_batch(None)
            .await
            .unwrap();

        assert_eq!(*classifier.last_context_len.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn user_bucket_constrains_suggestion() {
        let store = Arc::new(MemoryStore::new());
        let mut item = Item::new("local", "pre-bucketed note");
        item.bucket = Some(Bucket::Work);
        store.insert(&item).await.unwrap();

        let outcome = engine(store, Arc::new(StubClassifier::new()))
            .triage_one(&item.id)
            .await
            .unwrap();

        match outcome {
            TriageOutcome::Classified(s) => assert_eq!(s.bucket, Some(Bucket::Work)),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
