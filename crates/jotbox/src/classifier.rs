//! Classifier implementations.
//!
//! - **[`DisabledClassifier`]** — returns errors; used when no provider is
//!   configured, so every non-classifying command still works without
//!   credentials.
//! - **[`OpenAiClassifier`]** — calls the OpenAI chat completions API with
//!   a JSON-object response format, bounded timeout, and exponential
//!   backoff on transient errors.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! A response that is not valid JSON, or that names a bucket/kind outside
//! the closed sets, is a hard failure — there is no partial acceptance.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use jotbox_core::classifier::{Classifier, ContextExample};
use jotbox_core::models::{Bucket, Kind, Suggestion};

use crate::config::ClassifierConfig;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// A no-op classifier that always returns errors.
///
/// With this provider every triage attempt moves the item to `failed`,
/// which keeps the workflow observable even in unconfigured environments.
pub struct DisabledClassifier;

#[async_trait]
impl Classifier for DisabledClassifier {
    async fn classify(
        &self,
        _body: &str,
        _existing_bucket: Option<Bucket>,
        _examples: &[ContextExample],
    ) -> Result<Suggestion> {
        bail!("classifier provider is disabled")
    }
}

/// Classifier backed by the OpenAI chat completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable. The HTTP client
/// and the key are captured at construction and live for the process;
/// `classify` only sends requests.
pub struct OpenAiClassifier {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAiClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("classifier.model required for OpenAI provider"))?;

        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model,
            max_retries: config.max_retries,
        })
    }
}

/// Shape of the JSON object the model is asked to produce.
#[derive(Deserialize)]
struct SuggestionWire {
    bucket: Option<String>,
    category: Option<String>,
    kind: Option<String>,
    summary: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    confidence: Option<f64>,
    title: Option<String>,
    body: Option<String>,
    #[serde(default)]
    urls: Vec<String>,
}

fn build_system_prompt(existing_bucket: Option<Bucket>, examples: &[ContextExample]) -> String {
    let buckets = Bucket::ALL
        .iter()
        .map(|b| b.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = format!(
        "You classify notes from a personal inbox. Respond with a single JSON object with \
         these fields: bucket (one of: {buckets}), category (a short free-text label), kind \
         (one of: idea, task, note, reference, unknown), summary (a very short gist, about 15 \
         characters), tags (array of proper nouns and keywords extracted from the note), \
         confidence (number between 0.0 and 1.0). You may also include: title (a cleaned-up \
         title), body (a cleaned-up restatement of the note), urls (array of reference URLs \
         found in the note)."
    );

    if let Some(bucket) = existing_bucket {
        prompt.push_str(&format!(
            " The user has already assigned the bucket '{bucket}'; the bucket field must be \
             '{bucket}'."
        ));
    }

    if !examples.is_empty() {
        prompt.push_str(
            "\n\nRecently classified notes, for consistency of categorization (advisory only):",
        );
        for ex in examples {
            prompt.push_str(&format!(
                "\n- {:?} -> bucket: {}, category: {}, kind: {}",
                ex.body,
                ex.bucket.map(|b| b.as_str()).unwrap_or("-"),
                ex.category.as_deref().unwrap_or("-"),
                ex.kind.map(|k| k.as_str()).unwrap_or("-"),
            ));
        }
    }

    prompt
}

fn parse_suggestion(content: &str, existing_bucket: Option<Bucket>) -> Result<Suggestion> {
    let wire: SuggestionWire =
        serde_json::from_str(content).context("classifier returned unparseable JSON")?;

    let bucket = wire
        .bucket
        .map(|b| b.parse::<Bucket>().map_err(|e| anyhow::anyhow!(e)))
        .transpose()
        .context("classifier returned an unknown bucket")?;
    let kind = wire
        .kind
        .map(|k| k.parse::<Kind>().map_err(|e| anyhow::anyhow!(e)))
        .transpose()
        .context("classifier returned an unknown kind")?;

    Ok(Suggestion {
        // A user-assigned bucket always wins over the model's choice.
        bucket: existing_bucket.or(bucket),
        category: wire.category,
        kind,
        summary: wire.summary,
        tags: wire.tags,
        confidence: wire.confidence.map(|c| c.clamp(0.0, 1.0)),
        title: wire.title,
        refined_body: wire.body,
        reference_urls: wire.urls,
    })
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(
        &self,
        body: &str,
        existing_bucket: Option<Bucket>,
        examples: &[ContextExample],
    ) -> Result<Suggestion> {
        let request = serde_json::json!({
            "model": self.model,
            "temperature": 0.2,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": build_system_prompt(existing_bucket, examples) },
                { "role": "user", "content": body },
            ],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(OPENAI_CHAT_URL)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        let content = json
                            .get("choices")
                            .and_then(|c| c.get(0))
                            .and_then(|c| c.get("message"))
                            .and_then(|m| m.get("content"))
                            .and_then(|c| c.as_str())
                            .ok_or_else(|| {
                                anyhow::anyhow!("OpenAI response missing message content")
                            })?;
                        return parse_suggestion(content, existing_bucket);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Classification failed after retries")))
    }
}

/// Create the appropriate [`Classifier`] based on configuration.
pub fn create_classifier(config: &ClassifierConfig) -> Result<Arc<dyn Classifier>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledClassifier)),
        "openai" => Ok(Arc::new(OpenAiClassifier::new(config)?)),
        other => bail!("Unknown classifier provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_suggestion_maps_all_fields() {
        let content = r#"{
            "bucket": "life",
            "category": "買いたい",
            "kind": "reference",
            "summary": "ヘッドフォン購入検討",
            "tags": ["headphones"],
            "confidence": 0.85,
            "urls": ["https://example.com/review"]
        }"#;
        let s = parse_suggestion(content, None).unwrap();
        assert_eq!(s.bucket, Some(Bucket::Life));
        assert_eq!(s.category.as_deref(), Some("買いたい"));
        assert_eq!(s.kind, Some(Kind::Reference));
        assert_eq!(s.confidence, Some(0.85));
        assert_eq!(s.reference_urls, vec!["https://example.com/review"]);
    }

    #[test]
    fn parse_suggestion_rejects_unknown_bucket() {
        let content = r#"{"bucket": "groceries", "kind": "task"}"#;
        assert!(parse_suggestion(content, None).is_err());
    }

    #[test]
    fn parse_suggestion_rejects_non_json() {
        assert!(parse_suggestion("Sure! Here is the classification:", None).is_err());
    }

    #[test]
    fn user_bucket_overrides_model_bucket() {
        let content = r#"{"bucket": "life", "kind": "note"}"#;
        let s = parse_suggestion(content, Some(Bucket::Work)).unwrap();
        assert_eq!(s.bucket, Some(Bucket::Work));
    }

    #[test]
    fn confidence_is_clamped() {
        let content = r#"{"confidence": 1.7}"#;
        let s = parse_suggestion(content, None).unwrap();
        assert_eq!(s.confidence, Some(1.0));
    }

    #[test]
    fn openai_client_is_built_at_construction() {
        std::env::set_var("OPENAI_API_KEY", "test-key");
        let config = ClassifierConfig {
            provider: "openai".to_string(),
            model: Some("gpt-4o-mini".to_string()),
            ..Default::default()
        };
        assert!(OpenAiClassifier::new(&config).is_ok());
    }

    #[test]
    fn openai_requires_model() {
        let config = ClassifierConfig {
            provider: "openai".to_string(),
            model: None,
            ..Default::default()
        };
        assert!(OpenAiClassifier::new(&config).is_err());
    }

    #[test]
    fn system_prompt_mentions_constraint_and_examples() {
        let examples = vec![ContextExample {
            body: "Watch the new documentary".to_string(),
            bucket: Some(Bucket::Video),
            category: Some("to-watch".to_string()),
            kind: Some(Kind::Task),
        }];
        let prompt = build_system_prompt(Some(Bucket::Work), &examples);
        assert!(prompt.contains("must be 'work'"));
        assert!(prompt.contains("to-watch"));
    }
}
