//! Core data models: items, buckets, kinds, suggestions, and the triage
//! state machine.
//!
//! [`TriageState`] carries the advisory [`Suggestion`] inside its
//! `AwaitingApproval` variant, so a suggestion can exist only while the
//! item is actually waiting on a user decision. `Done` carries the
//! `triaged_at` stamp and nothing else — approving or rejecting an item
//! structurally discards the suggestion.
//!
//! All state transitions go through the methods on [`Item`]; a transition
//! attempted from the wrong state returns [`Error::InvalidState`] rather
//! than silently doing nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// Top-level grouping for an item. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Work,
    Video,
    Life,
    Boardgame,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Work => "work",
            Bucket::Video => "video",
            Bucket::Life => "life",
            Bucket::Boardgame => "boardgame",
        }
    }

    /// All valid bucket names, for prompts and CLI help.
    pub const ALL: [Bucket; 4] = [Bucket::Work, Bucket::Video, Bucket::Life, Bucket::Boardgame];
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work" => Ok(Bucket::Work),
            "video" => Ok(Bucket::Video),
            "life" => Ok(Bucket::Life),
            "boardgame" => Ok(Bucket::Boardgame),
            other => Err(format!(
                "unknown bucket: '{}' (expected work, video, life, or boardgame)",
                other
            )),
        }
    }
}

/// The semantic type of a note. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Idea,
    Task,
    Note,
    Reference,
    Unknown,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Idea => "idea",
            Kind::Task => "task",
            Kind::Note => "note",
            Kind::Reference => "reference",
            Kind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idea" => Ok(Kind::Idea),
            "task" => Ok(Kind::Task),
            "note" => Ok(Kind::Note),
            "reference" => Ok(Kind::Reference),
            "unknown" => Ok(Kind::Unknown),
            other => Err(format!(
                "unknown kind: '{}' (expected idea, task, note, reference, or unknown)",
                other
            )),
        }
    }
}

/// Advisory classification output awaiting user confirmation.
///
/// Every field is optional: the approve path resolves absences with
/// per-field fallbacks (override, then suggestion, then existing value),
/// so a model response missing a field is usable rather than fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Suggestion {
    pub bucket: Option<Bucket>,
    pub category: Option<String>,
    pub kind: Option<Kind>,
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub confidence: Option<f64>,
    /// Cleaned-up title proposed by the extended classifier variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Cleaned-up / expanded restatement of the body. Advisory only —
    /// never merged into the authoritative body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refined_body: Option<String>,
    /// Reference URLs extracted from the note.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_urls: Vec<String>,
}

/// Fieldless discriminant of [`TriageState`], used for conditional store
/// updates and queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageStatus {
    Pending,
    AwaitingApproval,
    Done,
    Failed,
}

impl TriageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriageStatus::Pending => "pending",
            TriageStatus::AwaitingApproval => "awaiting_approval",
            TriageStatus::Done => "done",
            TriageStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TriageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TriageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TriageStatus::Pending),
            "awaiting_approval" => Ok(TriageStatus::AwaitingApproval),
            "done" => Ok(TriageStatus::Done),
            "failed" => Ok(TriageStatus::Failed),
            other => Err(format!("unknown triage status: '{}'", other)),
        }
    }
}

/// Workflow state of an item.
///
/// `AwaitingApproval` is the only state that can hold a suggestion, and
/// `Done` is the only state that holds `triaged_at`. Terminal states are
/// `Done` and `Failed`; `Failed` items leave the terminal set only via an
/// explicit [`Item::reset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TriageState {
    Pending,
    AwaitingApproval { suggestion: Suggestion },
    Done { triaged_at: DateTime<Utc> },
    Failed,
}

impl TriageState {
    pub fn status(&self) -> TriageStatus {
        match self {
            TriageState::Pending => TriageStatus::Pending,
            TriageState::AwaitingApproval { .. } => TriageStatus::AwaitingApproval,
            TriageState::Done { .. } => TriageStatus::Done,
            TriageState::Failed => TriageStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TriageState::Done { .. } | TriageState::Failed)
    }
}

/// User-supplied field overrides for the approve path. An override always
/// wins over the corresponding suggestion field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Overrides {
    pub bucket: Option<Bucket>,
    pub category: Option<String>,
    pub kind: Option<Kind>,
}

/// A captured note and its classification/workflow state.
///
/// The authoritative classification fields (`bucket`, `category`, `kind`,
/// `summary`, `tags`, `confidence`) are only written by the approve path;
/// the triage runner writes suggestions into the state instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub owner: String,
    pub body: String,
    /// Opaque structured content attached at capture time (rich text,
    /// image references). Never interpreted by the triage core.
    pub content_json: Option<String>,
    pub bucket: Option<Bucket>,
    pub category: Option<String>,
    pub kind: Option<Kind>,
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub confidence: Option<f64>,
    #[serde(flatten)]
    pub state: TriageState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Create a new pending item. Capture is the only path that writes
    /// the body; triage and approval never touch content fields.
    pub fn new(owner: impl Into<String>, body: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner: owner.into(),
            body: body.into(),
            content_json: None,
            bucket: None,
            category: None,
            kind: None,
            summary: None,
            tags: Vec::new(),
            confidence: None,
            state: TriageState::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> TriageStatus {
        self.state.status()
    }

    pub fn suggestion(&self) -> Option<&Suggestion> {
        match &self.state {
            TriageState::AwaitingApproval { suggestion } => Some(suggestion),
            _ => None,
        }
    }

    pub fn triaged_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            TriageState::Done { triaged_at } => Some(*triaged_at),
            _ => None,
        }
    }

    fn invalid_state(&self, expected: TriageStatus) -> Error {
        Error::InvalidState {
            id: self.id.clone(),
            found: self.status(),
            expected,
        }
    }

    /// `pending → awaiting_approval`: attach a classifier suggestion.
    /// Authoritative fields are untouched.
    pub fn record_suggestion(&mut self, suggestion: Suggestion) -> Result<(), Error> {
        match self.state {
            TriageState::Pending => {
                self.state = TriageState::AwaitingApproval { suggestion };
                self.updated_at = Utc::now();
                Ok(())
            }
            _ => Err(self.invalid_state(TriageStatus::Pending)),
        }
    }

    /// `pending → failed`: classification threw or timed out. The item is
    /// left otherwise unchanged so an external reset can retry it.
    pub fn mark_failed(&mut self) -> Result<(), Error> {
        match self.state {
            TriageState::Pending => {
                self.state = TriageState::Failed;
                self.updated_at = Utc::now();
                Ok(())
            }
            _ => Err(self.invalid_state(TriageStatus::Pending)),
        }
    }

    /// `awaiting_approval → done` (approve): commit the suggestion into
    /// the authoritative fields, with overrides taking precedence
    /// field-by-field. Stamps `triaged_at`; the suggestion payload is
    /// discarded with the state.
    pub fn apply_approval(&mut self, overrides: &Overrides) -> Result<(), Error> {
        let suggestion = match &self.state {
            TriageState::AwaitingApproval { suggestion } => suggestion.clone(),
            _ => return Err(self.invalid_state(TriageStatus::AwaitingApproval)),
        };
        let now = Utc::now();
        self.bucket = overrides.bucket.or(suggestion.bucket).or(self.bucket);
        self.category = overrides.category.clone().or(suggestion.category);
        self.kind = Some(overrides.kind.or(suggestion.kind).unwrap_or(Kind::Unknown));
        self.summary = suggestion.summary;
        self.tags = suggestion.tags;
        self.confidence = Some(suggestion.confidence.unwrap_or(0.0));
        self.state = TriageState::Done { triaged_at: now };
        self.updated_at = now;
        Ok(())
    }

    /// `awaiting_approval → done` (reject): the suggestion is discarded
    /// and the authoritative fields stay exactly as they were before
    /// triage. Stamps `triaged_at`.
    pub fn apply_rejection(&mut self) -> Result<(), Error> {
        match self.state {
            TriageState::AwaitingApproval { .. } => {
                let now = Utc::now();
                self.state = TriageState::Done { triaged_at: now };
                self.updated_at = now;
                Ok(())
            }
            _ => Err(self.invalid_state(TriageStatus::AwaitingApproval)),
        }
    }

    /// `failed → pending`: external retry hook. The only way out of
    /// `failed`.
    pub fn reset(&mut self) -> Result<(), Error> {
        match self.state {
            TriageState::Failed => {
                self.state = TriageState::Pending;
                self.updated_at = Utc::now();
                Ok(())
            }
            _ => Err(self.invalid_state(TriageStatus::Failed)),
        }
    }
}
