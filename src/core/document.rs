//! Document records and their timestamp lineage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::name::{is_reserved, DEFAULT_DOCUMENT};

/// A saved spreadsheet document as kept in the local store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Store key
    pub name: String,
    /// Set on first save, never changed afterwards
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
    /// Updated on every save
    #[serde(rename = "modified")]
    pub modified_at: DateTime<Utc>,
    /// Percent-encoded sheet, opaque to the workflow
    pub content: String,
}

impl DocumentRecord {
    /// Create a record for a document saved for the first time
    pub fn create(name: impl Into<String>, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            created_at: now,
            modified_at: now,
            content: content.into(),
        }
    }

    /// Build the next version of a stored record.
    ///
    /// `created_at` is carried over. `modified_at` never moves backwards, even
    /// if the clock does.
    pub fn revise(previous: &DocumentRecord, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: previous.name.clone(),
            created_at: previous.created_at,
            modified_at: now.max(previous.modified_at),
            content: content.into(),
        }
    }
}

/// What gets uploaded on Save As
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishPayload {
    pub name: String,
    pub content: String,
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "modified")]
    pub modified_at: DateTime<Utc>,
}

impl From<&DocumentRecord> for PublishPayload {
    fn from(record: &DocumentRecord) -> Self {
        Self {
            name: record.name.clone(),
            content: record.content.clone(),
            created_at: record.created_at,
            modified_at: record.modified_at,
        }
    }
}

/// Handle to a document that was saved or opened in this session.
///
/// Only obtainable from a record that was written or read back, so the
/// scratch document can never be the target of a Save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedDocument {
    name: String,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl PersistedDocument {
    /// `None` for the scratch document, which never has lineage
    pub fn from_record(record: &DocumentRecord) -> Option<Self> {
        if is_reserved(&record.name) {
            return None;
        }
        Some(Self {
            name: record.name.clone(),
            created_at: record.created_at,
            modified_at: record.modified_at,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The document currently open in the editor
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActiveDocument {
    /// The `default` scratch sheet
    #[default]
    Scratch,
    Persisted(PersistedDocument),
}

impl ActiveDocument {
    pub fn name(&self) -> &str {
        match self {
            ActiveDocument::Scratch => DEFAULT_DOCUMENT,
            ActiveDocument::Persisted(doc) => doc.name(),
        }
    }

    pub fn is_scratch(&self) -> bool {
        matches!(self, ActiveDocument::Scratch)
    }

    /// Drop lineage that does not belong to a saveable document
    pub fn sanitized(self) -> Self {
        match self {
            ActiveDocument::Persisted(doc) if is_reserved(doc.name()) => ActiveDocument::Scratch,
            other => other,
        }
    }
}

/// Source of "now" for timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
