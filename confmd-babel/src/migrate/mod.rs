//! Stored-document schema versions
//!
//!     Documents are persisted as JSON envelopes `{"version": N, "document": {…}}`. Each historical
//!     shape is a separate set of types ([`v1`], [`v2`]); the current shape is [`crate::ast`].
//!     Loading an old envelope walks it forward one version at a time:
//!
//!         v1 ──upgrade──▶ v2 ──upgrade──▶ v3 (current)
//!
//!     v1: tasks are `checked: bool` without uuid, unsupported blocks hold one `raw` string plus a
//!         `format` tag, images carry a flat `attachmentFilename`.
//!     v2: unsupported blocks split into `rawHtml`/`rawMarkdown`, image attachments become
//!         `{filename, version?}`. Tasks are still `checked: bool`.
//!     v3: tasks carry `uuid` and `status`.
//!
//!     Every step is total over the node tree and either succeeds or names the node it could not
//!     carry forward.

pub mod v1;
pub mod v2;

use crate::ast::{Document, Heading};
use crate::error::MigrationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Version written by [`StoredDocument::to_json`] for current documents.
pub const CURRENT_VERSION: u32 = 3;

/// A stored document in any supported schema version.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredDocument {
    V1(v1::Document),
    V2(v2::Document),
    V3(Document),
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(default)]
    version: Option<u32>,
    document: Value,
}

impl StoredDocument {
    /// Wraps a document in the current schema.
    pub fn current(doc: Document) -> Self {
        StoredDocument::V3(doc)
    }

    pub fn version(&self) -> u32 {
        match self {
            StoredDocument::V1(_) => 1,
            StoredDocument::V2(_) => 2,
            StoredDocument::V3(_) => 3,
        }
    }

    /// Reads an envelope without migrating it.
    pub fn from_json(json: &str) -> Result<Self, MigrationError> {
        let envelope: Envelope = serde_json::from_str(json)
            .map_err(|e| envelope_error(0, format!("invalid envelope: {e}")))?;
        let version = envelope
            .version
            .ok_or_else(|| envelope_error(0, "missing version"))?;
        let document = envelope.document;
        match version {
            1 => Ok(StoredDocument::V1(from_value(document, 1)?)),
            2 => Ok(StoredDocument::V2(from_value(document, 2)?)),
            3 => Ok(StoredDocument::V3(from_value(document, 3)?)),
            0 => Err(envelope_error(0, "version 0 does not exist")),
            newer => Err(envelope_error(
                newer,
                format!("version {newer} is newer than supported version {CURRENT_VERSION}"),
            )),
        }
    }

    pub fn to_json(&self) -> Result<String, MigrationError> {
        let document = match self {
            StoredDocument::V1(doc) => serde_json::to_value(doc),
            StoredDocument::V2(doc) => serde_json::to_value(doc),
            StoredDocument::V3(doc) => serde_json::to_value(doc),
        }
        .map_err(|e| envelope_error(self.version(), e.to_string()))?;
        let envelope = Envelope {
            version: Some(self.version()),
            document,
        };
        serde_json::to_string(&envelope).map_err(|e| envelope_error(self.version(), e.to_string()))
    }
}

/// Brings a stored document up to the current schema.
pub fn migrate(stored: StoredDocument) -> Result<Document, MigrationError> {
    let mut stored = stored;
    loop {
        stored = match stored {
            StoredDocument::V1(doc) => {
                debug!(from = 1, to = 2, nodes = doc.children.len(), "migrating document");
                StoredDocument::V2(v1::upgrade(doc)?)
            }
            StoredDocument::V2(doc) => {
                debug!(from = 2, to = 3, nodes = doc.children.len(), "migrating document");
                StoredDocument::V3(v2::upgrade(doc)?)
            }
            StoredDocument::V3(doc) => return Ok(doc),
        };
    }
}

/// Reads an envelope of any supported version and migrates it to the current schema.
pub fn migrate_json(json: &str) -> Result<Document, MigrationError> {
    migrate(StoredDocument::from_json(json)?)
}

fn envelope_error(version: u32, message: impl Into<String>) -> MigrationError {
    MigrationError {
        node_type: "document".to_string(),
        from_version: version,
        to_version: CURRENT_VERSION,
        message: message.into(),
    }
}

fn from_value<T: serde::de::DeserializeOwned>(
    value: Value,
    version: u32,
) -> Result<T, MigrationError> {
    serde_json::from_value(value).map_err(|e| {
        envelope_error(
            version,
            format!("document does not match schema v{version}: {e}"),
        )
    })
}

/// Heading levels outside 1-6 cannot be rendered by any version.
pub(crate) fn check_heading(heading: &Heading, from_version: u32) -> Result<(), MigrationError> {
    if (1..=6).contains(&heading.level) {
        Ok(())
    } else {
        Err(MigrationError {
            node_type: "heading".to_string(),
            from_version,
            to_version: from_version + 1,
            message: format!("level {} is outside 1-6", heading.level),
        })
    }
}
