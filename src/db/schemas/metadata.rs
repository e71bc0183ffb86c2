//! Common metadata for all documents
//!
//! Tracks creation and update timestamps. History records are append-only, so
//! `is_deleted` stays false for them; it is kept so every collection shares one
//! shape and one filter.

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Common metadata for all documents
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Metadata {
    #[serde(default)]
    pub is_deleted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Metadata {
    /// Stamp a document that is about to be inserted
    pub fn mark_created(&mut self) {
        let now = DateTime::now();
        self.is_deleted = false;
        self.created_at = Some(now);
        self.updated_at = Some(now);
    }
}
