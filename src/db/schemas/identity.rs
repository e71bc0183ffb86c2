//! Identity document schema
//!
//! One registered farmer account. The phone number is the login identifier
//! and is unique across the collection.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for identities
pub const IDENTITY_COLLECTION: &str = "identities";

/// Identity document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct IdentityDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Display name
    pub name: String,

    /// Normalised phone number (login identifier)
    pub phone: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub village: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Argon2 password hash (PHC string)
    pub password_hash: String,
}

/// Location fields supplied at registration
#[derive(Debug, Clone, Default)]
pub struct IdentityLocation {
    pub village: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
}

impl IdentityDoc {
    /// Create a new identity document
    pub fn new(name: String, phone: String, location: IdentityLocation, password_hash: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::default(),
            name,
            phone,
            village: location.village,
            district: location.district,
            state: location.state,
            password_hash,
        }
    }
}

impl IntoIndexes for IdentityDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "phone": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("phone_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for IdentityDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
