//! Field and crop document schemas
//!
//! A field belongs to one identity; crops are registered on fields.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for fields
pub const FIELD_COLLECTION: &str = "fields";

/// Collection name for crops
pub const CROP_COLLECTION: &str = "crops";

/// Latitude/longitude pair
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Field document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct FieldDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Owning identity
    pub user: ObjectId,

    pub name: String,

    pub area_acres: f64,

    pub soil_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl IntoIndexes for FieldDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "user": 1 },
            Some(IndexOptions::builder().name("user_index".to_string()).build()),
        )]
    }
}

impl MutMetadata for FieldDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Crop document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CropDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Field the crop is planted on
    pub field: ObjectId,

    pub crop_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variety: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sowing_date: Option<DateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irrigation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_year: Option<i32>,
}

impl IntoIndexes for CropDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "field": 1 },
            Some(IndexOptions::builder().name("field_index".to_string()).build()),
        )]
    }
}

impl MutMetadata for CropDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
