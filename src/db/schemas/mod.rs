//! Database schemas
//!
//! MongoDB document structures for identities, fields, crops and the two
//! history collections.

mod field;
mod history;
mod identity;
mod metadata;

pub use field::{CropDoc, FieldDoc, GeoPoint, CROP_COLLECTION, FIELD_COLLECTION};
pub use history::{
    DiseaseCaseDoc, HistoryRecord, YieldPredictionDoc, DISEASE_CASE_COLLECTION, HIGH_SEVERITY,
    YIELD_PREDICTION_COLLECTION,
};
pub use identity::{IdentityDoc, IdentityLocation, IDENTITY_COLLECTION};
pub use metadata::Metadata;
