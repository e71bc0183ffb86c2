//! Store traits
//!
//! Routes and services only see these traits, so the MongoDB backend and the
//! in-memory backend are interchangeable.

use bson::{oid::ObjectId, DateTime};

use crate::db::schemas::{CropDoc, FieldDoc, HistoryRecord, IdentityDoc};
use crate::types::Result;

/// Credential store
#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<IdentityDoc>>;

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<IdentityDoc>>;

    /// Insert a new identity. Fails with `DuplicateIdentity` when the phone is
    /// already registered.
    async fn create(&self, identity: IdentityDoc) -> Result<ObjectId>;
}

/// Field and crop metadata owned by identities
#[async_trait::async_trait]
pub trait FieldStore: Send + Sync {
    async fn create_field(&self, field: FieldDoc) -> Result<ObjectId>;

    async fn fields_for(&self, user: &ObjectId) -> Result<Vec<FieldDoc>>;

    /// Look up a field only if `user` owns it
    async fn find_owned_field(&self, field: &ObjectId, user: &ObjectId) -> Result<Option<FieldDoc>>;

    async fn create_crop(&self, crop: CropDoc) -> Result<ObjectId>;

    async fn count_fields(&self, user: &ObjectId) -> Result<u64>;

    /// Count crops planted on any of the given fields
    async fn count_crops(&self, fields: &[ObjectId]) -> Result<u64>;
}

/// Append-only history of relayed predictions
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, record: HistoryRecord) -> Result<ObjectId>;

    async fn count_disease_cases(&self, user: &ObjectId) -> Result<u64>;

    /// Distinct crop types among the user's high-severity disease cases
    async fn high_risk_crop_types(&self, user: &ObjectId) -> Result<Vec<String>>;

    /// Sum of `expected_yield_per_acre` over the user's yield predictions
    async fn total_expected_yield(&self, user: &ObjectId) -> Result<f64>;

    /// Creation time of the user's newest yield prediction
    async fn last_yield_prediction_at(&self, user: &ObjectId) -> Result<Option<DateTime>>;
}
