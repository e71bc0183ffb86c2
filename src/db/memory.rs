//! In-memory store
//!
//! Backs the gateway in dev mode when MongoDB is unreachable, and every test
//! that needs a store. Collections are plain vectors in insertion order.

use std::collections::BTreeSet;
use std::sync::Arc;

use bson::{oid::ObjectId, DateTime};
use tokio::sync::RwLock;

use crate::db::mongo::MutMetadata;
use crate::db::schemas::{
    CropDoc, DiseaseCaseDoc, FieldDoc, HistoryRecord, IdentityDoc, YieldPredictionDoc,
};
use crate::db::store::{FieldStore, HistoryStore, IdentityStore};
use crate::types::{GatewayError, Result};

#[derive(Default)]
struct Collections {
    identities: Vec<IdentityDoc>,
    fields: Vec<FieldDoc>,
    crops: Vec<CropDoc>,
    disease_cases: Vec<DiseaseCaseDoc>,
    yield_predictions: Vec<YieldPredictionDoc>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn identity_count(&self) -> usize {
        self.inner.read().await.identities.len()
    }

    pub async fn disease_cases(&self) -> Vec<DiseaseCaseDoc> {
        self.inner.read().await.disease_cases.clone()
    }

    pub async fn yield_predictions(&self) -> Vec<YieldPredictionDoc> {
        self.inner.read().await.yield_predictions.clone()
    }
}

fn stamp<T: MutMetadata>(doc: &mut T) -> ObjectId {
    doc.mut_metadata().mark_created();
    ObjectId::new()
}

#[async_trait::async_trait]
impl IdentityStore for MemoryStore {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<IdentityDoc>> {
        let collections = self.inner.read().await;
        Ok(collections
            .identities
            .iter()
            .find(|identity| identity.phone == phone)
            .cloned())
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<IdentityDoc>> {
        let collections = self.inner.read().await;
        Ok(collections
            .identities
            .iter()
            .find(|identity| identity._id.as_ref() == Some(id))
            .cloned())
    }

    async fn create(&self, mut identity: IdentityDoc) -> Result<ObjectId> {
        // Check and insert under one write lock
        let mut collections = self.inner.write().await;
        if collections.identities.iter().any(|i| i.phone == identity.phone) {
            return Err(GatewayError::DuplicateIdentity);
        }

        let id = stamp(&mut identity);
        identity._id = Some(id);
        collections.identities.push(identity);
        Ok(id)
    }
}

#[async_trait::async_trait]
impl FieldStore for MemoryStore {
    async fn create_field(&self, mut field: FieldDoc) -> Result<ObjectId> {
        let id = stamp(&mut field);
        field._id = Some(id);
        self.inner.write().await.fields.push(field);
        Ok(id)
    }

    async fn fields_for(&self, user: &ObjectId) -> Result<Vec<FieldDoc>> {
        let collections = self.inner.read().await;
        Ok(collections
            .fields
            .iter()
            .filter(|field| &field.user == user)
            .cloned()
            .collect())
    }

    async fn find_owned_field(&self, field: &ObjectId, user: &ObjectId) -> Result<Option<FieldDoc>> {
        let collections = self.inner.read().await;
        Ok(collections
            .fields
            .iter()
            .find(|f| f._id.as_ref() == Some(field) && &f.user == user)
            .cloned())
    }

    async fn create_crop(&self, mut crop: CropDoc) -> Result<ObjectId> {
        let id = stamp(&mut crop);
        crop._id = Some(id);
        self.inner.write().await.crops.push(crop);
        Ok(id)
    }

    async fn count_fields(&self, user: &ObjectId) -> Result<u64> {
        let collections = self.inner.read().await;
        Ok(collections.fields.iter().filter(|f| &f.user == user).count() as u64)
    }

    async fn count_crops(&self, fields: &[ObjectId]) -> Result<u64> {
        let collections = self.inner.read().await;
        Ok(collections
            .crops
            .iter()
            .filter(|crop| fields.contains(&crop.field))
            .count() as u64)
    }
}

#[async_trait::async_trait]
impl HistoryStore for MemoryStore {
    async fn append(&self, record: HistoryRecord) -> Result<ObjectId> {
        let mut collections = self.inner.write().await;
        match record {
            HistoryRecord::DiseaseCase(mut doc) => {
                let id = stamp(&mut doc);
                doc._id = Some(id);
                collections.disease_cases.push(doc);
                Ok(id)
            }
            HistoryRecord::YieldPrediction(mut doc) => {
                let id = stamp(&mut doc);
                doc._id = Some(id);
                collections.yield_predictions.push(doc);
                Ok(id)
            }
        }
    }

    async fn count_disease_cases(&self, user: &ObjectId) -> Result<u64> {
        let collections = self.inner.read().await;
        Ok(collections
            .disease_cases
            .iter()
            .filter(|case| &case.user == user)
            .count() as u64)
    }

    async fn high_risk_crop_types(&self, user: &ObjectId) -> Result<Vec<String>> {
        let collections = self.inner.read().await;
        let crop_types: BTreeSet<String> = collections
            .disease_cases
            .iter()
            .filter(|case| &case.user == user && case.is_high_severity())
            .map(|case| case.crop_type.clone())
            .collect();
        Ok(crop_types.into_iter().collect())
    }

    async fn total_expected_yield(&self, user: &ObjectId) -> Result<f64> {
        let collections = self.inner.read().await;
        Ok(collections
            .yield_predictions
            .iter()
            .filter(|p| &p.user == user)
            .filter_map(|p| p.expected_yield_per_acre)
            .sum())
    }

    async fn last_yield_prediction_at(&self, user: &ObjectId) -> Result<Option<DateTime>> {
        let collections = self.inner.read().await;
        Ok(collections
            .yield_predictions
            .iter()
            .rev()
            .find(|p| &p.user == user)
            .and_then(|p| p.metadata.created_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::IdentityLocation;

    fn identity(phone: &str) -> IdentityDoc {
        IdentityDoc::new(
            "Asha".into(),
            phone.into(),
            IdentityLocation::default(),
            "$argon2id$stub".into(),
        )
    }

    fn yield_record(user: ObjectId, expected: Option<f64>) -> HistoryRecord {
        HistoryRecord::YieldPrediction(YieldPredictionDoc {
            user,
            crop_type: "Wheat".into(),
            expected_yield_per_acre: expected,
            ..Default::default()
        })
    }

    fn disease_record(user: ObjectId, crop: &str, severity: &str) -> HistoryRecord {
        HistoryRecord::DiseaseCase(DiseaseCaseDoc {
            user,
            crop_type: crop.into(),
            severity: Some(severity.into()),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_duplicate_phone_rejected() {
        let store = MemoryStore::new();
        store.create(identity("9876543210")).await.unwrap();

        let err = store.create(identity("9876543210")).await.unwrap_err();
        assert!(matches!(err, GatewayError::DuplicateIdentity));
        assert_eq!(store.identity_count().await, 1);
    }

    #[tokio::test]
    async fn test_created_identity_is_findable() {
        let store = MemoryStore::new();
        let id = store.create(identity("9876543210")).await.unwrap();

        let found = store.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(found.phone, "9876543210");
        assert!(found.metadata.created_at.is_some());
        assert!(store.find_by_phone("000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_yield_sum_is_per_user() {
        let store = MemoryStore::new();
        let alice = ObjectId::new();
        let bob = ObjectId::new();

        store.append(yield_record(alice, Some(12.5))).await.unwrap();
        store.append(yield_record(alice, Some(7.25))).await.unwrap();
        store.append(yield_record(alice, None)).await.unwrap();
        store.append(yield_record(bob, Some(100.0))).await.unwrap();

        assert_eq!(store.total_expected_yield(&alice).await.unwrap(), 19.75);
        assert_eq!(store.total_expected_yield(&ObjectId::new()).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_high_risk_crop_types_are_distinct() {
        let store = MemoryStore::new();
        let user = ObjectId::new();

        store.append(disease_record(user, "Tomato", "high")).await.unwrap();
        store.append(disease_record(user, "Tomato", "High")).await.unwrap();
        store.append(disease_record(user, "Rice", "low")).await.unwrap();
        store.append(disease_record(user, "Potato", "high")).await.unwrap();

        assert_eq!(
            store.high_risk_crop_types(&user).await.unwrap(),
            vec!["Potato".to_string(), "Tomato".to_string()]
        );
        assert_eq!(store.count_disease_cases(&user).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_owned_field_lookup() {
        let store = MemoryStore::new();
        let owner = ObjectId::new();
        let field_id = store
            .create_field(FieldDoc {
                user: owner,
                name: "North".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(store.find_owned_field(&field_id, &owner).await.unwrap().is_some());
        assert!(store
            .find_owned_field(&field_id, &ObjectId::new())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_last_yield_prediction_is_newest() {
        let store = MemoryStore::new();
        let user = ObjectId::new();
        assert!(store.last_yield_prediction_at(&user).await.unwrap().is_none());

        store.append(yield_record(user, Some(1.0))).await.unwrap();
        assert!(store.last_yield_prediction_at(&user).await.unwrap().is_some());
    }
}
