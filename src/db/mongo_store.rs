//! MongoDB-backed implementation of the store traits

use bson::{doc, oid::ObjectId, Bson, DateTime};
use futures_util::TryStreamExt;

use crate::db::mongo::{live, MongoClient, MongoCollection};
use crate::db::schemas::{
    CropDoc, DiseaseCaseDoc, FieldDoc, HistoryRecord, IdentityDoc, YieldPredictionDoc,
    CROP_COLLECTION, DISEASE_CASE_COLLECTION, FIELD_COLLECTION, HIGH_SEVERITY,
    IDENTITY_COLLECTION, YIELD_PREDICTION_COLLECTION,
};
use crate::db::store::{FieldStore, HistoryStore, IdentityStore};
use crate::types::{GatewayError, Result};

/// All collections the gateway uses, opened (and indexed) once at startup
pub struct MongoStore {
    identities: MongoCollection<IdentityDoc>,
    fields: MongoCollection<FieldDoc>,
    crops: MongoCollection<CropDoc>,
    disease_cases: MongoCollection<DiseaseCaseDoc>,
    yield_predictions: MongoCollection<YieldPredictionDoc>,
}

impl MongoStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            identities: mongo.collection(IDENTITY_COLLECTION).await?,
            fields: mongo.collection(FIELD_COLLECTION).await?,
            crops: mongo.collection(CROP_COLLECTION).await?,
            disease_cases: mongo.collection(DISEASE_CASE_COLLECTION).await?,
            yield_predictions: mongo.collection(YIELD_PREDICTION_COLLECTION).await?,
        })
    }
}

#[async_trait::async_trait]
impl IdentityStore for MongoStore {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<IdentityDoc>> {
        self.identities.find_one(doc! { "phone": phone }).await
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<IdentityDoc>> {
        self.identities.find_one(doc! { "_id": *id }).await
    }

    async fn create(&self, identity: IdentityDoc) -> Result<ObjectId> {
        if self.find_by_phone(&identity.phone).await?.is_some() {
            return Err(GatewayError::DuplicateIdentity);
        }
        // The unique index still catches a concurrent registration
        self.identities.insert_one(identity).await
    }
}

#[async_trait::async_trait]
impl FieldStore for MongoStore {
    async fn create_field(&self, field: FieldDoc) -> Result<ObjectId> {
        self.fields.insert_one(field).await
    }

    async fn fields_for(&self, user: &ObjectId) -> Result<Vec<FieldDoc>> {
        self.fields.find_many(doc! { "user": *user }).await
    }

    async fn find_owned_field(&self, field: &ObjectId, user: &ObjectId) -> Result<Option<FieldDoc>> {
        self.fields.find_one(doc! { "_id": *field, "user": *user }).await
    }

    async fn create_crop(&self, crop: CropDoc) -> Result<ObjectId> {
        self.crops.insert_one(crop).await
    }

    async fn count_fields(&self, user: &ObjectId) -> Result<u64> {
        self.fields.count(doc! { "user": *user }).await
    }

    async fn count_crops(&self, fields: &[ObjectId]) -> Result<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        self.crops.count(doc! { "field": { "$in": fields.to_vec() } }).await
    }
}

#[async_trait::async_trait]
impl HistoryStore for MongoStore {
    async fn append(&self, record: HistoryRecord) -> Result<ObjectId> {
        match record {
            HistoryRecord::DiseaseCase(doc) => self.disease_cases.insert_one(doc).await,
            HistoryRecord::YieldPrediction(doc) => self.yield_predictions.insert_one(doc).await,
        }
    }

    async fn count_disease_cases(&self, user: &ObjectId) -> Result<u64> {
        self.disease_cases.count(doc! { "user": *user }).await
    }

    async fn high_risk_crop_types(&self, user: &ObjectId) -> Result<Vec<String>> {
        let filter = live(doc! {
            "user": *user,
            "severity": { "$regex": format!("^{}$", HIGH_SEVERITY), "$options": "i" },
        });

        let values = self
            .disease_cases
            .inner()
            .distinct("crop_type", filter)
            .await
            .map_err(|e| GatewayError::Database(format!("Distinct failed: {}", e)))?;

        let mut crop_types: Vec<String> = values
            .into_iter()
            .filter_map(|value| match value {
                Bson::String(s) => Some(s),
                _ => None,
            })
            .collect();
        crop_types.sort();

        Ok(crop_types)
    }

    async fn total_expected_yield(&self, user: &ObjectId) -> Result<f64> {
        let pipeline = vec![
            doc! { "$match": live(doc! { "user": *user }) },
            doc! { "$group": { "_id": Bson::Null, "total": { "$sum": "$expected_yield_per_acre" } } },
        ];

        let mut cursor = self
            .yield_predictions
            .inner()
            .aggregate(pipeline)
            .await
            .map_err(|e| GatewayError::Database(format!("Aggregate failed: {}", e)))?;

        let group = cursor
            .try_next()
            .await
            .map_err(|e| GatewayError::Database(format!("Aggregate failed: {}", e)))?;

        // $sum yields Int32/Int64 when every summand is integral
        let total = match group.as_ref().and_then(|g| g.get("total")) {
            Some(Bson::Double(v)) => *v,
            Some(Bson::Int32(v)) => f64::from(*v),
            Some(Bson::Int64(v)) => *v as f64,
            _ => 0.0,
        };

        Ok(total)
    }

    async fn last_yield_prediction_at(&self, user: &ObjectId) -> Result<Option<DateTime>> {
        let latest = self.yield_predictions.find_latest(doc! { "user": *user }).await?;
        Ok(latest.and_then(|doc| doc.metadata.created_at))
    }
}
