//! Relay service
//!
//! Forwards scan and yield requests to the prediction service and keeps the
//! history. Each request makes one outbound call and at most one write:
//!
//! 1. call the prediction service
//! 2. on failure, return the error; nothing is written
//! 3. on success, append the history record
//! 4. return the service's body verbatim, even if step 3 failed

use bson::oid::ObjectId;
use bytes::Bytes;
use chrono::{DateTime as ChronoDateTime, NaiveDate, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::schemas::{DiseaseCaseDoc, HistoryRecord, YieldPredictionDoc};
use crate::db::store::HistoryStore;
use crate::services::prediction::{
    DiseasePrediction, LeafImage, PredictionClient, Relayed, YieldEstimate,
};
use crate::types::{GatewayError, Result};

/// Route labels used in logs
pub const SCAN_ROUTE: &str = "crop/scan";
pub const YIELD_ROUTE: &str = "yield/predict";

/// Validated yield request parameters
#[derive(Debug, Clone, PartialEq)]
pub struct YieldRequest {
    pub crop_type: String,
    pub soil_type: String,
    pub area_acres: f64,
    pub irrigation: String,
    pub sowing_date: bson::DateTime,
}

impl YieldRequest {
    /// Validate a yield payload. The payload itself is forwarded untouched;
    /// this only extracts what the history record needs.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let object = payload
            .as_object()
            .ok_or_else(|| GatewayError::Validation("Request body must be a JSON object".into()))?;

        let text = |key: &str| -> Result<String> {
            match object.get(key).and_then(Value::as_str).map(str::trim) {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => Err(GatewayError::Validation(format!("{} is required", key))),
            }
        };

        let crop_type = text("cropType")?;
        let soil_type = text("soilType")?;
        let irrigation = text("irrigation")?;

        let area_acres = match object.get("areaAcres") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .ok_or_else(|| GatewayError::Validation("areaAcres is required".into()))?;

        if !area_acres.is_finite() || area_acres <= 0.0 {
            return Err(GatewayError::Validation("areaAcres must be greater than zero".into()));
        }

        let sowing_date = parse_sowing_date(&text("sowingDate")?)?;

        Ok(Self {
            crop_type,
            soil_type,
            area_acres,
            irrigation,
            sowing_date,
        })
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp
pub fn parse_sowing_date(raw: &str) -> Result<bson::DateTime> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(bson::DateTime::from_chrono(midnight.and_utc()));
        }
    }

    ChronoDateTime::parse_from_rfc3339(raw)
        .map(|dt| bson::DateTime::from_chrono(dt.with_timezone(&Utc)))
        .map_err(|_| GatewayError::Validation(format!("sowingDate is not a valid date: {}", raw)))
}

pub struct RelayService {
    prediction: Arc<dyn PredictionClient>,
    history: Arc<dyn HistoryStore>,
}

impl RelayService {
    pub fn new(prediction: Arc<dyn PredictionClient>, history: Arc<dyn HistoryStore>) -> Self {
        Self { prediction, history }
    }

    /// Classify a leaf image for `identity` and record the diagnosis
    pub async fn scan(&self, identity: ObjectId, image: LeafImage) -> Result<Bytes> {
        let crop_type = image.crop_type.clone();
        let image_name = image.file_name.clone();
        let outcome = self.prediction.classify_leaf(image).await;

        self.relay(SCAN_ROUTE, identity, outcome, |prediction: &DiseasePrediction| {
            let primary = prediction.primary();
            HistoryRecord::DiseaseCase(DiseaseCaseDoc {
                user: identity,
                crop_type,
                image_name: Some(image_name),
                predicted_disease: primary.and_then(|p| p.disease.clone()),
                alt_disease: prediction.alternative_disease(),
                confidence: primary.and_then(|p| p.confidence),
                severity: primary.and_then(|p| p.severity.clone()),
                advice_text: prediction.advice_text(),
                ..Default::default()
            })
        })
        .await
    }

    /// Estimate a yield for `identity` and record the estimate
    pub async fn predict_yield(
        &self,
        identity: ObjectId,
        request: YieldRequest,
        payload: Bytes,
    ) -> Result<Bytes> {
        let outcome = self.prediction.estimate_yield(payload).await;

        self.relay(YIELD_ROUTE, identity, outcome, |estimate: &YieldEstimate| {
            HistoryRecord::YieldPrediction(YieldPredictionDoc {
                user: identity,
                crop_type: request.crop_type,
                soil_type: request.soil_type,
                area_acres: request.area_acres,
                sowing_date: Some(request.sowing_date),
                irrigation: request.irrigation,
                expected_yield_per_acre: estimate.expected_yield_per_acre,
                min_yield: estimate.min_yield,
                max_yield: estimate.max_yield,
                confidence: estimate.confidence_label(),
                notes: estimate.notes_list(),
                ..Default::default()
            })
        })
        .await
    }

    async fn relay<T, F>(
        &self,
        route: &'static str,
        identity: ObjectId,
        outcome: Result<Relayed<T>>,
        to_record: F,
    ) -> Result<Bytes>
    where
        F: FnOnce(&T) -> HistoryRecord,
    {
        let relayed = match outcome {
            Ok(relayed) => relayed,
            Err(e) => {
                warn!(route, identity = %identity, error = %e, "Prediction failed, nothing recorded");
                return Err(e);
            }
        };

        let record = to_record(&relayed.prediction);
        let kind = record.kind();
        let owner = record.user();

        match self.history.append(record).await {
            Ok(id) => info!(route, identity = %owner, record = %id, kind, "History recorded"),
            Err(e) => {
                let failure = GatewayError::Persistence(e.to_string());
                error!(route, identity = %identity, error = %failure, "Prediction returned without history");
            }
        }

        Ok(relayed.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::services::prediction::parse_prediction;
    use bson::DateTime;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SCAN_BODY: &str = r#"{"primary_prediction":{"disease":"Blight","confidence":0.82,"severity":"high"},"advice":{"steps":["Remove infected leaves."]}}"#;
    const YIELD_BODY: &str = r#"{"expected_yield_per_acre":18.5,"min_yield":15.0,"max_yield":21.0,"confidence":"medium","notes":["Good soil"]}"#;

    /// Answers every call with a fixed body, or fails when `body` is None
    struct FixedPrediction {
        body: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl FixedPrediction {
        fn ok(body: &'static str) -> Self {
            Self { body: Some(body), calls: AtomicUsize::new(0) }
        }

        fn failing() -> Self {
            Self { body: None, calls: AtomicUsize::new(0) }
        }

        fn answer<T: serde::de::DeserializeOwned>(&self) -> Result<Relayed<T>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let body = self
                .body
                .ok_or_else(|| GatewayError::Upstream("prediction service returned 500".into()))?;
            Ok(Relayed {
                body: Bytes::from_static(body.as_bytes()),
                prediction: parse_prediction(body.as_bytes())?,
            })
        }
    }

    #[async_trait::async_trait]
    impl PredictionClient for FixedPrediction {
        async fn classify_leaf(&self, _image: LeafImage) -> Result<Relayed<DiseasePrediction>> {
            self.answer()
        }

        async fn estimate_yield(&self, _payload: Bytes) -> Result<Relayed<YieldEstimate>> {
            self.answer()
        }
    }

    /// History store whose writes always fail
    struct BrokenHistory;

    #[async_trait::async_trait]
    impl HistoryStore for BrokenHistory {
        async fn append(&self, _record: HistoryRecord) -> Result<ObjectId> {
            Err(GatewayError::Database("connection reset".into()))
        }

        async fn count_disease_cases(&self, _user: &ObjectId) -> Result<u64> {
            Ok(0)
        }

        async fn high_risk_crop_types(&self, _user: &ObjectId) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn total_expected_yield(&self, _user: &ObjectId) -> Result<f64> {
            Ok(0.0)
        }

        async fn last_yield_prediction_at(&self, _user: &ObjectId) -> Result<Option<DateTime>> {
            Ok(None)
        }
    }

    fn leaf() -> LeafImage {
        LeafImage {
            path: "leaf.jpg".into(),
            len: 3,
            file_name: "leaf.jpg".into(),
            content_type: Some("image/jpeg".into()),
            crop_type: "Tomato".into(),
        }
    }

    fn yield_payload() -> Value {
        json!({
            "cropType": "Wheat",
            "soilType": "Loam",
            "areaAcres": 2.5,
            "irrigation": "Drip",
            "sowingDate": "2024-11-05",
            "rainfallMm": 640
        })
    }

    #[tokio::test]
    async fn test_scan_success_records_case() {
        let store = Arc::new(MemoryStore::new());
        let relay = RelayService::new(Arc::new(FixedPrediction::ok(SCAN_BODY)), store.clone());
        let user = ObjectId::new();

        let body = relay.scan(user, leaf()).await.unwrap();
        assert_eq!(body, Bytes::from_static(SCAN_BODY.as_bytes()));

        let cases = store.disease_cases().await;
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].user, user);
        assert_eq!(cases[0].crop_type, "Tomato");
        assert_eq!(cases[0].predicted_disease.as_deref(), Some("Blight"));
        assert_eq!(cases[0].confidence, Some(0.82));
        assert_eq!(cases[0].severity.as_deref(), Some("high"));
        assert_eq!(cases[0].advice_text.as_deref(), Some("Remove infected leaves."));
        assert_eq!(cases[0].image_name.as_deref(), Some("leaf.jpg"));
    }

    #[tokio::test]
    async fn test_upstream_failure_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let relay = RelayService::new(Arc::new(FixedPrediction::failing()), store.clone());

        let err = relay.scan(ObjectId::new(), leaf()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Upstream(_)));
        assert!(store.disease_cases().await.is_empty());

        let request = YieldRequest::from_payload(&yield_payload()).unwrap();
        let err = relay
            .predict_yield(ObjectId::new(), request, Bytes::from(yield_payload().to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Upstream(_)));
        assert!(store.yield_predictions().await.is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_still_returns_body() {
        let prediction = Arc::new(FixedPrediction::ok(SCAN_BODY));
        let relay = RelayService::new(prediction.clone(), Arc::new(BrokenHistory));

        let body = relay.scan(ObjectId::new(), leaf()).await.unwrap();
        assert_eq!(body, Bytes::from_static(SCAN_BODY.as_bytes()));
        assert_eq!(prediction.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_yield_success_records_estimate() {
        let store = Arc::new(MemoryStore::new());
        let relay = RelayService::new(Arc::new(FixedPrediction::ok(YIELD_BODY)), store.clone());
        let user = ObjectId::new();
        let payload = yield_payload();
        let request = YieldRequest::from_payload(&payload).unwrap();

        let body = relay
            .predict_yield(user, request, Bytes::from(payload.to_string()))
            .await
            .unwrap();
        assert_eq!(body, Bytes::from_static(YIELD_BODY.as_bytes()));

        let records = store.yield_predictions().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].crop_type, "Wheat");
        assert_eq!(records[0].area_acres, 2.5);
        assert_eq!(records[0].expected_yield_per_acre, Some(18.5));
        assert_eq!(records[0].confidence.as_deref(), Some("medium"));
        assert_eq!(records[0].notes, vec!["Good soil".to_string()]);
    }

    #[test]
    fn test_yield_request_validation() {
        assert!(YieldRequest::from_payload(&yield_payload()).is_ok());

        let mut missing = yield_payload();
        missing.as_object_mut().unwrap().remove("soilType");
        assert!(matches!(
            YieldRequest::from_payload(&missing),
            Err(GatewayError::Validation(_))
        ));

        let mut zero_area = yield_payload();
        zero_area["areaAcres"] = json!(0);
        assert!(YieldRequest::from_payload(&zero_area).is_err());

        let mut bad_date = yield_payload();
        bad_date["sowingDate"] = json!("yesterday");
        assert!(YieldRequest::from_payload(&bad_date).is_err());

        assert!(YieldRequest::from_payload(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_sowing_date_formats() {
        let plain = parse_sowing_date("2024-11-05").unwrap();
        let rfc = parse_sowing_date("2024-11-05T00:00:00Z").unwrap();
        assert_eq!(plain, rfc);
    }
}
