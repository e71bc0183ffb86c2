//! History record schemas
//!
//! Disease-scan and yield-prediction records are written once, after the
//! prediction service answered 2xx, and never updated.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for disease-scan records
pub const DISEASE_CASE_COLLECTION: &str = "disease_cases";

/// Collection name for yield-prediction records
pub const YIELD_PREDICTION_COLLECTION: &str = "yield_predictions";

/// Severity label the dashboard treats as high risk
pub const HIGH_SEVERITY: &str = "high";

fn user_recent_index() -> Vec<(Document, Option<IndexOptions>)> {
    vec![(
        doc! { "user": 1, "metadata.created_at": -1 },
        Some(
            IndexOptions::builder()
                .name("user_recent_index".to_string())
                .build(),
        ),
    )]
}

/// Disease-scan record
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct DiseaseCaseDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user: ObjectId,

    /// Crop hint the farmer selected ("auto" when none)
    pub crop_type: String,

    /// Original upload file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_disease: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_disease: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice_text: Option<String>,
}

impl DiseaseCaseDoc {
    pub fn is_high_severity(&self) -> bool {
        self.severity
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case(HIGH_SEVERITY))
    }
}

impl IntoIndexes for DiseaseCaseDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        user_recent_index()
    }
}

impl MutMetadata for DiseaseCaseDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Yield-prediction record
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct YieldPredictionDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user: ObjectId,

    pub crop_type: String,
    pub soil_type: String,
    pub area_acres: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sowing_date: Option<DateTime>,

    pub irrigation: String,

    /// Summed by the dashboard; left unset when the service omitted it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_yield_per_acre: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_yield: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_yield: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,

    #[serde(default)]
    pub notes: Vec<String>,
}

impl IntoIndexes for YieldPredictionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        user_recent_index()
    }
}

impl MutMetadata for YieldPredictionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// A history record of either kind
#[derive(Debug, Clone)]
pub enum HistoryRecord {
    DiseaseCase(DiseaseCaseDoc),
    YieldPrediction(YieldPredictionDoc),
}

impl HistoryRecord {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DiseaseCase(_) => "disease_case",
            Self::YieldPrediction(_) => "yield_prediction",
        }
    }

    pub fn user(&self) -> ObjectId {
        match self {
            Self::DiseaseCase(doc) => doc.user,
            Self::YieldPrediction(doc) => doc.user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_severity_is_case_insensitive() {
        let mut case = DiseaseCaseDoc {
            severity: Some("High".into()),
            ..Default::default()
        };
        assert!(case.is_high_severity());

        case.severity = Some("medium".into());
        assert!(!case.is_high_severity());

        case.severity = None;
        assert!(!case.is_high_severity());
    }

    #[test]
    fn test_missing_yield_not_serialized() {
        let record = YieldPredictionDoc {
            crop_type: "Wheat".into(),
            ..Default::default()
        };
        let doc = bson::to_document(&record).unwrap();
        assert!(!doc.contains_key("expected_yield_per_acre"));
        assert!(doc.contains_key("notes"));
    }
}
