//! Dashboard overview
//!
//! Read-only aggregate over the caller's fields, crops and history records.

use bson::oid::ObjectId;
use serde::Serialize;
use std::sync::Arc;

use crate::db::store::{FieldStore, HistoryStore, IdentityStore};
use crate::types::{GatewayError, Result};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardUser {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub user: DashboardUser,
    pub field_count: u64,
    pub active_crops: u64,
    pub disease_cases: u64,
    pub high_risk_crops: u64,
    pub total_expected_yield: f64,
    /// `YYYY-MM-DD` of the newest yield prediction
    pub last_prediction_date: Option<String>,
    pub alerts: Vec<String>,
}

pub struct DashboardService {
    identities: Arc<dyn IdentityStore>,
    fields: Arc<dyn FieldStore>,
    history: Arc<dyn HistoryStore>,
}

impl DashboardService {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        fields: Arc<dyn FieldStore>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            identities,
            fields,
            history,
        }
    }

    pub async fn overview(&self, identity: &ObjectId) -> Result<DashboardOverview> {
        let user = self
            .identities
            .find_by_id(identity)
            .await?
            .ok_or_else(|| GatewayError::Unauthenticated("Unknown identity".into()))?;

        let field_ids: Vec<ObjectId> = self
            .fields
            .fields_for(identity)
            .await?
            .into_iter()
            .filter_map(|field| field._id)
            .collect();

        let field_count = self.fields.count_fields(identity).await?;
        let active_crops = self.fields.count_crops(&field_ids).await?;
        let disease_cases = self.history.count_disease_cases(identity).await?;
        let high_risk = self.history.high_risk_crop_types(identity).await?;
        let total_expected_yield = self.history.total_expected_yield(identity).await?;
        let last_prediction_date = self
            .history
            .last_yield_prediction_at(identity)
            .await?
            .map(|at| at.to_chrono().format("%Y-%m-%d").to_string());

        let alerts = high_risk
            .iter()
            .map(|crop| format!("High disease risk detected on {}", crop))
            .collect();

        Ok(DashboardOverview {
            user: DashboardUser { name: user.name },
            field_count,
            active_crops,
            disease_cases,
            high_risk_crops: high_risk.len() as u64,
            total_expected_yield,
            last_prediction_date,
            alerts,
        })
    }
}
