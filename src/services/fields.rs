//! Field and crop registry
//!
//! Fields belong to the identity that created them. Crops can only be added
//! to a field the caller owns; anything else looks like a missing field.

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::db::schemas::{CropDoc, FieldDoc, GeoPoint};
use crate::db::store::FieldStore;
use crate::services::relay::parse_sowing_date;
use crate::types::{GatewayError, Result};

pub const DEFAULT_FIELD_NAME: &str = "Main Field";
pub const DEFAULT_SOIL_TYPE: &str = "Unknown";
pub const DEFAULT_AREA_ACRES: f64 = 1.0;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFieldInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub area_acres: Option<f64>,
    #[serde(default)]
    pub soil_type: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCropInput {
    #[serde(default)]
    pub crop_type: Option<String>,
    #[serde(default)]
    pub variety: Option<String>,
    #[serde(default)]
    pub sowing_date: Option<String>,
    #[serde(default)]
    pub irrigation: Option<String>,
    #[serde(default)]
    pub season_year: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldResponse {
    pub id: String,
    pub name: String,
    pub area_acres: f64,
    pub soil_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl FieldResponse {
    fn from_doc(id: ObjectId, doc: FieldDoc) -> Self {
        Self {
            id: id.to_hex(),
            name: doc.name,
            area_acres: doc.area_acres,
            soil_type: doc.soil_type,
            location: doc.location,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CropResponse {
    pub id: String,
    pub field_id: String,
    pub crop_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variety: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sowing_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub irrigation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_year: Option<i32>,
}

pub struct FieldService {
    fields: Arc<dyn FieldStore>,
}

impl FieldService {
    pub fn new(fields: Arc<dyn FieldStore>) -> Self {
        Self { fields }
    }

    pub async fn create_field(&self, user: ObjectId, input: CreateFieldInput) -> Result<FieldResponse> {
        let area_acres = input.area_acres.unwrap_or(DEFAULT_AREA_ACRES);
        if !area_acres.is_finite() || area_acres <= 0.0 {
            return Err(GatewayError::Validation("areaAcres must be greater than zero".into()));
        }

        let doc = FieldDoc {
            user,
            name: non_empty(input.name).unwrap_or_else(|| DEFAULT_FIELD_NAME.to_string()),
            area_acres,
            soil_type: non_empty(input.soil_type).unwrap_or_else(|| DEFAULT_SOIL_TYPE.to_string()),
            location: input.location,
            ..Default::default()
        };

        let id = self.fields.create_field(doc.clone()).await?;
        info!(identity = %user, field = %id, "Field created");

        Ok(FieldResponse::from_doc(id, doc))
    }

    pub async fn list_fields(&self, user: &ObjectId) -> Result<Vec<FieldResponse>> {
        let fields = self.fields.fields_for(user).await?;
        Ok(fields
            .into_iter()
            .filter_map(|doc| doc._id.map(|id| FieldResponse::from_doc(id, doc)))
            .collect())
    }

    pub async fn add_crop(
        &self,
        user: &ObjectId,
        field_id: &str,
        input: CreateCropInput,
    ) -> Result<CropResponse> {
        let not_found = || GatewayError::NotFound(format!("Field {}", field_id));

        let field = ObjectId::parse_str(field_id).map_err(|_| not_found())?;
        if self.fields.find_owned_field(&field, user).await?.is_none() {
            return Err(not_found());
        }

        let crop_type = non_empty(input.crop_type)
            .ok_or_else(|| GatewayError::Validation("cropType is required".into()))?;
        let sowing_date = non_empty(input.sowing_date)
            .map(|raw| parse_sowing_date(&raw))
            .transpose()?;

        let doc = CropDoc {
            field,
            crop_type,
            variety: non_empty(input.variety),
            sowing_date,
            irrigation: non_empty(input.irrigation),
            season_year: input.season_year,
            ..Default::default()
        };

        let id = self.fields.create_crop(doc.clone()).await?;
        info!(identity = %user, field = %field, crop = %id, "Crop registered");

        Ok(CropResponse {
            id: id.to_hex(),
            field_id: field.to_hex(),
            crop_type: doc.crop_type,
            variety: doc.variety,
            sowing_date: doc
                .sowing_date
                .map(|d| d.to_chrono().format("%Y-%m-%d").to_string()),
            irrigation: doc.irrigation,
            season_year: doc.season_year,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
