//! Prediction service client
//!
//! The prediction service is an opaque HTTP collaborator. It classifies leaf
//! images at `/ml/disease` and estimates yields at `/ml/yield`. The gateway
//! forwards payloads unmodified, makes exactly one call per request and never
//! retries. A 2xx answer is handed back byte-for-byte together with the few
//! fields the history records need.

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

use crate::types::{GatewayError, Result};

// ============================================================================
// Types
// ============================================================================

/// A leaf image staged on disk for classification
///
/// The file is streamed to the prediction service; the caller keeps it alive
/// until the call returns.
#[derive(Debug, Clone)]
pub struct LeafImage {
    pub path: PathBuf,
    pub len: u64,
    pub file_name: String,
    pub content_type: Option<String>,
    /// Crop hint selected by the farmer ("auto" when none)
    pub crop_type: String,
}

/// A successful prediction: the raw body plus its parsed view
#[derive(Debug, Clone)]
pub struct Relayed<T> {
    pub body: Bytes,
    pub prediction: T,
}

/// One ranked classification candidate
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiseaseCandidate {
    #[serde(default)]
    pub disease: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub severity: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Advice {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub steps: Vec<String>,
}

/// The fields of a disease classification the gateway records
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiseasePrediction {
    #[serde(default)]
    pub primary_prediction: Option<DiseaseCandidate>,
    #[serde(default)]
    pub secondary_prediction: Option<DiseaseCandidate>,
    #[serde(default)]
    pub top3: Vec<DiseaseCandidate>,
    #[serde(default)]
    pub advice: Option<Advice>,
}

impl DiseasePrediction {
    pub fn primary(&self) -> Option<&DiseaseCandidate> {
        self.primary_prediction.as_ref()
    }

    /// Runner-up disease, taken from the ranked list when the service does
    /// not name one explicitly
    pub fn alternative_disease(&self) -> Option<String> {
        self.secondary_prediction
            .as_ref()
            .and_then(|c| c.disease.clone())
            .or_else(|| self.top3.get(1).and_then(|c| c.disease.clone()))
    }

    /// Advice steps joined into one line
    pub fn advice_text(&self) -> Option<String> {
        self.advice
            .as_ref()
            .filter(|a| !a.steps.is_empty())
            .map(|a| a.steps.join(" "))
    }
}

/// The fields of a yield estimate the gateway records
#[derive(Debug, Clone, Default, Deserialize)]
pub struct YieldEstimate {
    #[serde(default)]
    pub expected_yield_per_acre: Option<f64>,
    #[serde(default)]
    pub min_yield: Option<f64>,
    #[serde(default)]
    pub max_yield: Option<f64>,
    /// Either a label ("medium") or a number
    #[serde(default)]
    pub confidence: Option<Value>,
    /// Either a list of strings or a single string
    #[serde(default)]
    pub notes: Option<Value>,
}

impl YieldEstimate {
    pub fn confidence_label(&self) -> Option<String> {
        match self.confidence.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn notes_list(&self) -> Vec<String> {
        match &self.notes {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

// ============================================================================
// Client trait
// ============================================================================

#[async_trait::async_trait]
pub trait PredictionClient: Send + Sync {
    /// Classify a leaf image
    async fn classify_leaf(&self, image: LeafImage) -> Result<Relayed<DiseasePrediction>>;

    /// Estimate a yield from the caller's JSON body, forwarded byte-for-byte
    async fn estimate_yield(&self, payload: Bytes) -> Result<Relayed<YieldEstimate>>;
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// reqwest-backed prediction client
#[derive(Clone)]
pub struct HttpPredictionClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpPredictionClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait::async_trait]
impl PredictionClient for HttpPredictionClient {
    async fn classify_leaf(&self, image: LeafImage) -> Result<Relayed<DiseasePrediction>> {
        let file = tokio::fs::File::open(&image.path).await?;
        let mut part = Part::stream_with_length(reqwest::Body::from(file), image.len)
            .file_name(image.file_name);
        if let Some(content_type) = image.content_type.as_deref() {
            part = part
                .mime_str(content_type)
                .map_err(|e| GatewayError::Validation(format!("Invalid image content type: {}", e)))?;
        }

        let form = Form::new()
            .part("file", part)
            .text("crop_type", image.crop_type);

        let url = self.endpoint("/ml/disease");
        debug!(url = %url, "Forwarding leaf image");

        let response = self.http.post(&url).multipart(form).send().await?;
        read_prediction(response).await
    }

    async fn estimate_yield(&self, payload: Bytes) -> Result<Relayed<YieldEstimate>> {
        let url = self.endpoint("/ml/yield");
        debug!(url = %url, "Forwarding yield request");

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;
        read_prediction(response).await
    }
}

/// Turn a prediction service response into a `Relayed` value
async fn read_prediction<T: DeserializeOwned>(response: reqwest::Response) -> Result<Relayed<T>> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let snippet: String = String::from_utf8_lossy(&body).chars().take(200).collect();
        return Err(GatewayError::Upstream(format!(
            "prediction service returned {}: {}",
            status, snippet
        )));
    }

    let prediction = parse_prediction(&body)?;
    Ok(Relayed { body, prediction })
}

/// Parse a 2xx body. Anything but a JSON object is an upstream failure.
pub fn parse_prediction<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| GatewayError::Upstream(format!("response is not JSON: {}", e)))?;

    if !value.is_object() {
        return Err(GatewayError::Upstream("response is not a JSON object".into()));
    }

    serde_json::from_value(value)
        .map_err(|e| GatewayError::Upstream(format!("unexpected response shape: {}", e)))
}
