//! POST /crop/scan
//!
//! Multipart leaf-image upload relayed to the prediction service. The image
//! is spooled to a temporary file in the upload directory and streamed from there;
//! the file is removed when the handler returns, whatever the outcome.

use futures_util::StreamExt;
use http_body_util::BodyStream;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::routes::response::{authenticate, log_and_respond_with, raw_json_response, BoxBody};
use crate::server::AppState;
use crate::services::relay::SCAN_ROUTE;
use crate::services::LeafImage;
use crate::types::{GatewayError, Result};

/// Crop hint used when the form leaves it out
pub const DEFAULT_CROP_HINT: &str = "auto";

const FAILURE_MESSAGE: &str = "Crop scan failed";

const IMAGE_FIELDS: [&str; 2] = ["image", "file"];
const CROP_HINT_FIELDS: [&str; 3] = ["cropType", "crop_type", "crop_hint"];

/// An upload parked on disk for the lifetime of a request
struct StagedUpload {
    file: NamedTempFile,
    file_name: String,
    content_type: Option<String>,
    len: u64,
}

/// Parsed scan form
struct ScanForm {
    image: Option<StagedUpload>,
    crop_hint: Option<String>,
}

pub async fn handle_scan(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let identity = match authenticate(&req, &state.jwt) {
        Ok(id) => id,
        Err(e) => return log_and_respond_with(SCAN_ROUTE, None, &e, FAILURE_MESSAGE),
    };

    let form = match read_scan_form(req, &state.args.upload_dir, state.args.max_upload_bytes).await {
        Ok(form) => form,
        Err(e) => return log_and_respond_with(SCAN_ROUTE, Some(&identity), &e, FAILURE_MESSAGE),
    };

    let staged = match form.image {
        Some(staged) if staged.len > 0 => staged,
        _ => {
            let e = GatewayError::Validation("Image file is required".into());
            return log_and_respond_with(SCAN_ROUTE, Some(&identity), &e, FAILURE_MESSAGE);
        }
    };

    let image = LeafImage {
        path: staged.file.path().to_path_buf(),
        len: staged.len,
        file_name: staged.file_name.clone(),
        content_type: staged.content_type.clone(),
        crop_type: form.crop_hint.unwrap_or_else(|| DEFAULT_CROP_HINT.to_string()),
    };

    let result = state.relay.scan(identity, image).await;

    // Dropping the staged upload deletes the temp file
    drop(staged);

    match result {
        Ok(body) => raw_json_response(StatusCode::OK, body),
        Err(e) => log_and_respond_with(SCAN_ROUTE, Some(&identity), &e, FAILURE_MESSAGE),
    }
}

/// Parse the multipart form, spooling the image part to disk
async fn read_scan_form(req: Request<Incoming>, upload_dir: &Path, max_bytes: u64) -> Result<ScanForm> {
    let content_type = req
        .headers()
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| GatewayError::Validation("Expected a multipart/form-data body".into()))?;
    let boundary = multer::parse_boundary(content_type)?;

    let stream = BodyStream::new(req.into_body())
        .filter_map(|frame| async move { frame.map(|f| f.into_data().ok()).transpose() });

    let constraints = multer::Constraints::new()
        .size_limit(multer::SizeLimit::new().whole_stream(max_bytes));
    let mut multipart = multer::Multipart::with_constraints(stream, boundary, constraints);

    let mut form = ScanForm {
        image: None,
        crop_hint: None,
    };

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if IMAGE_FIELDS.contains(&name.as_str()) && form.image.is_none() {
            let file_name = field
                .file_name()
                .map(str::to_string)
                .unwrap_or_else(|| "upload".to_string());
            let content_type = field.content_type().map(|m| m.to_string());

            let temp = tempfile::Builder::new()
                .prefix("scan-")
                .tempfile_in(upload_dir)?;
            let mut writer = tokio::fs::File::from_std(temp.as_file().try_clone()?);

            let mut len = 0u64;
            while let Some(chunk) = field.chunk().await? {
                len += chunk.len() as u64;
                writer.write_all(&chunk).await?;
            }
            writer.flush().await?;

            debug!(file_name = %file_name, bytes = len, "Staged scan upload");
            form.image = Some(StagedUpload {
                file: temp,
                file_name,
                content_type,
                len,
            });
        } else if CROP_HINT_FIELDS.contains(&name.as_str()) {
            let hint = field.text().await?;
            let hint = hint.trim();
            if !hint.is_empty() && form.crop_hint.is_none() {
                form.crop_hint = Some(hint.to_string());
            }
        }
    }

    Ok(form)
}
