//! Device report route

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::ingest::{IngestError, IngestRequest};
use crate::store::DeviceCredential;

/// Header carrying the device credential
pub const DEVICE_KEY_HEADER: &str = "x-device-key";

/// `POST /api/v1/iot/gps`
pub async fn ingest_gps(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Response {
    let Some(credential) = device_credential(&headers) else {
        return IngestError::Unauthenticated.into_response();
    };

    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            let status = match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            return error_response(status, &rejection.body_text());
        }
    };

    match state.pipeline.ingest(&credential, request).await {
        Ok(_) => StatusCode::ACCEPTED.into_response(),
        Err(e) => e.into_response(),
    }
}

fn device_credential(headers: &HeaderMap) -> Option<DeviceCredential> {
    let key = headers.get(DEVICE_KEY_HEADER)?.to_str().ok()?.trim();
    if key.is_empty() {
        return None;
    }
    Some(DeviceCredential::new(key))
}

pub(crate) fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = match &self {
            IngestError::Unauthenticated => StatusCode::UNAUTHORIZED,
            IngestError::Unroutable(_) | IngestError::InvalidSample(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            IngestError::StorageFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Store details stay in the server log
        let message = match &self {
            IngestError::StorageFailure(_) => "storage failure".to_string(),
            other => other.to_string(),
        };
        error_response(status, &message)
    }
}
