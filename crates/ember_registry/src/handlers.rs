//! HTTP handlers for device-token registration and revocation.
//!
//! Registration and revocation are synchronous writes against the registry:
//! they are low-volume, idempotent, and gain nothing from the dispatch
//! queue. Schema violations return 400 with the offending field named;
//! store unavailability surfaces as 500.

use axum::{
    extract::{Json, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use ember_common::models::{Ack, ErrorBody};
use ember_common::{DeviceTokenRecord, TokenRegistry, TokenType};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Shared state for the registry handlers.
#[derive(Clone)]
pub struct RegistryState {
    pub registry: Arc<dyn TokenRegistry>,
}

/// Request body for `POST /notifications/device-token`.
///
/// Every field is optional at the serde level so validation can answer with
/// a 400 naming the missing field instead of a generic decode failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceTokenRequest {
    pub user_id: Option<String>,
    pub device_token: Option<String>,
    pub token_type: Option<String>,
    pub platform: Option<String>,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub app_version: Option<String>,
}

/// Body for `DELETE /notifications/device-token`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeDeviceTokenBody {
    pub device_token: Option<String>,
}

/// Query parameters for `DELETE /notifications/device-token`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeDeviceTokenQuery {
    pub device_token: Option<String>,
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody::new(message))).into_response()
}

fn require(value: Option<String>, field: &str) -> Result<String, Response> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(bad_request(format!("{field} is required"))),
    }
}

#[axum::debug_handler]
pub async fn register_device_token_handler(
    State(state): State<Arc<RegistryState>>,
    headers: HeaderMap,
    Json(payload): Json<RegisterDeviceTokenRequest>,
) -> Response {
    // userId comes from the body or, for clients that authenticate at the
    // gateway, from the x-user-id header.
    let header_user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let user_id = match require(payload.user_id.or(header_user_id), "userId") {
        Ok(v) => v,
        Err(response) => return response,
    };
    let device_token = match require(payload.device_token, "deviceToken") {
        Ok(v) => v,
        Err(response) => return response,
    };
    let token_type_raw = match require(payload.token_type, "tokenType") {
        Ok(v) => v,
        Err(response) => return response,
    };
    let Some(token_type) = TokenType::parse(&token_type_raw) else {
        return bad_request("tokenType must be one of: fcm, apns");
    };
    let platform = match require(payload.platform, "platform") {
        Ok(v) => v,
        Err(response) => return response,
    };

    debug!("registering {} device token for user {}", token_type, user_id);

    let record = DeviceTokenRecord {
        user_id: user_id.clone(),
        device_token,
        token_type,
        platform,
        device_id: payload.device_id,
        device_name: payload.device_name,
        app_version: payload.app_version,
        enabled: true,
        updated_at: Utc::now(),
    };

    match state.registry.upsert(record).await {
        Ok(()) => {
            info!("device token registered for user {}", user_id);
            Json(Ack::ok()).into_response()
        }
        Err(err) => {
            error!("failed to register device token: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new("registry unavailable")),
            )
                .into_response()
        }
    }
}

#[axum::debug_handler]
pub async fn revoke_device_token_handler(
    State(state): State<Arc<RegistryState>>,
    Query(query): Query<RevokeDeviceTokenQuery>,
    body: Option<Json<RevokeDeviceTokenBody>>,
) -> Response {
    let from_body = body.and_then(|Json(b)| b.device_token);
    let device_token = match require(from_body.or(query.device_token), "deviceToken") {
        Ok(v) => v,
        Err(response) => return response,
    };

    match state.registry.disable(&device_token).await {
        Ok(()) => {
            info!("device token revoked");
            Json(Ack::ok()).into_response()
        }
        Err(err) => {
            error!("failed to revoke device token: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new("registry unavailable")),
            )
                .into_response()
        }
    }
}
