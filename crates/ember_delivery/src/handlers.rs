//! HTTP handlers for the event ingress.
//!
//! These endpoints sit between the product services and the dispatch
//! queue: they validate, map the event to a payload, and enqueue. A 200
//! means "durably queued", never "delivered"; delivery happens in the
//! worker.

use crate::events;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ember_common::models::{Ack, ErrorBody};
use ember_common::{JobQueue, PushJob, PushPayload};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

/// Shared state for the ingress handlers.
#[derive(Clone)]
pub struct IngressState {
    pub queue: Arc<dyn JobQueue>,
}

/// Body for `POST /events/like` and `POST /events/match`.
///
/// Fields are optional at the serde level so validation can answer with a
/// 400 naming the missing field instead of a generic decode failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialEventRequest {
    pub recipient_user_id: Option<String>,
    pub sender_user_id: Option<String>,
    pub sender_name: Option<String>,
}

/// Body for `POST /events/message`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEventRequest {
    pub recipient_user_id: Option<String>,
    pub sender_user_id: Option<String>,
    pub sender_name: Option<String>,
    pub thread_id: Option<String>,
    pub message_preview: Option<String>,
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

async fn enqueue(
    state: &IngressState,
    event_type: &str,
    recipient_user_id: String,
    payload: PushPayload,
) -> Response {
    let job = PushJob {
        user_id: recipient_user_id,
        payload,
    };

    match state.queue.enqueue(job).await {
        Ok(()) => {
            info!(event = event_type, "event queued for delivery");
            Json(Ack::ok()).into_response()
        }
        Err(err) => {
            error!(event = event_type, "failed to enqueue event: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new("queue unavailable")),
            )
                .into_response()
        }
    }
}

#[axum::debug_handler]
pub async fn like_event_handler(
    State(state): State<Arc<IngressState>>,
    Json(payload): Json<SocialEventRequest>,
) -> Response {
    let recipient = match require(payload.recipient_user_id, "recipientUserId") {
        Ok(v) => v,
        Err(response) => return response,
    };
    let sender_user_id = match require(payload.sender_user_id, "senderUserId") {
        Ok(v) => v,
        Err(response) => return response,
    };
    let sender_name = match require(payload.sender_name, "senderName") {
        Ok(v) => v,
        Err(response) => return response,
    };

    let payload = events::like_payload(&sender_name, &sender_user_id);
    enqueue(&state, "like", recipient, payload).await
}

#[axum::debug_handler]
pub async fn match_event_handler(
    State(state): State<Arc<IngressState>>,
    Json(payload): Json<SocialEventRequest>,
) -> Response {
    let recipient = match require(payload.recipient_user_id, "recipientUserId") {
        Ok(v) => v,
        Err(response) => return response,
    };
    let sender_user_id = match require(payload.sender_user_id, "senderUserId") {
        Ok(v) => v,
        Err(response) => return response,
    };
    let sender_name = match require(payload.sender_name, "senderName") {
        Ok(v) => v,
        Err(response) => return response,
    };

    let payload = events::match_payload(&sender_name, &sender_user_id);
    enqueue(&state, "match", recipient, payload).await
}

#[axum::debug_handler]
pub async fn message_event_handler(
    State(state): State<Arc<IngressState>>,
    Json(payload): Json<MessageEventRequest>,
) -> Response {
    let recipient = match require(payload.recipient_user_id, "recipientUserId") {
        Ok(v) => v,
        Err(response) => return response,
    };
    let sender_user_id = match require(payload.sender_user_id, "senderUserId") {
        Ok(v) => v,
        Err(response) => return response,
    };
    let sender_name = match require(payload.sender_name, "senderName") {
        Ok(v) => v,
        Err(response) => return response,
    };
    let thread_id = match require(payload.thread_id, "threadId") {
        Ok(v) => v,
        Err(response) => return response,
    };
    let message_preview = match require(payload.message_preview, "messagePreview") {
        Ok(v) => v,
        Err(response) => return response,
    };

    let payload =
        events::message_payload(&sender_name, &sender_user_id, &thread_id, &message_preview);
    enqueue(&state, "message", recipient, payload).await
}
