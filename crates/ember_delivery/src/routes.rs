//! Route definitions for the event ingress.

use crate::handlers::{
    like_event_handler, match_event_handler, message_event_handler, IngressState,
};
use axum::{routing::post, Router};
use ember_common::JobQueue;
use std::sync::Arc;

/// Build the event ingress router around a dispatch queue.
pub fn routes(queue: Arc<dyn JobQueue>) -> Router {
    let state = Arc::new(IngressState { queue });

    Router::new()
        .route("/events/like", post(like_event_handler))
        .route("/events/match", post(match_event_handler))
        .route("/events/message", post(message_event_handler))
        .with_state(state)
}
