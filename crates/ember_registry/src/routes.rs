use axum::{routing::post, Router};
use ember_common::TokenRegistry;
use std::sync::Arc;
use tracing::info;

use crate::handlers::{
    register_device_token_handler, revoke_device_token_handler, RegistryState,
};

/// Routes for device-token registration and revocation.
///
/// The registry implementation is injected by the composition root so
/// tests can run against the in-memory store.
pub fn routes(registry: Arc<dyn TokenRegistry>) -> Router {
    info!("registry routes initialized");

    let state = Arc::new(RegistryState { registry });

    Router::new()
        .route(
            "/notifications/device-token",
            post(register_device_token_handler).delete(revoke_device_token_handler),
        )
        .with_state(state)
}
