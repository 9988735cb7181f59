//! Composition root for the Ember push backend.
//!
//! Wires the token registry, the provider adapters, the Redis dispatch
//! queue, and the delivery workers together, then serves the HTTP
//! ingress. Construction is fail-fast: a missing env var, an unreadable
//! signing key, or an unreachable registry store aborts startup instead
//! of failing on the first request.

use axum::{routing::get, Json, Router};
use ember_apns::ApnsClient;
use ember_common::logging;
use ember_common::{JobQueue, PushDeliverer, TokenRegistry};
use ember_config::load_config;
use ember_delivery::DeliveryService;
use ember_fcm::FcmClient;
use ember_queue::{PushWorker, RedisJobQueue, RetryPolicy};
use ember_registry::{DbClient, SqlTokenRegistry};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

#[axum::debug_handler]
async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "status": "up" }))
}

#[tokio::main]
async fn main() {
    logging::init();

    let config = Arc::new(load_config().expect("failed to load configuration"));

    let db = DbClient::from_config(&config.database)
        .await
        .expect("failed to connect to the registry store");
    let registry = SqlTokenRegistry::new(db);
    registry
        .init_schema()
        .await
        .expect("failed to initialize the device_tokens schema");
    let registry: Arc<dyn TokenRegistry> = Arc::new(registry);

    let provider_timeout = Duration::from_secs(config.worker.provider_timeout_secs);
    let fcm = FcmClient::new(&config.firebase, provider_timeout)
        .await
        .expect("failed to initialize the FCM client");
    let apns = ApnsClient::new(&config.apns, provider_timeout)
        .await
        .expect("failed to initialize the APNs client");

    let queue: Arc<dyn JobQueue> =
        Arc::new(RedisJobQueue::new(&config.redis).expect("failed to create the Redis pool"));

    let deliverer: Arc<dyn PushDeliverer> = Arc::new(
        DeliveryService::new(registry.clone())
            .with_provider(Arc::new(fcm))
            .with_provider(Arc::new(apns)),
    );

    let policy = RetryPolicy::from_config(&config.worker);
    for _ in 0..config.worker.concurrency {
        let worker = PushWorker::new(queue.clone(), deliverer.clone(), policy);
        tokio::spawn(worker.run());
    }
    info!(workers = config.worker.concurrency, "delivery workers started");

    let app = Router::new()
        .route("/health", get(health_handler))
        .merge(ember_registry::routes(registry.clone()))
        .merge(ember_delivery::routes(queue.clone()))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("failed to bind the listen address");
    info!("ember push backend listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}
