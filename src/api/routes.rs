use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::api::handlers;
use crate::api::middleware::{bearer_auth, request_logging};
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new().route("/health", get(handlers::health_check));

    // Webhook route: authenticated by the gateway signature, not a bearer token
    let webhook_routes = Router::new().route("/webhooks/razorpay", post(handlers::razorpay_webhook));

    // Payment routes behind bearer-token auth
    let payment_routes = Router::new()
        .route("/create-order", post(handlers::create_order))
        .route("/verify", post(handlers::verify_payment))
        .route("/refund", post(handlers::refund_payment))
        .route("/history", get(handlers::payment_history))
        .layer(middleware::from_fn_with_state(state.clone(), bearer_auth));

    Router::new()
        .merge(public_routes)
        .merge(webhook_routes)
        .nest("/api/v1/payments", payment_routes)
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(middleware::from_fn(request_logging))
        .with_state(state)
}
