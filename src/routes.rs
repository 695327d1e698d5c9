use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};

use crate::{rewrite, webhooks};

async fn preflight() -> StatusCode {
    // CORS headers come from the CorsLayer wrapping the router.
    StatusCode::NO_CONTENT
}

pub fn api_routes() -> Router {
    Router::new()
        .route("/rewrite", post(rewrite::rewrite).options(preflight))
        .route("/usage", get(rewrite::usage_status))
        .route("/api/billing/webhook", post(webhooks::billing_webhook))
}
