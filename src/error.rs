use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::tiers::TierId;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("upstream error: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("service not configured: {0}")]
    Config(String),
    #[error("daily quota exceeded")]
    QuotaExceeded { tier: TierId, message: String },
    #[error("style not available on current tier")]
    StyleNotEntitled {
        tier: TierId,
        remaining: u32,
        message: String,
    },
    #[error("{0}")]
    Message(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(?self);
        match self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            AppError::QuotaExceeded { tier, message } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "quota_exceeded",
                    "tier": tier,
                    "message": message,
                    "remaining": 0,
                })),
            )
                .into_response(),
            AppError::StyleNotEntitled {
                tier,
                remaining,
                message,
            } => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "style_not_entitled",
                    "tier": tier,
                    "message": message,
                    "remaining": remaining,
                })),
            )
                .into_response(),
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "service_not_configured" })),
            )
                .into_response(),
            AppError::Upstream(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "rewrite_failed" })),
            )
                .into_response(),
            AppError::Db(_) | AppError::Message(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal_error" })),
            )
                .into_response(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
