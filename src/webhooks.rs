use axum::{extract::Extension, http::StatusCode, Json};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use sqlx::PgPool;
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::ledger::UsageLedger;
use crate::tiers::TierId;

/// Billing-provider event envelope. Only the subscription lifecycle events
/// matter here; everything else is acknowledged and dropped.
#[derive(Debug, Deserialize)]
pub struct BillingWebhookEvent {
    pub event: String,
    pub user_id: String,
    #[serde(default)]
    pub data: Value,
}

fn verify_signature(headers: &axum::http::HeaderMap, body: &[u8]) -> Result<(), AppError> {
    let Some(secret) = crate::config::BILLING_WEBHOOK_SECRET.as_deref() else {
        return Err(AppError::Config("BILLING_WEBHOOK_SECRET is not set".into()));
    };
    let sig = headers
        .get("x-webhook-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing signature".into()))?;
    let expected = {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can use any key length");
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    };
    if expected != sig {
        return Err(AppError::Message("webhook signature mismatch".into()));
    }
    Ok(())
}

/// Handle billing subscription events, verified with the shared HMAC secret
/// over the raw body. Tier changes take effect on the user's next rewrite;
/// the quota engine reads the tier fresh on every request.
pub async fn billing_webhook(
    Extension(pool): Extension<PgPool>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> AppResult<StatusCode> {
    verify_signature(&headers, &body)?;

    let payload: BillingWebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("malformed webhook body: {e}")))?;

    let ledger = UsageLedger::new(pool);
    match payload.event.as_str() {
        "subscription.created" | "subscription.updated" => {
            let tier = payload
                .data
                .get("tier")
                .and_then(Value::as_str)
                .map(TierId::parse_or_free)
                .unwrap_or(TierId::Free);
            let subscription_id = payload.data.get("subscription_id").and_then(Value::as_str);
            ledger
                .set_tier(&payload.user_id, tier, subscription_id)
                .await
                .map_err(|e| {
                    error!(?e, user_id = %payload.user_id, "tier update failed");
                    AppError::Message("tier update failed".into())
                })?;
            info!(user_id = %payload.user_id, tier = tier.as_str(), "tier updated from billing event");
            Ok(StatusCode::OK)
        }
        "subscription.deleted" | "subscription.canceled" => {
            ledger
                .cancel_subscription(&payload.user_id)
                .await
                .map_err(|e| {
                    error!(?e, user_id = %payload.user_id, "cancellation failed");
                    AppError::Message("cancellation failed".into())
                })?;
            info!(user_id = %payload.user_id, "subscription canceled; tier reset to free");
            Ok(StatusCode::OK)
        }
        other => {
            info!(event = other, "ignoring unhandled billing event");
            Ok(StatusCode::OK)
        }
    }
}
