use axum::{extract::Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, warn};

use crate::error::{AppError, AppResult};
use crate::extractor::CallerIdentity;
use crate::ledger::{UsageLedger, UsageRecord};
use crate::quota::{self, Decision};
use crate::tiers::{self, StyleId, TierId};
use crate::transform::{TextTransformer, TransformError};

#[derive(Debug, Deserialize)]
pub struct RewriteRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub style: String,
}

#[derive(Debug, Serialize)]
pub struct RewriteResponse {
    pub result: String,
    pub remaining: u32,
}

fn quota_message(tier: TierId, upgrade: Option<(TierId, u32)>) -> String {
    let limit = tiers::definition(tier).daily_quota;
    match upgrade {
        Some((next, next_quota)) => format!(
            "You've used all {limit} rewrites on the {} plan today. Upgrade to {} for {next_quota} rewrites per day.",
            tier.as_str(),
            next.as_str(),
        ),
        None => format!(
            "You've used all {limit} rewrites on the {} plan today. Your quota resets at midnight UTC.",
            tier.as_str(),
        ),
    }
}

fn style_message(raw_style: &str, unlocked_by: &[TierId]) -> String {
    if unlocked_by.is_empty() {
        format!("'{raw_style}' is not a recognized style.")
    } else {
        let plans = unlocked_by
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(" or ");
        format!("The {raw_style} style is available on the {plans} plan.")
    }
}

/// POST /rewrite — the one metered operation. Admission and commit are
/// deliberately split: a failed generation must not cost a quota unit.
pub async fn rewrite(
    Extension(pool): Extension<PgPool>,
    Extension(transformer): Extension<Arc<dyn TextTransformer>>,
    identity: CallerIdentity,
    Json(payload): Json<RewriteRequest>,
) -> AppResult<Json<RewriteResponse>> {
    let text = payload.text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("text is required".into()));
    }
    if payload.style.trim().is_empty() {
        return Err(AppError::BadRequest("style is required".into()));
    }
    let style = StyleId::parse(&payload.style);

    let ledger = UsageLedger::new(pool);
    let today = Utc::now().date_naive();

    // Ledger read failures degrade to unmetered service rather than a 500;
    // accounting is secondary to availability here.
    let mut record: Option<UsageRecord> = match identity.user_id() {
        Some(user_id) => match ledger.load_or_create(user_id, today).await {
            Ok(record) => Some(record),
            Err(e) => {
                error!(?e, user_id, "usage record load failed; serving unmetered");
                None
            }
        },
        None => None,
    };

    // Persist the day rollover before the decision is returned, so a
    // rejection does not lose the reset.
    if let Some(rec) = record.as_ref() {
        if rec.last_rewrite_date != today {
            if let Err(e) = ledger.apply_rollover(&rec.user_id, today).await {
                error!(?e, user_id = %rec.user_id, "rollover persist failed");
            }
        }
    }

    match quota::evaluate(record.as_mut(), style, today) {
        Decision::Admit => {}
        Decision::QuotaExceeded { tier, upgrade } => {
            return Err(AppError::QuotaExceeded {
                tier,
                message: quota_message(tier, upgrade),
            });
        }
        Decision::StyleNotEntitled {
            tier,
            remaining,
            unlocked_by,
        } => {
            return Err(AppError::StyleNotEntitled {
                tier,
                remaining,
                message: style_message(payload.style.trim(), &unlocked_by),
            });
        }
    }

    // Metered admission establishes entitlement, so style is known there.
    // Anonymous callers skip that check and can still carry an unknown
    // style; reject it the same way.
    let Some(style) = style else {
        return Err(AppError::StyleNotEntitled {
            tier: TierId::Free,
            remaining: tiers::definition(TierId::Free).daily_quota,
            message: style_message(payload.style.trim(), &[]),
        });
    };

    let result = match transformer.rewrite(text, style).await {
        Ok(result) => result,
        Err(TransformError::MissingCredential) => {
            return Err(AppError::Config("language-model credential missing".into()));
        }
        Err(TransformError::Upstream(e)) => return Err(AppError::Upstream(e)),
        Err(e @ TransformError::EmptyCompletion) => {
            return Err(AppError::Message(e.to_string()));
        }
    };

    let remaining = match record.as_mut() {
        Some(rec) => {
            let limit = tiers::definition(rec.tier).daily_quota;
            quota::commit(rec);
            match ledger.commit_rewrite(&rec.user_id, today, limit).await {
                Ok(Some(stored)) => *rec = stored,
                Ok(None) => {
                    warn!(user_id = %rec.user_id, "concurrent commit took the last quota slot");
                }
                Err(e) => error!(?e, user_id = %rec.user_id, "usage commit failed"),
            }
            if let Err(e) = ledger
                .record_history(&rec.user_id, style, text.chars().count(), result.chars().count())
                .await
            {
                warn!(?e, user_id = %rec.user_id, "history insert failed");
            }
            quota::remaining_after(rec)
        }
        None => tiers::definition(TierId::Free).daily_quota,
    };

    Ok(Json(RewriteResponse { result, remaining }))
}

#[derive(Debug, Serialize)]
pub struct UsageStatus {
    pub tier: TierId,
    pub limit: u32,
    pub remaining: u32,
    pub rewrites_total: i64,
    pub styles: Vec<StyleId>,
}

/// GET /usage — read-only view of the caller's allowance. Anonymous callers
/// see the free-tier defaults.
pub async fn usage_status(
    Extension(pool): Extension<PgPool>,
    identity: CallerIdentity,
) -> AppResult<Json<UsageStatus>> {
    let today = Utc::now().date_naive();
    let (tier, used_today, total) = match identity.user_id() {
        Some(user_id) => {
            let ledger = UsageLedger::new(pool);
            let record = ledger.load_or_create(user_id, today).await.map_err(|e| {
                error!(?e, user_id, "usage record load failed");
                AppError::Message("usage lookup failed".into())
            })?;
            let used = if record.last_rewrite_date == today {
                record.rewrites_today
            } else {
                0
            };
            (record.tier, used, record.rewrites_total)
        }
        None => (TierId::Free, 0, 0),
    };

    let def = tiers::definition(tier);
    Ok(Json(UsageStatus {
        tier,
        limit: def.daily_quota,
        remaining: def.daily_quota.saturating_sub(used_today),
        rewrites_total: total,
        styles: def.allowed_styles.to_vec(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_message_names_next_tier_and_its_quota() {
        let msg = quota_message(TierId::Free, Some((TierId::Standard, 50)));
        assert!(msg.contains("free"));
        assert!(msg.contains("standard"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn style_message_lists_unlocking_plans() {
        let msg = style_message("formal", &[TierId::Standard, TierId::Pro]);
        assert!(msg.contains("standard or pro"));
    }

    #[test]
    fn unknown_style_message_has_no_plans() {
        let msg = style_message("shakespearean", &[]);
        assert!(msg.contains("not a recognized style"));
    }
}
