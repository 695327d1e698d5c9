use chrono::NaiveDate;

use crate::ledger::UsageRecord;
use crate::tiers::{self, StyleId, TierId};

/// Outcome of admission control for one rewrite request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Request may proceed to generation. No counter has been touched yet;
    /// the caller commits only after the transform succeeds.
    Admit,
    /// Daily ceiling reached. `upgrade` names the next tier and its quota
    /// when one exists.
    QuotaExceeded {
        tier: TierId,
        upgrade: Option<(TierId, u32)>,
    },
    /// Style outside the tier's allowed set. Does not consume quota.
    /// `unlocked_by` is empty when no tier offers the style.
    StyleNotEntitled {
        tier: TierId,
        remaining: u32,
        unlocked_by: Vec<TierId>,
    },
}

/// Decides whether a rewrite is admitted. Anonymous callers (no record) are
/// admitted unconditionally; metering them is a client-side concern.
///
/// For known callers the calendar-day rollover is applied to the record
/// before any check, so a rejected request still leaves the record reset for
/// the new day. The caller is responsible for persisting that reset.
pub fn evaluate(record: Option<&mut UsageRecord>, style: Option<StyleId>, today: NaiveDate) -> Decision {
    let Some(record) = record else {
        return Decision::Admit;
    };

    if record.last_rewrite_date != today {
        record.rewrites_today = 0;
        record.last_rewrite_date = today;
    }

    let def = tiers::definition(record.tier);

    if record.rewrites_today >= def.daily_quota {
        let upgrade = record
            .tier
            .next_tier()
            .map(|next| (next, tiers::definition(next).daily_quota));
        return Decision::QuotaExceeded {
            tier: record.tier,
            upgrade,
        };
    }

    let entitled = style.map(|s| def.allows(s)).unwrap_or(false);
    if !entitled {
        return Decision::StyleNotEntitled {
            tier: record.tier,
            remaining: def.daily_quota - record.rewrites_today,
            unlocked_by: style.map(tiers::tiers_allowing).unwrap_or_default(),
        };
    }

    Decision::Admit
}

/// Records one admitted and successfully generated rewrite. Must be called
/// at most once per admission, and never when the transform failed.
pub fn commit(record: &mut UsageRecord) {
    record.rewrites_today += 1;
    record.rewrites_total += 1;
}

/// Allowance left after the request's outcome has been accounted for.
pub fn remaining_after(record: &UsageRecord) -> u32 {
    let limit = tiers::definition(record.tier).daily_quota;
    limit.saturating_sub(record.rewrites_today)
}
