use serde::{Deserialize, Serialize};

/// Subscription tiers, ordered lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierId {
    Free,
    Standard,
    Pro,
}

impl TierId {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierId::Free => "free",
            TierId::Standard => "standard",
            TierId::Pro => "pro",
        }
    }

    /// Parses a stored or webhook-supplied tier string. Unknown values fall
    /// back to `Free` so a bad row or payload never turns into a hard error.
    pub fn parse_or_free(raw: &str) -> TierId {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" => TierId::Standard,
            "pro" => TierId::Pro,
            _ => TierId::Free,
        }
    }

    pub fn next_tier(&self) -> Option<TierId> {
        match self {
            TierId::Free => Some(TierId::Standard),
            TierId::Standard => Some(TierId::Pro),
            TierId::Pro => None,
        }
    }
}

/// Rewrite tones offered by the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleId {
    Professional,
    Direct,
    Email,
    Casual,
    Friendly,
    Formal,
    Persuasive,
    Creative,
}

impl StyleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StyleId::Professional => "professional",
            StyleId::Direct => "direct",
            StyleId::Email => "email",
            StyleId::Casual => "casual",
            StyleId::Friendly => "friendly",
            StyleId::Formal => "formal",
            StyleId::Persuasive => "persuasive",
            StyleId::Creative => "creative",
        }
    }

    /// Case-insensitive parse. `None` means the style is unknown to every
    /// tier; callers treat that as an entitlement miss, not a bad request.
    pub fn parse(raw: &str) -> Option<StyleId> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "professional" => Some(StyleId::Professional),
            "direct" => Some(StyleId::Direct),
            "email" => Some(StyleId::Email),
            "casual" => Some(StyleId::Casual),
            "friendly" => Some(StyleId::Friendly),
            "formal" => Some(StyleId::Formal),
            "persuasive" => Some(StyleId::Persuasive),
            "creative" => Some(StyleId::Creative),
            _ => None,
        }
    }
}

/// Entitlements granted by a tier. Static for the process lifetime.
#[derive(Debug, Clone, Copy)]
pub struct TierDefinition {
    pub id: TierId,
    pub daily_quota: u32,
    pub allowed_styles: &'static [StyleId],
}

const FREE_STYLES: &[StyleId] = &[StyleId::Professional, StyleId::Direct, StyleId::Email];

const STANDARD_STYLES: &[StyleId] = &[
    StyleId::Professional,
    StyleId::Direct,
    StyleId::Email,
    StyleId::Casual,
    StyleId::Friendly,
    StyleId::Formal,
];

const PRO_STYLES: &[StyleId] = &[
    StyleId::Professional,
    StyleId::Direct,
    StyleId::Email,
    StyleId::Casual,
    StyleId::Friendly,
    StyleId::Formal,
    StyleId::Persuasive,
    StyleId::Creative,
];

const FREE: TierDefinition = TierDefinition {
    id: TierId::Free,
    daily_quota: 2,
    allowed_styles: FREE_STYLES,
};

const STANDARD: TierDefinition = TierDefinition {
    id: TierId::Standard,
    daily_quota: 50,
    allowed_styles: STANDARD_STYLES,
};

const PRO: TierDefinition = TierDefinition {
    id: TierId::Pro,
    daily_quota: 500,
    allowed_styles: PRO_STYLES,
};

pub fn definition(tier: TierId) -> &'static TierDefinition {
    match tier {
        TierId::Free => &FREE,
        TierId::Standard => &STANDARD,
        TierId::Pro => &PRO,
    }
}

impl TierDefinition {
    pub fn allows(&self, style: StyleId) -> bool {
        self.allowed_styles.contains(&style)
    }
}

/// Tiers that include `style` in their allowed set, lowest first. Used for
/// upgrade messaging when a style is gated.
pub fn tiers_allowing(style: StyleId) -> Vec<TierId> {
    [TierId::Free, TierId::Standard, TierId::Pro]
        .into_iter()
        .filter(|tier| definition(*tier).allows(style))
        .collect()
}
