// src/models/subscription.rs
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Entitlement identifiers reported by the billing provider
pub const ENTITLEMENT_PRO: &str = "vira_pro";
pub const ENTITLEMENT_ENTERPRISE: &str = "vira_enterprise";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl SubscriptionTier {
    pub fn config(&self) -> &'static TierConfig {
        match self {
            SubscriptionTier::Free => &FREE_TIER,
            SubscriptionTier::Pro => &PRO_TIER,
            SubscriptionTier::Enterprise => &ENTERPRISE_TIER,
        }
    }

    pub fn entitlement_id(&self) -> Option<&'static str> {
        match self {
            SubscriptionTier::Free => None,
            SubscriptionTier::Pro => Some(ENTITLEMENT_PRO),
            SubscriptionTier::Enterprise => Some(ENTITLEMENT_ENTERPRISE),
        }
    }

    pub fn is_paid(&self) -> bool {
        *self != SubscriptionTier::Free
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config().name)
    }
}

impl FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(SubscriptionTier::Free),
            "pro" => Ok(SubscriptionTier::Pro),
            "enterprise" => Ok(SubscriptionTier::Enterprise),
            other => Err(format!("unknown subscription tier '{}'", other)),
        }
    }
}

/// Limits and display data of one tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierConfig {
    pub name: &'static str,
    /// Seconds
    pub max_video_duration: u32,
    pub monthly_limit: u32,
    pub price: Option<&'static str>,
    pub features: &'static [&'static str],
}

pub static FREE_TIER: TierConfig = TierConfig {
    name: "Free",
    max_video_duration: 10,
    monthly_limit: 5,
    price: None,
    features: &[
        "5 video analyses per month",
        "Videos up to 10 seconds",
        "Basic viral score",
        "SEO suggestions",
    ],
};

pub static PRO_TIER: TierConfig = TierConfig {
    name: "Pro",
    max_video_duration: 180,
    monthly_limit: 100,
    price: Some("$19.99/month"),
    features: &[
        "100 video analyses per month",
        "Videos up to 3 minutes",
        "Detailed viral analysis",
        "SEO optimization tools",
        "Hashtag generator",
        "Priority support",
    ],
};

pub static ENTERPRISE_TIER: TierConfig = TierConfig {
    name: "Enterprise",
    max_video_duration: 600,
    monthly_limit: 300,
    price: Some("$79.99/month"),
    features: &[
        "300 video analyses per month",
        "Videos up to 10 minutes",
        "Advanced analytics dashboard",
        "Team collaboration (coming soon)",
        "API access (coming soon)",
        "Dedicated support",
    ],
};

/// Monthly usage counter, the only subscription data kept on disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageData {
    pub analyses_this_month: u32,
    pub month_start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_analysis_at: Option<DateTime<Utc>>,
}

impl UsageData {
    pub fn starting(now: DateTime<Utc>) -> Self {
        Self {
            analyses_this_month: 0,
            month_start: month_start(now),
            last_analysis_at: None,
        }
    }
}

impl Default for UsageData {
    fn default() -> Self {
        Self::starting(Utc::now())
    }
}

/// First instant of the calendar month containing `now` (UTC)
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}
