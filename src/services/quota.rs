// src/services/quota.rs
// Pre-dispatch quota gate. Pure functions, no side effects.

use crate::models::SubscriptionTier;

/// Outcome of the quota gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl QuotaDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: String) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

pub fn can_analyze(tier: SubscriptionTier, current_usage: u32) -> bool {
    current_usage < tier.config().monthly_limit
}

pub fn is_within_duration_limit(tier: SubscriptionTier, duration_secs: u32) -> bool {
    duration_secs <= tier.config().max_video_duration
}

pub fn remaining_analyses(tier: SubscriptionTier, current_usage: u32) -> u32 {
    tier.config().monthly_limit.saturating_sub(current_usage)
}

/// "10 seconds", "3 minutes", "1 minute 30 seconds"
pub fn format_duration_limit(total_secs: u32) -> String {
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    if minutes == 0 {
        return format!("{} seconds", seconds);
    }

    let mut text = format!("{} minute{}", minutes, if minutes > 1 { "s" } else { "" });
    if seconds > 0 {
        text.push_str(&format!(" {} seconds", seconds));
    }
    text
}

/// Usage check and (for video) duration check, ANDed.
pub fn can_perform_analysis(
    tier: SubscriptionTier,
    current_usage: u32,
    video_duration_secs: Option<u32>,
) -> QuotaDecision {
    let config = tier.config();

    if !can_analyze(tier, current_usage) {
        return QuotaDecision::deny(format!(
            "You've used all {} analyses for this month. Upgrade to continue!",
            config.monthly_limit
        ));
    }

    if let Some(duration) = video_duration_secs {
        if !is_within_duration_limit(tier, duration) {
            return QuotaDecision::deny(format!(
                "Video exceeds {} limit for {} tier. Upgrade for longer videos!",
                format_duration_limit(config.max_video_duration),
                config.name
            ));
        }
    }

    QuotaDecision::allow()
}
