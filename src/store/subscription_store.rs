// src/store/subscription_store.rs
//! Subscription tier (from the entitlement provider, never persisted) and the
//! monthly usage counter (persisted).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use super::persist::{JsonSlot, StoreError};
use crate::models::subscription::month_start;
use crate::models::{SubscriptionTier, UsageData};
use crate::services::billing::{latest_expiration, tier_from_customer_info};
use crate::services::quota::{self, QuotaDecision};
use crate::services::{BillingError, CustomerInfo, EntitlementProvider};

pub const USAGE_SLOT: &str = "vira-subscription-storage";

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error(transparent)]
    Billing(#[from] BillingError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedUsage {
    #[serde(default)]
    usage: UsageData,
}

#[derive(Debug)]
struct SubscriptionState {
    tier: SubscriptionTier,
    is_active: bool,
    expires_at: Option<DateTime<Utc>>,
    usage: UsageData,
    last_error: Option<String>,
}

pub struct SubscriptionStore {
    provider: Arc<dyn EntitlementProvider>,
    state: RwLock<SubscriptionState>,
    slot: JsonSlot<PersistedUsage>,
}

impl SubscriptionStore {
    /// Restores usage from disk. The tier starts as free until `initialize`.
    pub async fn load(provider: Arc<dyn EntitlementProvider>, data_dir: &Path) -> Result<Self, StoreError> {
        let slot = JsonSlot::new(data_dir, USAGE_SLOT);
        let persisted: PersistedUsage = slot.load().await?;

        Ok(Self {
            provider,
            state: RwLock::new(SubscriptionState {
                tier: SubscriptionTier::Free,
                is_active: false,
                expires_at: None,
                usage: persisted.usage,
                last_error: None,
            }),
            slot,
        })
    }

    async fn persist(&self, usage: &UsageData) -> Result<(), StoreError> {
        self.slot.save(&PersistedUsage { usage: usage.clone() }).await
    }

    async fn apply(&self, info: &CustomerInfo) -> SubscriptionTier {
        let tier = tier_from_customer_info(info);
        let mut state = self.state.write().await;
        state.tier = tier;
        state.is_active = tier.is_paid();
        state.expires_at = latest_expiration(info);
        state.last_error = None;
        tier
    }

    async fn record_error(&self, err: &BillingError) {
        self.state.write().await.last_error = Some(err.to_string());
    }

    /// Fetches entitlements, then runs the monthly rollover. A billing
    /// failure leaves the store on the free tier but still rolls usage over.
    pub async fn initialize(&self, now: DateTime<Utc>) -> Result<SubscriptionTier, SubscriptionError> {
        let fetched = match self.provider.initialize().await {
            Ok(()) => self.provider.customer_info().await,
            Err(e) => Err(e),
        };

        let outcome = match fetched {
            Ok(info) => Ok(self.apply(&info).await),
            Err(e) => {
                tracing::error!("Failed to initialize subscription: {}", e);
                self.record_error(&e).await;
                Err(e)
            }
        };

        self.check_monthly_reset(now).await?;

        let tier = outcome?;
        tracing::info!(tier = %tier, "Subscription initialized");
        Ok(tier)
    }

    /// Re-reads entitlements; on failure the current tier is kept.
    pub async fn refresh(&self) -> Result<SubscriptionTier, BillingError> {
        match self.provider.customer_info().await {
            Ok(info) => {
                let tier = self.apply(&info).await;
                tracing::info!(tier = %tier, "Subscription refreshed");
                Ok(tier)
            }
            Err(e) => {
                tracing::error!("Failed to refresh subscription: {}", e);
                Err(e)
            }
        }
    }

    pub async fn purchase(&self, tier: SubscriptionTier) -> Result<SubscriptionTier, BillingError> {
        match self.provider.purchase(tier).await {
            Ok(info) => Ok(self.apply(&info).await),
            Err(e) => {
                self.record_error(&e).await;
                Err(e)
            }
        }
    }

    pub async fn restore_purchases(&self) -> Result<SubscriptionTier, BillingError> {
        match self.provider.restore_purchases().await {
            Ok(info) => {
                let tier = self.apply(&info).await;
                tracing::info!(tier = %tier, "Purchases restored");
                Ok(tier)
            }
            Err(e) => {
                self.record_error(&e).await;
                Err(e)
            }
        }
    }

    pub async fn logout(&self) -> Result<(), BillingError> {
        self.provider.logout().await?;
        let mut state = self.state.write().await;
        state.tier = SubscriptionTier::Free;
        state.is_active = false;
        state.expires_at = None;
        Ok(())
    }

    /// Development override; also moves the provider so a refresh agrees.
    pub async fn set_tier(&self, tier: SubscriptionTier) {
        self.provider.dev_set_tier(tier).await;
        let mut state = self.state.write().await;
        state.tier = tier;
        state.is_active = tier.is_paid();
    }

    pub async fn increment_usage(&self, now: DateTime<Utc>) -> Result<u32, StoreError> {
        let mut state = self.state.write().await;
        let mut next = state.usage.clone();
        next.analyses_this_month += 1;
        next.last_analysis_at = Some(now);
        self.persist(&next).await?;

        state.usage = next;
        tracing::debug!(count = state.usage.analyses_this_month, "Usage incremented");
        Ok(state.usage.analyses_this_month)
    }

    /// Resets the counter when the stored month predates `now`'s month.
    /// Returns whether a reset happened.
    pub async fn check_monthly_reset(&self, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let current = month_start(now);
        if state.usage.month_start >= current {
            return Ok(false);
        }

        let next = UsageData {
            analyses_this_month: 0,
            month_start: current,
            last_analysis_at: None,
        };
        self.persist(&next).await?;
        state.usage = next;
        tracing::info!(month_start = %current, "Monthly usage reset");
        Ok(true)
    }

    pub async fn can_perform_analysis(&self, video_duration_secs: Option<u32>) -> QuotaDecision {
        let state = self.state.read().await;
        quota::can_perform_analysis(state.tier, state.usage.analyses_this_month, video_duration_secs)
    }

    pub async fn remaining_analyses(&self) -> u32 {
        let state = self.state.read().await;
        quota::remaining_analyses(state.tier, state.usage.analyses_this_month)
    }

    pub async fn tier(&self) -> SubscriptionTier {
        self.state.read().await.tier
    }

    pub async fn is_active(&self) -> bool {
        self.state.read().await.is_active
    }

    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.expires_at
    }

    pub async fn usage(&self) -> UsageData {
        self.state.read().await.usage.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{MockBilling, MockLatency};
    use chrono::TimeZone;

    async fn store_in(dir: &Path, tier: SubscriptionTier) -> SubscriptionStore {
        let provider = Arc::new(MockBilling::new(tier, MockLatency::none(), 0.0));
        SubscriptionStore::load(provider, dir).await.unwrap()
    }

    #[tokio::test]
    async fn test_initialize_reads_tier_from_provider() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), SubscriptionTier::Pro).await;
        assert_eq!(store.tier().await, SubscriptionTier::Free);

        let tier = store.initialize(Utc::now()).await.unwrap();
        assert_eq!(tier, SubscriptionTier::Pro);
        assert!(store.is_active().await);
        assert!(store.expires_at().await.is_some());
    }

    #[tokio::test]
    async fn test_rollover_from_previous_month() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), SubscriptionTier::Free).await;
        let september = Utc.with_ymd_and_hms(2026, 9, 20, 12, 0, 0).unwrap();
        let october = Utc.with_ymd_and_hms(2026, 10, 3, 8, 0, 0).unwrap();

        {
            let mut state = store.state.write().await;
            state.usage = UsageData::starting(september);
        }
        store.increment_usage(september).await.unwrap();
        store.increment_usage(september).await.unwrap();

        assert!(store.check_monthly_reset(october).await.unwrap());
        let usage = store.usage().await;
        assert_eq!(usage.analyses_this_month, 0);
        assert_eq!(usage.month_start, Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap());
        assert_eq!(usage.last_analysis_at, None);
    }

    #[tokio::test]
    async fn test_rollover_within_month_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), SubscriptionTier::Free).await;
        let early = Utc.with_ymd_and_hms(2026, 10, 2, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 10, 30, 23, 0, 0).unwrap();

        {
            let mut state = store.state.write().await;
            state.usage = UsageData::starting(early);
        }
        store.increment_usage(early).await.unwrap();
        store.increment_usage(early).await.unwrap();
        store.increment_usage(early).await.unwrap();

        assert!(!store.check_monthly_reset(late).await.unwrap());
        let usage = store.usage().await;
        assert_eq!(usage.analyses_this_month, 3);
        assert_eq!(usage.last_analysis_at, Some(early));
    }

    #[tokio::test]
    async fn test_usage_survives_reload_but_tier_does_not() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), SubscriptionTier::Enterprise).await;
        store.initialize(Utc::now()).await.unwrap();
        store.increment_usage(Utc::now()).await.unwrap();

        let reloaded = store_in(dir.path(), SubscriptionTier::Free).await;
        assert_eq!(reloaded.usage().await.analyses_this_month, 1);
        assert_eq!(reloaded.tier().await, SubscriptionTier::Free);
    }

    #[tokio::test]
    async fn test_gate_uses_current_tier_and_usage() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), SubscriptionTier::Free).await;
        store.initialize(Utc::now()).await.unwrap();

        for _ in 0..4 {
            store.increment_usage(Utc::now()).await.unwrap();
        }
        assert!(store.can_perform_analysis(None).await.allowed);
        assert_eq!(store.remaining_analyses().await, 1);

        store.increment_usage(Utc::now()).await.unwrap();
        assert!(!store.can_perform_analysis(None).await.allowed);

        store.set_tier(SubscriptionTier::Pro).await;
        assert!(store.can_perform_analysis(Some(180)).await.allowed);
        assert_eq!(store.refresh().await.unwrap(), SubscriptionTier::Pro);
    }

    #[tokio::test]
    async fn test_failed_usage_write_leaves_counter_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let store = store_in(&data_dir, SubscriptionTier::Free).await;
        store.increment_usage(Utc::now()).await.unwrap();

        // A plain file where the data directory should be makes every save fail
        std::fs::remove_dir_all(&data_dir).unwrap();
        std::fs::write(&data_dir, b"").unwrap();

        assert!(store.increment_usage(Utc::now()).await.is_err());
        assert_eq!(store.usage().await.analyses_this_month, 1);

        let september = Utc.with_ymd_and_hms(2026, 9, 20, 12, 0, 0).unwrap();
        let before = {
            let mut state = store.state.write().await;
            state.usage.month_start = month_start(september);
            state.usage.clone()
        };
        assert!(store.check_monthly_reset(Utc::now()).await.is_err());
        assert_eq!(store.usage().await, before);
    }

    #[tokio::test]
    async fn test_failed_purchase_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockBilling::new(SubscriptionTier::Free, MockLatency::none(), 1.0));
        let store = SubscriptionStore::load(provider, dir.path()).await.unwrap();

        assert!(store.purchase(SubscriptionTier::Pro).await.is_err());
        assert_eq!(store.tier().await, SubscriptionTier::Free);
        assert_eq!(
            store.last_error().await.as_deref(),
            Some("Mock payment failed. Please try again.")
        );
    }
}
