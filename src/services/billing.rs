// src/services/billing.rs
//! Entitlement seam. The app only reads entitlements and maps them to a tier;
//! purchases themselves belong to the billing provider. `MockBilling` stands
//! in for the real SDK during local development.

use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::subscription::{ENTITLEMENT_ENTERPRISE, ENTITLEMENT_PRO};
use crate::models::SubscriptionTier;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BillingError {
    #[error("{0}")]
    Store(String),
    #[error("You already have the {0} plan.")]
    AlreadyOwned(SubscriptionTier),
    #[error("Purchases are not available for the {0} tier.")]
    NotPurchasable(SubscriptionTier),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntitlementInfo {
    pub identifier: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CustomerInfo {
    pub active_entitlements: HashMap<String, EntitlementInfo>,
    pub original_app_user_id: String,
}

impl CustomerInfo {
    pub fn has_entitlement(&self, identifier: &str) -> bool {
        self.active_entitlements.contains_key(identifier)
    }

    pub fn has_active_subscription(&self) -> bool {
        !self.active_entitlements.is_empty()
    }
}

/// Enterprise wins over pro; no entitlement means free.
pub fn tier_from_customer_info(info: &CustomerInfo) -> SubscriptionTier {
    if info.has_entitlement(ENTITLEMENT_ENTERPRISE) {
        SubscriptionTier::Enterprise
    } else if info.has_entitlement(ENTITLEMENT_PRO) {
        SubscriptionTier::Pro
    } else {
        SubscriptionTier::Free
    }
}

pub fn latest_expiration(info: &CustomerInfo) -> Option<DateTime<Utc>> {
    info.active_entitlements
        .values()
        .filter_map(|e| e.expires_at)
        .max()
}

#[async_trait]
pub trait EntitlementProvider: Send + Sync {
    async fn initialize(&self) -> Result<(), BillingError>;
    async fn customer_info(&self) -> Result<CustomerInfo, BillingError>;
    async fn purchase(&self, tier: SubscriptionTier) -> Result<CustomerInfo, BillingError>;
    async fn restore_purchases(&self) -> Result<CustomerInfo, BillingError>;
    async fn logout(&self) -> Result<(), BillingError>;
    /// Local development override of the entitlement state
    async fn dev_set_tier(&self, tier: SubscriptionTier);
}

/// Simulated round-trip times of the mock provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockLatency {
    pub customer_info: Duration,
    pub purchase: Duration,
    pub restore: Duration,
}

impl MockLatency {
    pub fn realistic() -> Self {
        Self {
            customer_info: Duration::from_millis(300),
            purchase: Duration::from_millis(1000),
            restore: Duration::from_millis(500),
        }
    }

    /// Same delay for every call
    pub fn uniform(delay: Duration) -> Self {
        Self {
            customer_info: delay,
            purchase: delay,
            restore: delay,
        }
    }

    pub fn none() -> Self {
        Self::uniform(Duration::ZERO)
    }
}

#[derive(Debug, Clone, Copy)]
struct MockState {
    tier: SubscriptionTier,
    expires_at: Option<DateTime<Utc>>,
}

pub struct MockBilling {
    state: Mutex<MockState>,
    initialized: AtomicBool,
    latency: MockLatency,
    failure_rate: f64,
}

pub const MOCK_USER_ID: &str = "mock_user_123";

impl MockBilling {
    pub fn new(initial_tier: SubscriptionTier, latency: MockLatency, failure_rate: f64) -> Self {
        Self {
            state: Mutex::new(MockState {
                tier: initial_tier,
                expires_at: one_month_from_now(initial_tier),
            }),
            initialized: AtomicBool::new(false),
            latency,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    fn info_for(state: &MockState) -> CustomerInfo {
        let mut active_entitlements = HashMap::new();
        if let Some(identifier) = state.tier.entitlement_id() {
            active_entitlements.insert(
                identifier.to_string(),
                EntitlementInfo {
                    identifier: identifier.to_string(),
                    expires_at: state.expires_at,
                },
            );
        }
        CustomerInfo {
            active_entitlements,
            original_app_user_id: MOCK_USER_ID.to_string(),
        }
    }
}

fn one_month_from_now(tier: SubscriptionTier) -> Option<DateTime<Utc>> {
    if tier.is_paid() {
        Utc::now().checked_add_months(Months::new(1))
    } else {
        None
    }
}

async fn simulate_latency(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl EntitlementProvider for MockBilling {
    async fn initialize(&self) -> Result<(), BillingError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            tracing::debug!("Mock billing already initialized");
        } else {
            tracing::info!("Using mock billing provider for local development");
        }
        Ok(())
    }

    async fn customer_info(&self) -> Result<CustomerInfo, BillingError> {
        simulate_latency(self.latency.customer_info).await;
        let state = self.state.lock().await;
        Ok(Self::info_for(&state))
    }

    async fn purchase(&self, tier: SubscriptionTier) -> Result<CustomerInfo, BillingError> {
        tracing::info!(tier = %tier, "Mock purchase started");
        if !tier.is_paid() {
            return Err(BillingError::NotPurchasable(tier));
        }

        simulate_latency(self.latency.purchase).await;

        let roll: f64 = rand::random();
        if roll < self.failure_rate {
            tracing::warn!(tier = %tier, "Mock purchase failed");
            return Err(BillingError::Store(
                "Mock payment failed. Please try again.".to_string(),
            ));
        }

        let mut state = self.state.lock().await;
        if state.tier == tier {
            return Err(BillingError::AlreadyOwned(tier));
        }
        *state = MockState {
            tier,
            expires_at: one_month_from_now(tier),
        };
        tracing::info!(tier = %tier, "Mock purchase successful");
        Ok(Self::info_for(&state))
    }

    async fn restore_purchases(&self) -> Result<CustomerInfo, BillingError> {
        tracing::info!("Restoring purchases (mock)");
        simulate_latency(self.latency.restore).await;
        let state = self.state.lock().await;
        Ok(Self::info_for(&state))
    }

    async fn logout(&self) -> Result<(), BillingError> {
        let mut state = self.state.lock().await;
        *state = MockState {
            tier: SubscriptionTier::Free,
            expires_at: None,
        };
        tracing::info!("Mock user logged out");
        Ok(())
    }

    async fn dev_set_tier(&self, tier: SubscriptionTier) {
        let mut state = self.state.lock().await;
        *state = MockState {
            tier,
            expires_at: one_month_from_now(tier),
        };
        tracing::info!(tier = %tier, "DEV: mock tier set");
    }
}
