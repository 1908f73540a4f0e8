// src/app.rs
//! Composition root: owns the three state containers and runs the
//! gate-then-dispatch flow around each analysis.

use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::AnalysisError;
use crate::gemini_client::ContentGenerator;
use crate::models::{AnalysisInput, AnalysisResult, InputKind};
use crate::services::{AnalysisService, EntitlementProvider};
use crate::store::{AnalysisStore, StoreError, SubscriptionStore, ThemeStore};

#[derive(Debug, Error)]
pub enum AppError {
    /// Local plan limit, as opposed to the upstream `quota-exceeded` kind
    #[error("{0}")]
    QuotaDenied(String),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Analysis(e) => e.retryable,
            _ => false,
        }
    }
}

pub struct App {
    pub analysis: AnalysisStore,
    pub subscription: SubscriptionStore,
    pub theme: ThemeStore,
}

impl App {
    pub async fn load(
        data_dir: &Path,
        generator: Arc<dyn ContentGenerator>,
        provider: Arc<dyn EntitlementProvider>,
        analysis_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let service = AnalysisService::new(generator).with_timeout(analysis_timeout);
        tracing::debug!(data_dir = %data_dir.display(), "Loading application state");

        Ok(Self {
            analysis: AnalysisStore::load(service, data_dir).await?,
            subscription: SubscriptionStore::load(provider, data_dir).await?,
            theme: ThemeStore::load(data_dir).await?,
        })
    }

    /// Loads entitlements and rolls usage over. A billing failure is logged
    /// and leaves the free tier in place.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        match self.subscription.initialize(Utc::now()).await {
            Ok(_) => Ok(()),
            Err(crate::store::SubscriptionError::Store(e)) => Err(e),
            Err(crate::store::SubscriptionError::Billing(e)) => {
                tracing::warn!("Continuing on the free tier: {}", e);
                Ok(())
            }
        }
    }

    /// Rollover check, quota gate, dispatch, then usage accounting.
    pub async fn analyze(
        &self,
        input: AnalysisInput,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, AppError> {
        self.gate(&input).await?;
        let result = self.analysis.start_analysis(input, cancel).await?;
        self.record_usage().await;
        Ok(result)
    }

    /// Re-runs the last failed input. It counts against the quota like any
    /// other analysis.
    pub async fn retry(&self, cancel: &CancellationToken) -> Result<AnalysisResult, AppError> {
        if let Some(input) = self.analysis.current_input().await {
            self.gate(&input).await?;
        }
        let result = self.analysis.retry(cancel).await?;
        self.record_usage().await;
        Ok(result)
    }

    async fn gate(&self, input: &AnalysisInput) -> Result<(), AppError> {
        self.subscription.check_monthly_reset(Utc::now()).await?;

        let duration = match input.kind {
            InputKind::Video => input.duration_secs,
            _ => None,
        };
        let decision = self.subscription.can_perform_analysis(duration).await;
        if !decision.allowed {
            let reason = decision.reason.unwrap_or_default();
            tracing::info!(reason = %reason, "Analysis denied by quota gate");
            return Err(AppError::QuotaDenied(reason));
        }
        Ok(())
    }

    async fn record_usage(&self) {
        if let Err(e) = self.subscription.increment_usage(Utc::now()).await {
            tracing::error!("Failed to record usage: {}", e);
        }
    }
}
