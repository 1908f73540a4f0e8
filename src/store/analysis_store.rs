// src/store/analysis_store.rs
//! Current-analysis state plus the persisted result history.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use super::persist::{JsonSlot, StoreError};
use crate::error::{AnalysisError, AnalysisErrorKind};
use crate::models::{AnalysisInput, AnalysisProgress, AnalysisResult, AnalysisStatus, InputKind};
use crate::services::AnalysisService;

pub const MAX_HISTORY_ITEMS: usize = 50;
pub const HISTORY_SLOT: &str = "vira-analysis-storage";

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedHistory {
    #[serde(default)]
    history: Vec<AnalysisResult>,
}

#[derive(Debug, Default)]
struct AnalysisState {
    status: AnalysisStatus,
    current_input: Option<AnalysisInput>,
    current_result: Option<AnalysisResult>,
    error: Option<AnalysisError>,
    progress: String,
    history: Vec<AnalysisResult>,
}

impl AnalysisState {
    fn snapshot(&self) -> AnalysisProgress {
        AnalysisProgress {
            status: self.status,
            message: self.progress.clone(),
        }
    }
}

pub struct AnalysisStore {
    service: AnalysisService,
    state: Arc<RwLock<AnalysisState>>,
    slot: JsonSlot<PersistedHistory>,
    progress_tx: Arc<watch::Sender<AnalysisProgress>>,
}

/// Returns the store to idle if an in-flight analysis is dropped before it
/// records an outcome.
struct InFlightGuard {
    state: Arc<RwLock<AnalysisState>>,
    progress_tx: Arc<watch::Sender<AnalysisProgress>>,
    armed: bool,
}

impl InFlightGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }

    fn reset(state: &mut AnalysisState, progress_tx: &watch::Sender<AnalysisProgress>) {
        if state.status.is_in_flight() {
            state.status = AnalysisStatus::Idle;
            state.progress.clear();
            progress_tx.send_replace(state.snapshot());
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!("Analysis dropped before completion, resetting status");

        if let Ok(mut state) = self.state.try_write() {
            Self::reset(&mut state, &self.progress_tx);
            return;
        }
        // Lock is busy: finish the reset once it frees up
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let state = self.state.clone();
            let progress_tx = self.progress_tx.clone();
            handle.spawn(async move {
                let mut state = state.write().await;
                Self::reset(&mut state, &progress_tx);
            });
        }
    }
}

impl AnalysisStore {
    /// Restores the history from `data_dir`.
    pub async fn load(service: AnalysisService, data_dir: &Path) -> Result<Self, StoreError> {
        let slot = JsonSlot::new(data_dir, HISTORY_SLOT);
        let mut persisted: PersistedHistory = slot.load().await?;
        persisted.history.truncate(MAX_HISTORY_ITEMS);
        tracing::debug!(items = persisted.history.len(), "Analysis history restored");

        let (progress_tx, _) = watch::channel(AnalysisProgress::default());
        Ok(Self {
            service,
            state: Arc::new(RwLock::new(AnalysisState {
                history: persisted.history,
                ..Default::default()
            })),
            slot,
            progress_tx: Arc::new(progress_tx),
        })
    }

    /// Status and progress updates, latest value first
    pub fn subscribe(&self) -> watch::Receiver<AnalysisProgress> {
        self.progress_tx.subscribe()
    }

    fn publish(&self, state: &AnalysisState) {
        self.progress_tx.send_replace(state.snapshot());
    }

    async fn set_phase(&self, status: AnalysisStatus, progress: &str) {
        let mut state = self.state.write().await;
        state.status = status;
        state.progress = progress.to_string();
        self.publish(&state);
    }

    async fn persist(&self, history: &[AnalysisResult]) -> Result<(), StoreError> {
        let snapshot = PersistedHistory {
            history: history.to_vec(),
        };
        self.slot.save(&snapshot).await
    }

    /// Drives one input to a stored result or a classified error.
    ///
    /// Quota is not checked here; callers gate before dispatch. A second call
    /// while one is in flight is rejected with a `busy` error and leaves the
    /// running analysis untouched.
    pub async fn start_analysis(
        &self,
        input: AnalysisInput,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        {
            let mut state = self.state.write().await;
            if state.status.is_in_flight() {
                tracing::warn!("Rejected analysis: another one is still running");
                return Err(AnalysisError::busy());
            }
            state.status = AnalysisStatus::Uploading;
            state.current_input = Some(input.clone());
            state.current_result = None;
            state.error = None;
            state.progress = "Preparing media...".to_string();
            self.publish(&state);
        }
        let mut guard = InFlightGuard {
            state: self.state.clone(),
            progress_tx: self.progress_tx.clone(),
            armed: true,
        };

        let outcome = match self.service.prepare(&input, cancel).await {
            Ok(request) => {
                self.set_phase(AnalysisStatus::Processing, "Analyzing content...").await;
                self.service.run(request, &input, cancel).await
            }
            Err(e) => Err(e),
        };

        let mut state = self.state.write().await;
        guard.disarm();
        match outcome {
            Ok(result) => {
                state.status = AnalysisStatus::Completed;
                state.current_result = Some(result.clone());
                state.progress = "Analysis complete!".to_string();
                state.history.insert(0, result.clone());
                state.history.truncate(MAX_HISTORY_ITEMS);
                self.publish(&state);

                if let Err(e) = self.persist(&state.history).await {
                    tracing::error!("Failed to persist analysis history: {}", e);
                }
                tracing::info!(id = %result.id, score = result.score, "Analysis completed");
                Ok(result)
            }
            Err(err) if err.kind == AnalysisErrorKind::Cancelled => {
                state.status = AnalysisStatus::Idle;
                state.progress.clear();
                self.publish(&state);
                Err(err)
            }
            Err(err) => {
                tracing::warn!(kind = %err.kind, retryable = err.retryable, "Analysis failed: {}", err);
                state.status = AnalysisStatus::Failed;
                state.error = Some(err.clone());
                state.progress.clear();
                self.publish(&state);
                Err(err)
            }
        }
    }

    /// Re-runs the last input after a retryable failure.
    pub async fn retry(&self, cancel: &CancellationToken) -> Result<AnalysisResult, AnalysisError> {
        let input = {
            let state = self.state.read().await;
            match (&state.error, &state.current_input) {
                (Some(err), Some(input)) if err.retryable => input.clone(),
                (Some(err), _) => return Err(err.clone()),
                _ => return Err(AnalysisError::invalid_input("There is no failed analysis to retry.")),
            }
        };
        self.start_analysis(input, cancel).await
    }

    pub async fn status(&self) -> AnalysisStatus {
        self.state.read().await.status
    }

    pub async fn progress(&self) -> String {
        self.state.read().await.progress.clone()
    }

    pub async fn current_input(&self) -> Option<AnalysisInput> {
        self.state.read().await.current_input.clone()
    }

    pub async fn current_result(&self) -> Option<AnalysisResult> {
        self.state.read().await.current_result.clone()
    }

    pub async fn current_error(&self) -> Option<AnalysisError> {
        self.state.read().await.error.clone()
    }

    pub async fn clear_current(&self) {
        let mut state = self.state.write().await;
        state.status = AnalysisStatus::Idle;
        state.current_input = None;
        state.current_result = None;
        state.error = None;
        state.progress.clear();
        self.publish(&state);
    }

    pub async fn clear_error(&self) {
        self.state.write().await.error = None;
    }

    /// Removes one result; the rest keep their order. Returns whether it existed.
    pub async fn delete_from_history(&self, id: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let remaining: Vec<AnalysisResult> = state
            .history
            .iter()
            .filter(|item| item.id != id)
            .cloned()
            .collect();
        if remaining.len() == state.history.len() {
            return Ok(false);
        }
        self.persist(&remaining).await?;
        state.history = remaining;
        Ok(true)
    }

    pub async fn clear_history(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        self.persist(&[]).await?;
        state.history.clear();
        Ok(())
    }

    pub async fn get_result_by_id(&self, id: &str) -> Option<AnalysisResult> {
        self.state
            .read()
            .await
            .history
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    /// Most recent first
    pub async fn history(&self) -> Vec<AnalysisResult> {
        self.state.read().await.history.clone()
    }

    /// Photo and video results
    pub async fn scans(&self) -> Vec<AnalysisResult> {
        self.filtered(|item| item.input.kind.is_media()).await
    }

    /// Text-topic results
    pub async fn metadata_history(&self) -> Vec<AnalysisResult> {
        self.filtered(|item| item.input.kind == InputKind::Text).await
    }

    /// Case-insensitive match on file name, topic or viral-potential label
    pub async fn search_history(&self, query: &str) -> Vec<AnalysisResult> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.history().await;
        }
        self.filtered(|item| matches_query(item, &query)).await
    }

    async fn filtered(&self, keep: impl Fn(&AnalysisResult) -> bool) -> Vec<AnalysisResult> {
        self.state
            .read()
            .await
            .history
            .iter()
            .filter(|item| keep(item))
            .cloned()
            .collect()
    }
}

fn matches_query(item: &AnalysisResult, query: &str) -> bool {
    let contains = |field: Option<&str>| {
        field
            .map(|value| value.to_lowercase().contains(query))
            .unwrap_or(false)
    };
    contains(item.input.file_name.as_deref())
        || contains(item.input.text.as_deref())
        || item.viral_potential.to_string().to_lowercase().contains(query)
}
