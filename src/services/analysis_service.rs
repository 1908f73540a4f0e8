// src/services/analysis_service.rs
//! One analysis cycle: read media, build the request, call the model under a
//! timeout, parse the reply. Every failure leaves here as an `AnalysisError`.

use base64::prelude::*;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::AnalysisError;
use crate::gemini_client::{ContentGenerator, GenerationRequest, InlineMedia};
use crate::models::{AnalysisInput, AnalysisResult, InputKind};
use crate::services::analysis_parser::parse_analysis_response;
use crate::services::media::{local_path, normalize_mime_type};
use crate::services::prompts::{metadata_prompt, ANALYSIS_SYSTEM_PROMPT};

/// Long videos can take minutes to process upstream
pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Clone)]
pub struct AnalysisService {
    generator: Arc<dyn ContentGenerator>,
    timeout: Duration,
}

impl AnalysisService {
    pub fn new(generator: Arc<dyn ContentGenerator>) -> Self {
        Self {
            generator,
            timeout: DEFAULT_ANALYSIS_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs both phases back to back.
    pub async fn analyze(
        &self,
        input: &AnalysisInput,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        let request = self.prepare(input, cancel).await?;
        self.run(request, input, cancel).await
    }

    /// Upload phase: validate the input and turn it into a model request.
    pub async fn prepare(
        &self,
        input: &AnalysisInput,
        cancel: &CancellationToken,
    ) -> Result<GenerationRequest, AnalysisError> {
        input.validate()?;
        if cancel.is_cancelled() {
            return Err(AnalysisError::cancelled());
        }

        match input.kind {
            InputKind::Text => {
                let topic = input.text.as_deref().unwrap_or_default();
                Ok(GenerationRequest {
                    prompt: metadata_prompt(topic),
                    media: None,
                })
            }
            InputKind::Image | InputKind::Video => {
                let uri = input.uri.as_deref().unwrap_or_default();
                tracing::info!(
                    uri = %uri,
                    mime_type = %input.mime_type,
                    file_name = ?input.file_name,
                    "Starting media analysis"
                );

                let bytes = tokio::select! {
                    _ = cancel.cancelled() => return Err(AnalysisError::cancelled()),
                    read = read_media(uri) => read?,
                };
                let base64_data = BASE64_STANDARD.encode(&bytes);
                tracing::debug!(bytes = bytes.len(), encoded = base64_data.len(), "Media encoded");

                Ok(GenerationRequest {
                    prompt: ANALYSIS_SYSTEM_PROMPT.to_string(),
                    media: Some(InlineMedia {
                        mime_type: normalize_mime_type(&input.mime_type),
                        base64_data,
                    }),
                })
            }
        }
    }

    /// Processing phase: call the model and parse what comes back.
    ///
    /// The call races the timeout and the cancellation token; whichever
    /// loses is dropped, which aborts the underlying HTTP request.
    pub async fn run(
        &self,
        request: GenerationRequest,
        input: &AnalysisInput,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        if cancel.is_cancelled() {
            return Err(AnalysisError::cancelled());
        }

        let call = tokio::time::timeout(self.timeout, self.generator.generate(request));
        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Analysis cancelled while waiting for the model");
                return Err(AnalysisError::cancelled());
            }
            outcome = call => match outcome {
                Err(_) => {
                    tracing::warn!(timeout_secs = self.timeout.as_secs(), "Analysis timed out");
                    return Err(AnalysisError::timeout());
                }
                Ok(Err(e)) => {
                    tracing::error!("Generation failed: {}", e);
                    return Err(e.into());
                }
                Ok(Ok(text)) => text,
            },
        };
        tracing::info!(length = text.len(), "Received analysis response");

        if cancel.is_cancelled() {
            return Err(AnalysisError::cancelled());
        }

        let parsed = parse_analysis_response(&text)?;
        Ok(AnalysisResult::from_parsed(parsed, input, Utc::now()))
    }
}

async fn read_media(uri: &str) -> Result<Vec<u8>, AnalysisError> {
    let path = local_path(uri);
    tokio::fs::read(path).await.map_err(|e| {
        tracing::error!(path = %path, "Failed to read media file: {}", e);
        AnalysisError::file_unreadable()
    })
}
