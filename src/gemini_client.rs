// src/gemini_client.rs
//! Thin client for the Gemini `generateContent` endpoint.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AnalysisError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-lite";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InlineData {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub data: String, // base64 encoded data
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    #[serde(rename = "topK")]
    pub top_k: u32,
    #[serde(rename = "topP")]
    pub top_p: f32,
    #[serde(rename = "maxOutputTokens")]
    pub max_output_tokens: u32,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

impl GenerationConfig {
    /// Settings used for every analysis: JSON output, moderate creativity
    pub fn analysis() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2048,
            response_mime_type: Some("application/json".to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(rename = "promptFeedback")]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
    #[serde(rename = "finishReason")]
    pub finish_reason: Option<String>,
    pub index: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptFeedback {
    #[serde(rename = "blockReason")]
    pub block_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    pub prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    pub candidates_token_count: u32,
    #[serde(rename = "totalTokenCount", default)]
    pub total_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Media attached inline to a generation request
#[derive(Debug, Clone, PartialEq)]
pub struct InlineMedia {
    pub mime_type: String,
    pub base64_data: String,
}

/// One prompt, optionally with media, sent to the model
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub media: Option<InlineMedia>,
}

/// Transport-level failures, kept structured so callers never sniff message text
#[derive(Debug, Clone, Error)]
pub enum GeminiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("Gemini API error ({status}): {message}")]
    Status { status: StatusCode, message: String },
    #[error("content blocked: {reason}")]
    Blocked { reason: String },
    #[error("no text in Gemini response")]
    EmptyResponse,
    #[error("error decoding response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GeminiError {
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            GeminiError::Timeout
        } else if err.is_decode() {
            GeminiError::Decode(err.to_string())
        } else {
            GeminiError::Network(err.to_string())
        }
    }
}

impl From<GeminiError> for AnalysisError {
    fn from(err: GeminiError) -> Self {
        match err {
            GeminiError::Network(_) => AnalysisError::network(),
            GeminiError::Timeout => AnalysisError::timeout(),
            GeminiError::Blocked { .. } => AnalysisError::safety_block(),
            GeminiError::Status { status, .. } if status == StatusCode::TOO_MANY_REQUESTS => {
                AnalysisError::quota_exceeded()
            }
            GeminiError::Status { status, .. } if status == StatusCode::PAYLOAD_TOO_LARGE => {
                AnalysisError::file_too_large()
            }
            GeminiError::Status { message, .. } => AnalysisError::from_message(&message),
            GeminiError::EmptyResponse | GeminiError::Decode(_) => AnalysisError::parse(),
        }
    }
}

/// Anything able to turn a prompt (and media) into model text
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GeminiError>;
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate_content(
        &self,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        tracing::debug!(
            model = %self.model,
            parts = request.contents.iter().map(|c| c.parts.len()).sum::<usize>(),
            "sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorEnvelope>(&response_text)
                .map(|envelope| match envelope.error.status {
                    Some(code) => format!("{} ({})", envelope.error.message, code),
                    None => envelope.error.message,
                })
                .unwrap_or(response_text);
            tracing::warn!(status = %status.as_u16(), "Gemini API returned an error: {}", message);
            return Err(GeminiError::Status { status, message });
        }

        tracing::debug!(
            "Gemini API response (truncated): {}...",
            response_text.chars().take(300).collect::<String>()
        );

        serde_json::from_str::<GenerateContentResponse>(&response_text).map_err(|parse_error| {
            tracing::error!("Failed to parse Gemini response: {}", parse_error);
            GeminiError::Decode(parse_error.to_string())
        })
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GeminiError> {
        let mut parts = Vec::with_capacity(2);
        if let Some(media) = request.media {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: media.mime_type,
                    data: media.base64_data,
                },
            });
        }
        parts.push(Part::Text { text: request.prompt });

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts,
                role: Some("user".to_string()),
            }],
            generation_config: Some(GenerationConfig::analysis()),
        };

        let response = self.generate_content(request).await?;
        if let Some(usage) = &response.usage_metadata {
            tracing::info!(
                prompt_tokens = usage.prompt_token_count,
                output_tokens = usage.candidates_token_count,
                total_tokens = usage.total_token_count,
                "Gemini token usage"
            );
        }
        extract_text(response)
    }
}

const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

/// Pulls the first text part out of a response, surfacing safety blocks.
pub fn extract_text(response: GenerateContentResponse) -> Result<String, GeminiError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GeminiError::Blocked { reason });
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(GeminiError::EmptyResponse)?;

    let text = candidate.content.and_then(|content| {
        content.parts.into_iter().find_map(|part| match part {
            Part::Text { text } => Some(text),
            _ => None,
        })
    });

    match (text, candidate.finish_reason) {
        (_, Some(reason)) if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) => {
            Err(GeminiError::Blocked { reason })
        }
        (Some(text), _) => Ok(text),
        (None, _) => Err(GeminiError::EmptyResponse),
    }
}
