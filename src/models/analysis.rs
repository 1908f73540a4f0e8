// src/models/analysis.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AnalysisError;

/// Kind of content submitted for analysis
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Image,
    Video,
    Text,
}

impl InputKind {
    pub fn is_media(&self) -> bool {
        matches!(self, InputKind::Image | InputKind::Video)
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Image => write!(f, "image"),
            InputKind::Video => write!(f, "video"),
            InputKind::Text => write!(f, "text"),
        }
    }
}

/// A piece of content handed to the analysis cycle.
///
/// Built by the media adapter (image/video) or from a typed topic (text).
/// Never mutated after it has been submitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInput {
    #[serde(rename = "type")]
    pub kind: InputKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub mime_type: String,
    /// Whole seconds, video only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_uri: Option<String>,
}

impl AnalysisInput {
    pub fn text(topic: impl Into<String>) -> Self {
        Self {
            kind: InputKind::Text,
            uri: None,
            text: Some(topic.into()),
            mime_type: "text/plain".to_string(),
            duration_secs: None,
            file_name: None,
            thumbnail_uri: None,
        }
    }

    pub fn media(kind: InputKind, uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            kind,
            uri: Some(uri.into()),
            text: None,
            mime_type: mime_type.into(),
            duration_secs: None,
            file_name: None,
            thumbnail_uri: None,
        }
    }

    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Checks the preconditions of the analysis cycle.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        match self.kind {
            InputKind::Image | InputKind::Video => {
                let has_uri = self.uri.as_deref().map(|u| !u.trim().is_empty()).unwrap_or(false);
                if !has_uri {
                    return Err(AnalysisError::invalid_input(format!(
                        "A {} analysis needs a source file.",
                        self.kind
                    )));
                }
            }
            InputKind::Text => {
                let has_text = self.text.as_deref().map(|t| !t.trim().is_empty()).unwrap_or(false);
                if !has_text {
                    return Err(AnalysisError::invalid_input("Enter a topic to generate metadata."));
                }
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> InputSummary {
        InputSummary {
            kind: self.kind,
            uri: if self.kind.is_media() { self.uri.clone() } else { None },
            text: if self.kind == InputKind::Text { self.text.clone() } else { None },
            file_name: self.file_name.clone(),
            thumbnail_uri: self.thumbnail_uri.clone(),
        }
    }
}

/// The originating input as stored alongside a result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InputSummary {
    #[serde(rename = "type")]
    pub kind: InputKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_uri: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ViralPotential {
    Low,
    #[default]
    Moderate,
    High,
    Viral,
}

impl ViralPotential {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "moderate" => Some(Self::Moderate),
            "high" => Some(Self::High),
            "viral" => Some(Self::Viral),
            _ => None,
        }
    }
}

impl fmt::Display for ViralPotential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
            Self::Viral => "Viral",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum HookStrength {
    Weak,
    #[default]
    Average,
    Strong,
}

impl HookStrength {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "weak" => Some(Self::Weak),
            "average" => Some(Self::Average),
            "strong" => Some(Self::Strong),
            _ => None,
        }
    }
}

impl fmt::Display for HookStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Weak => "Weak",
            Self::Average => "Average",
            Self::Strong => "Strong",
        };
        f.write_str(label)
    }
}

/// SEO copy for a single short-video platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PlatformSeo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PlatformVariants {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiktok: Option<PlatformSeo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<PlatformSeo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube: Option<PlatformSeo>,
}

impl PlatformVariants {
    pub fn is_empty(&self) -> bool {
        self.tiktok.is_none() && self.instagram.is_none() && self.youtube.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SeoPayload {
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<PlatformVariants>,
}

/// Everything the model returned, before an id and timestamp are attached
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAnalysis {
    pub score: f64,
    pub viral_potential: ViralPotential,
    pub hook_strength: HookStrength,
    pub pacing: String,
    pub keywords: Vec<String>,
    pub improvements: Vec<String>,
    pub seo: SeoPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: String,
    pub score: f64,
    pub viral_potential: ViralPotential,
    pub hook_strength: HookStrength,
    pub pacing: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    pub seo: SeoPayload,
    pub input: InputSummary,
    pub created_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn from_parsed(parsed: ParsedAnalysis, input: &AnalysisInput, created_at: DateTime<Utc>) -> Self {
        Self {
            id: format!("analysis_{}", uuid::Uuid::new_v4().simple()),
            score: parsed.score,
            viral_potential: parsed.viral_potential,
            hook_strength: parsed.hook_strength,
            pacing: parsed.pacing,
            keywords: parsed.keywords,
            improvements: parsed.improvements,
            seo: parsed.seo,
            input: input.summary(),
            created_at,
        }
    }

    /// Rounded score for display
    pub fn display_score(&self) -> u8 {
        self.score.round().clamp(0.0, 100.0) as u8
    }
}

/// Lifecycle of the current analysis
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    #[default]
    Idle,
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, AnalysisStatus::Uploading | AnalysisStatus::Processing)
    }
}

/// Snapshot broadcast to observers of the analysis store
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisProgress {
    pub status: AnalysisStatus,
    pub message: String,
}
