// src/error.rs
//! Error taxonomy of the analysis cycle.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisErrorKind {
    Network,
    Timeout,
    Parse,
    SafetyBlock,
    QuotaExceeded,
    FileRead,
    InvalidInput,
    Busy,
    Cancelled,
    Unknown,
}

impl fmt::Display for AnalysisErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Parse => "parse",
            Self::SafetyBlock => "safety-block",
            Self::QuotaExceeded => "quota-exceeded",
            Self::FileRead => "file-read",
            Self::InvalidInput => "invalid-input",
            Self::Busy => "busy",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A classified failure of one analysis. Lives only as the store's current error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct AnalysisError {
    pub kind: AnalysisErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl AnalysisError {
    pub fn new(kind: AnalysisErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    pub fn network() -> Self {
        Self::new(AnalysisErrorKind::Network, "Network error. Check your connection.", true)
    }

    pub fn timeout() -> Self {
        Self::new(AnalysisErrorKind::Timeout, "Analysis timed out. Try a shorter video.", true)
    }

    pub fn parse() -> Self {
        Self::new(AnalysisErrorKind::Parse, "Failed to parse analysis response", true)
    }

    pub fn safety_block() -> Self {
        Self::new(
            AnalysisErrorKind::SafetyBlock,
            "Content was flagged. Try different content.",
            false,
        )
    }

    pub fn quota_exceeded() -> Self {
        Self::new(
            AnalysisErrorKind::QuotaExceeded,
            "API quota exceeded. Try again later.",
            false,
        )
    }

    pub fn file_unreadable() -> Self {
        Self::new(
            AnalysisErrorKind::FileRead,
            "Could not read media file. Try a different file.",
            true,
        )
    }

    pub fn file_too_large() -> Self {
        Self::new(
            AnalysisErrorKind::FileRead,
            "File is too large. Try a shorter video.",
            false,
        )
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(AnalysisErrorKind::InvalidInput, message, false)
    }

    pub fn busy() -> Self {
        Self::new(
            AnalysisErrorKind::Busy,
            "An analysis is already running. Wait for it to finish.",
            true,
        )
    }

    pub fn cancelled() -> Self {
        Self::new(AnalysisErrorKind::Cancelled, "Analysis was cancelled.", true)
    }

    pub fn unknown() -> Self {
        Self::new(AnalysisErrorKind::Unknown, "An unexpected error occurred.", true)
    }

    /// Classifies a free-text upstream failure. First match wins.
    pub fn from_message(message: &str) -> Self {
        let message = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| message.contains(n));

        if has(&["network", "fetch"]) {
            Self::network()
        } else if has(&["safety", "blocked"]) {
            Self::safety_block()
        } else if has(&["quota", "limit"]) {
            Self::quota_exceeded()
        } else if has(&["memory", "size", "large"]) {
            Self::file_too_large()
        } else {
            Self::unknown()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_classification() {
        let cases = [
            ("TypeError: Network request failed", AnalysisErrorKind::Network, true),
            ("fetch failed", AnalysisErrorKind::Network, true),
            ("Response was blocked due to SAFETY", AnalysisErrorKind::SafetyBlock, false),
            ("Resource has been exhausted (e.g. check quota).", AnalysisErrorKind::QuotaExceeded, false),
            ("Rate limit reached", AnalysisErrorKind::QuotaExceeded, false),
            ("Request payload size exceeds the limit", AnalysisErrorKind::QuotaExceeded, false),
            ("Out of memory", AnalysisErrorKind::FileRead, false),
            ("something odd", AnalysisErrorKind::Unknown, true),
        ];

        for (message, kind, retryable) in cases {
            let err = AnalysisError::from_message(message);
            assert_eq!(err.kind, kind, "message: {}", message);
            assert_eq!(err.retryable, retryable, "message: {}", message);
        }
    }

    #[test]
    fn test_first_match_wins() {
        // "network" is checked before "blocked"
        let err = AnalysisError::from_message("network blocked by proxy");
        assert_eq!(err.kind, AnalysisErrorKind::Network);
    }

    #[test]
    fn test_display_is_message() {
        assert_eq!(AnalysisError::timeout().to_string(), "Analysis timed out. Try a shorter video.");
        assert_eq!(AnalysisErrorKind::SafetyBlock.to_string(), "safety-block");
    }
}
