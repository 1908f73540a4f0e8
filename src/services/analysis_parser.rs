// src/services/analysis_parser.rs
// Turns raw model text into a ParsedAnalysis.
// Only the score is mandatory; every other field falls back to a default.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::AnalysisError;
use crate::models::{
    HookStrength, ParsedAnalysis, PlatformSeo, PlatformVariants, SeoPayload, ViralPotential,
};

pub const DEFAULT_PACING: &str = "Not analyzed";

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)\s*```").unwrap();
}

/// Strips a markdown fence, then keeps the first `{` through the last `}`.
pub fn extract_json_object(text: &str) -> &str {
    let unfenced = CODE_FENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text);

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => unfenced,
    }
}

pub fn parse_analysis_response(text: &str) -> Result<ParsedAnalysis, AnalysisError> {
    tracing::debug!(
        "Raw analysis response preview: {}",
        text.chars().take(300).collect::<String>()
    );

    let json_text = extract_json_object(text);
    let parsed: Value = serde_json::from_str(json_text).map_err(|e| {
        tracing::warn!("Analysis response is not valid JSON: {}", e);
        AnalysisError::parse()
    })?;

    let score = parsed.get("score").and_then(Value::as_f64).ok_or_else(|| {
        tracing::warn!("Analysis response is missing a numeric score");
        AnalysisError::parse()
    })?;

    let viral_potential = string_field(&parsed, "viralPotential")
        .and_then(|label| ViralPotential::from_label(&label))
        .unwrap_or_default();
    let hook_strength = string_field(&parsed, "hookStrength")
        .and_then(|label| HookStrength::from_label(&label))
        .unwrap_or_default();

    Ok(ParsedAnalysis {
        score: score.clamp(0.0, 100.0),
        viral_potential,
        hook_strength,
        pacing: string_field(&parsed, "pacing").unwrap_or_else(|| DEFAULT_PACING.to_string()),
        keywords: string_list(parsed.get("keywords")),
        improvements: string_list(parsed.get("improvements")),
        seo: parse_seo(parsed.get("seo")),
    })
}

fn parse_seo(seo: Option<&Value>) -> SeoPayload {
    let Some(seo) = seo.filter(|v| v.is_object()) else {
        return SeoPayload::default();
    };

    SeoPayload {
        titles: string_list(seo.get("titles")),
        caption: string_field(seo, "caption").unwrap_or_default(),
        hashtags: string_list(seo.get("hashtags")),
        filename: string_field(seo, "filename"),
        platforms: parse_platforms(seo.get("platforms")),
    }
}

fn parse_platforms(platforms: Option<&Value>) -> Option<PlatformVariants> {
    let platforms = platforms?;
    let platform = |key: &str| {
        platforms
            .get(key)
            .filter(|v| v.is_object())
            .map(|v| PlatformSeo {
                title: string_field(v, "title").unwrap_or_default(),
                description: string_field(v, "description").unwrap_or_default(),
                tags: string_list(v.get("tags")),
            })
    };

    let variants = PlatformVariants {
        tiktok: platform("tiktok"),
        instagram: platform("instagram"),
        youtube: platform("youtube"),
    };
    (!variants.is_empty()).then_some(variants)
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisErrorKind;

    const FULL_RESPONSE: &str = r#"{
        "score": 78,
        "viralPotential": "High",
        "hookStrength": "Strong",
        "pacing": "Fast cuts keep attention",
        "keywords": ["travel", "roadtrip"],
        "improvements": ["Add captions"],
        "seo": {
            "titles": ["A", "B", "C"],
            "caption": "Hit the road",
            "hashtags": ["travel", "summer"],
            "filename": "summer-roadtrip.mp4"
        }
    }"#;

    #[test]
    fn test_parse_full_response() {
        let parsed = parse_analysis_response(FULL_RESPONSE).unwrap();
        assert_eq!(parsed.score, 78.0);
        assert_eq!(parsed.viral_potential, ViralPotential::High);
        assert_eq!(parsed.hook_strength, HookStrength::Strong);
        assert_eq!(parsed.keywords, vec!["travel", "roadtrip"]);
        assert_eq!(parsed.seo.titles.len(), 3);
        assert_eq!(parsed.seo.filename.as_deref(), Some("summer-roadtrip.mp4"));
        assert!(parsed.seo.platforms.is_none());
    }

    #[test]
    fn test_fenced_response_with_chatter() {
        let text = format!("Here is your analysis:\n```json\n{}\n```\nEnjoy!", FULL_RESPONSE);
        let parsed = parse_analysis_response(&text).unwrap();
        assert_eq!(parsed.score, 78.0);
    }

    #[test]
    fn test_bare_fence_and_leading_text() {
        let text = "```\nsure {\"score\": 12}\n```";
        assert_eq!(parse_analysis_response(text).unwrap().score, 12.0);
        assert_eq!(extract_json_object("noise {\"a\": {\"b\": 1}} tail"), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn test_score_is_clamped() {
        assert_eq!(parse_analysis_response(r#"{"score": 140}"#).unwrap().score, 100.0);
        assert_eq!(parse_analysis_response(r#"{"score": -3.5}"#).unwrap().score, 0.0);
        assert_eq!(parse_analysis_response(r#"{"score": 55.5}"#).unwrap().score, 55.5);
    }

    #[test]
    fn test_missing_score_is_parse_error() {
        let err = parse_analysis_response(r#"{"viralPotential": "High"}"#).unwrap_err();
        assert_eq!(err.kind, AnalysisErrorKind::Parse);
        assert!(err.retryable);

        // a string score is not a number
        let err = parse_analysis_response(r#"{"score": "80"}"#).unwrap_err();
        assert_eq!(err.kind, AnalysisErrorKind::Parse);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = parse_analysis_response("the model refused").unwrap_err();
        assert_eq!(err.kind, AnalysisErrorKind::Parse);
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let parsed = parse_analysis_response(r#"{"score": 40}"#).unwrap();
        assert_eq!(parsed.viral_potential, ViralPotential::Moderate);
        assert_eq!(parsed.hook_strength, HookStrength::Average);
        assert_eq!(parsed.pacing, DEFAULT_PACING);
        assert!(parsed.keywords.is_empty());
        assert!(parsed.improvements.is_empty());
        assert_eq!(parsed.seo, SeoPayload::default());
    }

    #[test]
    fn test_unknown_labels_fall_back() {
        let parsed =
            parse_analysis_response(r#"{"score": 40, "viralPotential": "Explosive", "hookStrength": 3}"#)
                .unwrap();
        assert_eq!(parsed.viral_potential, ViralPotential::Moderate);
        assert_eq!(parsed.hook_strength, HookStrength::Average);
    }

    #[test]
    fn test_platform_variants_are_kept_verbatim() {
        let text = r#"{
            "score": 66,
            "seo": {
                "platforms": {
                    "tiktok": {"title": "POV: 3000 miles of sunsets 🌅", "description": "road vibes", "tags": ["roadtrip", "fyp"]},
                    "youtube": {"title": "I Drove Across America"}
                }
            }
        }"#;
        let parsed = parse_analysis_response(text).unwrap();
        let platforms = parsed.seo.platforms.unwrap();
        let tiktok = platforms.tiktok.unwrap();
        assert_eq!(tiktok.title, "POV: 3000 miles of sunsets 🌅");
        assert_eq!(tiktok.tags, vec!["roadtrip", "fyp"]);
        assert!(platforms.instagram.is_none());
        let youtube = platforms.youtube.unwrap();
        assert_eq!(youtube.description, "");
        assert!(youtube.tags.is_empty());
    }
}
