// src/services/prompts.rs
// Prompts sent with every analysis request

/// Prompt attached to photo and video analyses
pub const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are Vira, an expert viral content strategist specializing in TikTok, Instagram Reels, and YouTube Shorts.

Analyze the provided media content and return a JSON object with the following structure:
{
  "score": <number 0-100>,
  "viralPotential": "<Low|Moderate|High|Viral>",
  "hookStrength": "<Weak|Average|Strong>",
  "pacing": "<string describing pacing quality>",
  "keywords": [<array of relevant topic keywords>],
  "improvements": [<array of actionable improvement suggestions>],
  "seo": {
    "titles": [<3 catchy title suggestions>],
    "caption": "<ready-to-use engaging caption>",
    "hashtags": [<10-15 relevant hashtags without #>],
    "filename": "<SEO-friendly filename suggestion>"
  }
}

Be critical but constructive. Focus on:
- First 3 seconds hook effectiveness
- Pacing and viewer retention
- Audio/visual quality
- Trend alignment
- Call-to-action presence

Return ONLY valid JSON, no markdown formatting."#;

/// Prompt for text topics. Requests a score too, the parser needs one.
const METADATA_PROMPT: &str = r#"Generate optimized SEO metadata for TikTok, Instagram Reels, and YouTube Shorts based on the user's topic.
Return a JSON object with this EXACT structure:
{
  "score": <number 0-100 estimating the topic's viral potential>,
  "viralPotential": "<Low|Moderate|High|Viral>",
  "hookStrength": "<Weak|Average|Strong>",
  "keywords": [<array of relevant topic keywords>],
  "improvements": [<array of suggestions to make the topic more engaging>],
  "seo": {
    "titles": [<3 catchy title suggestions>],
    "caption": "<ready-to-use engaging caption>",
    "hashtags": [<10-15 relevant hashtags without #>],
    "platforms": {
      "tiktok": {
        "title": "<Catchy, viral hook title>",
        "description": "<Short, trend-focused description with keywords>",
        "tags": [<5-7 trending hashtags>]
      },
      "instagram": {
        "title": "<Aesthetic/Engaging title>",
        "description": "<Longer, value-driven caption with spacing>",
        "tags": [<10-15 mixed niche/broad hashtags>]
      },
      "youtube": {
        "title": "<Search-optimized clickbait-style title>",
        "description": "<Detailed description with keywords + Call to Action>",
        "tags": [<10-15 keyword-rich tags for SEO>]
      }
    }
  }
}

Return ONLY valid JSON, no markdown formatting."#;

pub fn metadata_prompt(topic: &str) -> String {
    format!("{}\n\nTopic: {}", METADATA_PROMPT, topic.trim())
}
