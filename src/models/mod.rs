// src/models/mod.rs
pub mod analysis;
pub mod subscription;
pub mod theme;

pub use analysis::{
    AnalysisInput, AnalysisProgress, AnalysisResult, AnalysisStatus, HookStrength, InputKind,
    InputSummary, ParsedAnalysis, PlatformSeo, PlatformVariants, SeoPayload, ViralPotential,
};
pub use subscription::{SubscriptionTier, TierConfig, UsageData};
pub use theme::ThemeMode;
