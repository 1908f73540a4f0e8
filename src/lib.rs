// lib.rs - Main library file that exports all modules
pub mod app;
pub mod config;
pub mod error;
pub mod gemini_client;
pub mod models;
pub mod services;
pub mod store;

// Re-export commonly used types for convenience
pub use app::{App, AppError};
pub use config::{Config, ConfigError};
pub use error::{AnalysisError, AnalysisErrorKind};
pub use gemini_client::{ContentGenerator, GeminiClient, GeminiError, GenerationRequest};
pub use models::*;
pub use store::{AnalysisStore, StoreError, SubscriptionStore, ThemeStore};
