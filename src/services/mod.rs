// src/services/mod.rs
pub mod analysis_parser;
pub mod analysis_service;
pub mod billing;
pub mod media;
pub mod prompts;
pub mod quota;

pub use analysis_service::{AnalysisService, DEFAULT_ANALYSIS_TIMEOUT};
pub use billing::{BillingError, CustomerInfo, EntitlementProvider, MockBilling, MockLatency};
pub use quota::QuotaDecision;
