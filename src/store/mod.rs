// src/store/mod.rs
//! State containers owned by the application root. Each keeps its state
//! behind an async lock and mirrors it to one JSON slot on disk.
pub mod analysis_store;
pub mod persist;
pub mod subscription_store;
pub mod theme_store;

pub use analysis_store::{AnalysisStore, MAX_HISTORY_ITEMS};
pub use persist::{JsonSlot, StoreError};
pub use subscription_store::{SubscriptionError, SubscriptionStore};
pub use theme_store::ThemeStore;
