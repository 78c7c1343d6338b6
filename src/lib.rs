// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod relevance;
pub mod sources;

// Fetch pipeline (transport seam, per-type strategies, HTML extraction)
pub mod fetch;

// Optional AI second pass (capability contract, reranker)
pub mod analyze;

// ---- Re-exports for stable public API ----
pub use analyze::ai_adapter;
pub use crate::analyze::{AiCapability, RelevanceRanker};
pub use crate::cache::{CacheStats, ContentCache};
pub use crate::config::EngineConfig;
pub use crate::engine::{ContextEngine, QueryResult};
pub use crate::error::{AiError, FetchError, SourceError};
pub use crate::fallback::{FallbackPolicy, FallbackSynthesizer};
pub use crate::fetch::{ContentFetcher, ContentOrigin, Fetched};
pub use crate::sources::{AuthBinding, AuthRule, SourceEntry, SourceRegistry, SourceType};
