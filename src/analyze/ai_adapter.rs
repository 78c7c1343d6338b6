//! AI adapter: the capability contract consumed by the ranker, plus the
//! built-in capabilities that need no remote provider.
//!
//! Remote providers (OpenAI, Gemini, Azure, ...) plug in by implementing
//! [`AiCapability`]; none ship with this crate.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ai::AiSettings;
use crate::error::AiError;
use crate::relevance::extract_keywords;

/// What the ranker needs from an AI provider.
#[async_trait]
pub trait AiCapability: Send + Sync {
    /// Relevance of `content` to `query` in [0,1].
    async fn calculate_relevance(&self, query: &str, content: &str) -> Result<f64, AiError>;

    /// Summary of `content`, at most `max_length` characters when given.
    async fn summarize_content(
        &self,
        content: &str,
        max_length: Option<usize>,
    ) -> Result<String, AiError>;

    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynAiCapability = Arc<dyn AiCapability>;

/// Always errors; stands in where a capability object is required but AI is off.
pub struct DisabledCapability;

#[async_trait]
impl AiCapability for DisabledCapability {
    async fn calculate_relevance(&self, _query: &str, _content: &str) -> Result<f64, AiError> {
        Err(AiError::Disabled)
    }

    async fn summarize_content(
        &self,
        _content: &str,
        _max_length: Option<usize>,
    ) -> Result<String, AiError> {
        Err(AiError::Disabled)
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic local capability.
///
/// * relevance: share of query keywords present in the content (1.0 when the
///   query has no keywords but appears verbatim, else 0.0)
/// * summary: whole sentences from the start of the content, cut at `max_length`
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalCapability;

#[async_trait]
impl AiCapability for LexicalCapability {
    async fn calculate_relevance(&self, query: &str, content: &str) -> Result<f64, AiError> {
        let haystack = content.to_lowercase();
        let keywords = extract_keywords(query);
        if keywords.is_empty() {
            let q = query.trim().to_lowercase();
            return Ok(if !q.is_empty() && haystack.contains(&q) { 1.0 } else { 0.0 });
        }
        let hits = keywords.iter().filter(|k| haystack.contains(k.as_str())).count();
        Ok((hits as f64 / keywords.len() as f64).clamp(0.0, 1.0))
    }

    async fn summarize_content(
        &self,
        content: &str,
        max_length: Option<usize>,
    ) -> Result<String, AiError> {
        Ok(summarize_sentences(content, max_length.unwrap_or(200)))
    }

    fn name(&self) -> &'static str {
        "lexical"
    }
}

/// Leading whole sentences within `max_chars`; hard cut with `...` when the
/// first sentence alone is too long.
pub fn summarize_sentences(content: &str, max_chars: usize) -> String {
    let text = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.chars().count() <= max_chars {
        return text;
    }

    let mut out = String::new();
    let mut sentence = String::new();
    for ch in text.chars() {
        sentence.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            if out.chars().count() + sentence.chars().count() > max_chars {
                break;
            }
            out.push_str(&sentence);
            sentence.clear();
        }
    }

    let out = out.trim().to_string();
    if !out.is_empty() {
        return out;
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

/// Factory: capability according to settings and environment.
///
/// * `AI_TEST_MODE=mock` → [`LexicalCapability`] regardless of settings.
/// * AI disabled → `None` (ranker passes candidates through).
/// * `primaryProvider = "lexical"` → [`LexicalCapability`].
/// * Any other provider → `None`, with a warning: remote providers are
///   injected by the embedder through [`crate::engine::ContextEngine::with_ai`].
pub fn build_capability(settings: &AiSettings) -> Option<DynAiCapability> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        info!(target: "rerank", "AI_TEST_MODE=mock: using lexical capability");
        return Some(Arc::new(LexicalCapability));
    }

    if !settings.enabled {
        return None;
    }

    match settings.primary_provider.to_ascii_lowercase().as_str() {
        "lexical" | "local-lexical" => Some(Arc::new(LexicalCapability)),
        other => {
            warn!(
                target: "rerank",
                provider = other,
                configured = settings.providers.len(),
                "no built-in capability for provider; reranking disabled"
            );
            None
        }
    }
}
