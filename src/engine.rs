//! # Context Engine
//! Entry point for queries: fans a query out to every configured source,
//! keeps the relevant excerpts, reranks them, and always answers with at
//! least one result.
//!
//! Per source: fetch (cache → network → stale → fallback) → relevance check →
//! section extraction. A source whose fetch ended in the literal error gets a
//! synthesized result instead, when its fallback policy allows one.

use futures::future::join_all;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analyze::ai_adapter::{build_capability, DynAiCapability};
use crate::analyze::rerank::RelevanceRanker;
use crate::cache::{CacheStats, ContentCache};
use crate::config::EngineConfig;
use crate::fallback::FallbackSynthesizer;
use crate::fetch::transport::{HttpTransport, ReqwestTransport};
use crate::fetch::{ContentFetcher, ContentOrigin};
use crate::relevance::{anon_hash, extract_keywords, extract_section, is_relevant};
use crate::sources::{SourceEntry, SourceRegistry, SourceType};

pub const PLACEHOLDER_TITLE: &str = "No matching documentation";
pub const PLACEHOLDER_SOURCE: &str = "wiki-context";
pub const PLACEHOLDER_CONTENT: &str = "No configured documentation source returned content relevant to this query.\n\n\
To add sources, list their URLs under `wikiUrls` in config/wiki-context.json \
(or point WIKI_CONTEXT_CONFIG at another JSON/TOML file). Private sources need \
an `auth` rule: `{\"urlPattern\": \"^https://private\\\\.\", \"type\": \"basic\", \
\"username\": \"...\", \"password\": \"...\"}`; `token` and `custom` header rules are \
also supported.";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("engine_queries_total", "Queries handled by the context engine.");
        describe_counter!(
            "engine_placeholder_total",
            "Queries answered only with the configuration placeholder."
        );
        describe_counter!(
            "rerank_item_errors_total",
            "Candidates whose AI scoring failed and took the default score."
        );
    });
}

/// One excerpt handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "source")]
    pub source_name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
    #[serde(rename = "relevanceScore", skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl QueryResult {
    fn from_entry(entry: &SourceEntry, content: String) -> Self {
        Self {
            title: entry.display_name.clone(),
            content,
            url: Some(entry.url.clone()),
            source_name: entry.display_name.clone(),
            source_type: Some(entry.source_type),
            relevance_score: None,
            summary: None,
        }
    }

    /// Static result explaining how to configure sources.
    pub fn placeholder() -> Self {
        Self {
            title: PLACEHOLDER_TITLE.to_string(),
            content: PLACEHOLDER_CONTENT.to_string(),
            url: None,
            source_name: PLACEHOLDER_SOURCE.to_string(),
            source_type: None,
            relevance_score: None,
            summary: None,
        }
    }
}

pub struct ContextEngine {
    registry: SourceRegistry,
    fetcher: ContentFetcher,
    ranker: RelevanceRanker,
}

impl ContextEngine {
    pub fn new(
        registry: SourceRegistry,
        fetcher: ContentFetcher,
        ranker: RelevanceRanker,
    ) -> Self {
        ensure_metrics_described();
        Self {
            registry,
            fetcher,
            ranker,
        }
    }

    /// Production wiring: reqwest transport built from the `http` section.
    pub fn from_config(cfg: &EngineConfig) -> anyhow::Result<Self> {
        let transport = ReqwestTransport::new(cfg.http.timeout(), &cfg.http.user_agent)?;
        Ok(Self::from_config_with_transport(cfg, Arc::new(transport)))
    }

    /// Same wiring over any transport (fixtures, custom clients).
    pub fn from_config_with_transport(
        cfg: &EngineConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let registry = SourceRegistry::new(&cfg.wiki_urls, &cfg.auth);
        let cache = Arc::new(ContentCache::new(cfg.cache_ttl()));
        let fallback = Arc::new(FallbackSynthesizer::new(cfg.fallback.to_policy()));
        let fetcher = ContentFetcher::new(transport.clone(), cache, fallback);
        let ranker = RelevanceRanker::new(
            build_capability(&cfg.ai),
            cfg.ai.minimum_relevance_score,
        );

        info!(
            target: "engine",
            sources = registry.len(),
            rejected = registry.rejected().len(),
            transport = transport.name(),
            ttl_secs = cfg.cache_ttl().as_secs(),
            rerank = ranker.is_enabled(),
            "context engine ready"
        );
        Self::new(registry, fetcher, ranker)
    }

    /// Replace the AI capability, keeping the configured minimum score.
    pub fn with_ai(mut self, ai: DynAiCapability) -> Self {
        self.ranker = RelevanceRanker::new(Some(ai), self.ranker.minimum_score());
        self
    }

    pub fn sources(&self) -> &[SourceEntry] {
        self.registry.entries()
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        self.fetcher.cache()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.fetcher.cache().stats()
    }

    async fn process_entry(
        &self,
        entry: &SourceEntry,
        query: &str,
        keywords: &[String],
    ) -> Option<QueryResult> {
        let fetched = self.fetcher.fetch(entry).await;

        if fetched.origin == ContentOrigin::Failed {
            let synth = self.fetcher.fallback().synthesize(entry, query, keywords)?;
            debug!(target: "engine", url = %entry.url, "synthesized result for failed source");
            return Some(QueryResult::from_entry(entry, synth));
        }

        if !is_relevant(&fetched.content, query, keywords) {
            debug!(target: "engine", url = %entry.url, origin = ?fetched.origin, "not relevant");
            return None;
        }
        let section = extract_section(&fetched.content, query, keywords);
        Some(QueryResult::from_entry(entry, section))
    }

    /// Relevant excerpts for `query`. Never empty.
    pub async fn get_context(&self, query: &str) -> Vec<QueryResult> {
        counter!("engine_queries_total").increment(1);
        let query_id = anon_hash(query);
        let keywords = extract_keywords(query);

        let tasks = self
            .registry
            .entries()
            .iter()
            .map(|entry| self.process_entry(entry, query, &keywords));
        let mut results: Vec<QueryResult> = join_all(tasks).await.into_iter().flatten().collect();

        let matched = results.len();
        if results.is_empty() {
            counter!("engine_placeholder_total").increment(1);
            results.push(QueryResult::placeholder());
        }

        let ranked = self.ranker.rank(query, results).await;
        info!(
            target: "engine",
            query_id = %query_id,
            keywords = keywords.len(),
            sources = self.registry.len(),
            matched,
            returned = ranked.len(),
            "query answered"
        );
        ranked
    }

    /// `{"query": {"text": "..."}}`; anything without a string `text`
    /// yields an empty list.
    pub async fn handle_request(&self, request: &serde_json::Value) -> Vec<QueryResult> {
        let text = request
            .get("query")
            .and_then(|q| q.get("text"))
            .and_then(serde_json::Value::as_str);
        match text {
            Some(text) => self.get_context(text).await,
            None => {
                warn!(target: "engine", "request without query.text");
                Vec::new()
            }
        }
    }

    /// Fetch every source once so later queries hit the cache.
    pub async fn warm_cache(&self) -> Vec<(String, ContentOrigin)> {
        let tasks = self.registry.entries().iter().map(|entry| async move {
            let fetched = self.fetcher.fetch(entry).await;
            (entry.url.clone(), fetched.origin)
        });
        let origins = join_all(tasks).await;
        let degraded = origins.iter().filter(|(_, o)| o.is_degraded()).count();
        info!(
            target: "engine",
            sources = origins.len(),
            degraded,
            "cache warmed"
        );
        origins
    }
}
