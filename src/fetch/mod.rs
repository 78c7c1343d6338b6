// src/fetch/mod.rs
//! Content fetching with the cache/fallback resilience chain:
//!
//! fresh cache → network → stale cache → synthesized fallback → literal error.
//!
//! Every call reports which link of the chain produced the content
//! ([`ContentOrigin`]) so callers and tests can see degraded paths.

pub mod html;
pub mod strategies;
pub mod transport;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::ContentCache;
use crate::error::FetchError;
use crate::fallback::FallbackSynthesizer;
use crate::fetch::strategies::{
    default_strategies, ContentStrategy, GenericStrategy, StrategyTable,
};
use crate::fetch::transport::HttpTransport;
use crate::sources::{SourceEntry, SourceType};

/// Keyword set handed to the fallback synthesizer when a fetch fails with no cache.
pub const ERROR_KEYWORDS: &[&str] = &["error"];

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_cache_fresh_total", "Fetches served from a fresh cache entry.");
        describe_counter!("fetch_network_ok_total", "Successful network fetches.");
        describe_counter!("fetch_network_errors_total", "Failed network fetches.");
        describe_counter!(
            "fetch_stale_served_total",
            "Failed fetches answered from a stale cache entry."
        );
        describe_counter!(
            "fetch_synthesized_total",
            "Failed fetches answered with synthesized content."
        );
        describe_counter!("fetch_failed_total", "Fetches that ended in the literal error.");
        describe_histogram!("fetch_ms", "Network fetch time in milliseconds.");
    });
}

/// Which link of the chain produced the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentOrigin {
    FreshCache,
    Network,
    StaleCache,
    Synthesized,
    Failed,
}

impl ContentOrigin {
    /// True when the content did not come from the source (now or earlier).
    pub fn is_degraded(&self) -> bool {
        matches!(self, ContentOrigin::Synthesized | ContentOrigin::Failed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub content: String,
    pub origin: ContentOrigin,
}

pub fn error_message(entry: &SourceEntry, err: &FetchError) -> String {
    format!("Error fetching content from {}: {}", entry.url, err)
}

pub struct ContentFetcher {
    transport: Arc<dyn HttpTransport>,
    cache: Arc<ContentCache>,
    fallback: Arc<FallbackSynthesizer>,
    strategies: StrategyTable,
    generic: Arc<dyn ContentStrategy>,
}

impl ContentFetcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        cache: Arc<ContentCache>,
        fallback: Arc<FallbackSynthesizer>,
    ) -> Self {
        Self::with_strategies(transport, cache, fallback, default_strategies())
    }

    /// Types missing from `strategies` use the generic strategy.
    pub fn with_strategies(
        transport: Arc<dyn HttpTransport>,
        cache: Arc<ContentCache>,
        fallback: Arc<FallbackSynthesizer>,
        strategies: StrategyTable,
    ) -> Self {
        ensure_metrics_described();
        Self {
            transport,
            cache,
            fallback,
            strategies,
            generic: Arc::new(GenericStrategy),
        }
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn fallback(&self) -> &Arc<FallbackSynthesizer> {
        &self.fallback
    }

    fn strategy_for(&self, source_type: SourceType) -> &Arc<dyn ContentStrategy> {
        self.strategies.get(&source_type).unwrap_or(&self.generic)
    }

    /// Network only: no cache read or write.
    pub async fn fetch_remote(&self, entry: &SourceEntry) -> Result<String, FetchError> {
        let strategy = self.strategy_for(entry.source_type);
        let t0 = Instant::now();
        let res = strategy.fetch(entry, self.transport.as_ref()).await;
        histogram!("fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        res
    }

    /// Run the full chain for one entry. Never fails.
    pub async fn fetch(&self, entry: &SourceEntry) -> Fetched {
        if let Some(content) = self.cache.get_fresh(&entry.url) {
            counter!("fetch_cache_fresh_total").increment(1);
            debug!(target: "fetch", url = %entry.url, "fresh cache hit");
            return Fetched {
                content,
                origin: ContentOrigin::FreshCache,
            };
        }

        let err = match self.fetch_remote(entry).await {
            Ok(content) => {
                counter!("fetch_network_ok_total").increment(1);
                self.cache.put(&entry.url, content.clone());
                debug!(
                    target: "fetch",
                    url = %entry.url,
                    strategy = self.strategy_for(entry.source_type).name(),
                    bytes = content.len(),
                    "fetched"
                );
                return Fetched {
                    content,
                    origin: ContentOrigin::Network,
                };
            }
            Err(e) => e,
        };

        counter!("fetch_network_errors_total").increment(1);

        if let Some(stale) = self.cache.get_any(&entry.url) {
            counter!("fetch_stale_served_total").increment(1);
            warn!(target: "fetch", url = %entry.url, error = %err, "serving stale cache");
            return Fetched {
                content: stale,
                origin: ContentOrigin::StaleCache,
            };
        }

        let keywords: Vec<String> = ERROR_KEYWORDS.iter().map(|s| s.to_string()).collect();
        if let Some(synth) = self.fallback.synthesize(entry, "error", &keywords) {
            counter!("fetch_synthesized_total").increment(1);
            info!(target: "fetch", url = %entry.url, error = %err, "serving synthesized fallback");
            return Fetched {
                content: synth,
                origin: ContentOrigin::Synthesized,
            };
        }

        counter!("fetch_failed_total").increment(1);
        warn!(target: "fetch", url = %entry.url, error = %err, "fetch failed with no fallback");
        Fetched {
            content: error_message(entry, &err),
            origin: ContentOrigin::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::fallback::FallbackPolicy;
    use crate::fetch::transport::FixtureTransport;
    use crate::sources::{AuthResolver, DEFAULT_DETECTION_TABLE};
    use chrono::Utc;
    use std::time::Duration;

    const URL: &str = "https://example.com/about";

    fn entry(url: &str) -> SourceEntry {
        SourceEntry::parse(url, &AuthResolver::default(), DEFAULT_DETECTION_TABLE).unwrap()
    }

    fn setup(policy: FallbackPolicy) -> (Arc<FixtureTransport>, Arc<ManualClock>, ContentFetcher) {
        let transport = Arc::new(FixtureTransport::new().with_text(URL, "live content"));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = Arc::new(ContentCache::with_clock(Duration::from_secs(60), clock.clone()));
        let fetcher = ContentFetcher::new(
            transport.clone(),
            cache,
            Arc::new(FallbackSynthesizer::new(policy)),
        );
        (transport, clock, fetcher)
    }

    #[tokio::test]
    async fn fresh_cache_skips_network() {
        let (t, _clock, f) = setup(FallbackPolicy::Never);
        let e = entry(URL);

        let first = f.fetch(&e).await;
        assert_eq!(first.origin, ContentOrigin::Network);
        assert_eq!(t.calls(), 1);

        let second = f.fetch(&e).await;
        assert_eq!(second.origin, ContentOrigin::FreshCache);
        assert_eq!(second.content, first.content);
        assert_eq!(t.calls(), 1, "fresh cache must not touch the network");
    }

    #[tokio::test]
    async fn stale_cache_refetches_and_overwrites() {
        let (t, clock, f) = setup(FallbackPolicy::Never);
        let e = entry(URL);
        f.fetch(&e).await;

        clock.advance(Duration::from_secs(61));
        t.set(URL, transport::HttpBody::Text("newer content".into()));
        let again = f.fetch(&e).await;
        assert_eq!(again.origin, ContentOrigin::Network);
        assert_eq!(again.content, "newer content");
        assert_eq!(f.cache().get_any(URL).as_deref(), Some("newer content"));
    }

    #[tokio::test]
    async fn network_error_serves_stale_entry() {
        let (t, clock, f) = setup(FallbackPolicy::Never);
        let e = entry(URL);
        f.fetch(&e).await;

        clock.advance(Duration::from_secs(3600));
        t.set_down(true);
        let got = f.fetch(&e).await;
        assert_eq!(got.origin, ContentOrigin::StaleCache);
        assert_eq!(got.content, "live content");
        assert_eq!(t.calls(), 2);
    }

    #[tokio::test]
    async fn no_cache_uses_fallback_then_literal_error() {
        let (t, _clock, f) = setup(FallbackPolicy::Always);
        t.set_down(true);
        let e = entry(URL);
        let got = f.fetch(&e).await;
        assert_eq!(got.origin, ContentOrigin::Synthesized);
        assert!(got.content.contains("error"));
        assert!(f.cache().get_any(URL).is_none(), "synthesized content is never cached");

        let (t, _clock, f) = setup(FallbackPolicy::Never);
        t.set_down(true);
        let got = f.fetch(&e).await;
        assert_eq!(got.origin, ContentOrigin::Failed);
        assert!(got.content.starts_with("Error fetching content from https://example.com/about"));
    }

    #[tokio::test]
    async fn known_family_rejects_error_keywords() {
        let url = "https://github.com/acme/devops-examples/blob/main/README.md";
        let (t, _clock, f) = setup(FallbackPolicy::Always);
        t.set_down(true);
        let got = f.fetch(&entry(url)).await;
        assert_eq!(got.origin, ContentOrigin::Failed);
    }
}
