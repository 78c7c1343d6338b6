// src/analyze/rerank.rs
//! Reranking: score every candidate through the AI capability, attach a
//! summary to long candidates, sort by score and drop the ones below the
//! minimum.
//!
//! - A per-item scoring error defaults that item to 0.5 with no summary.
//! - If the threshold removes everything, the original list is returned.

use futures::future::join_all;
use metrics::counter;
use tracing::{debug, warn};

use crate::analyze::ai_adapter::DynAiCapability;
use crate::engine::QueryResult;

pub const DEFAULT_MINIMUM_RELEVANCE: f64 = 0.3;
pub const FALLBACK_SCORE: f64 = 0.5;
/// Candidates longer than this (in characters) get a summary.
pub const SUMMARY_TRIGGER_CHARS: usize = 200;
pub const SUMMARY_MAX_CHARS: usize = 200;

pub struct RelevanceRanker {
    ai: Option<DynAiCapability>,
    minimum_score: f64,
}

impl RelevanceRanker {
    pub fn new(ai: Option<DynAiCapability>, minimum_score: f64) -> Self {
        Self {
            ai,
            minimum_score: if minimum_score.is_finite() {
                minimum_score.clamp(0.0, 1.0)
            } else {
                DEFAULT_MINIMUM_RELEVANCE
            },
        }
    }

    /// Pass-through ranker.
    pub fn disabled() -> Self {
        Self::new(None, DEFAULT_MINIMUM_RELEVANCE)
    }

    pub fn is_enabled(&self) -> bool {
        self.ai.is_some()
    }

    pub fn minimum_score(&self) -> f64 {
        self.minimum_score
    }

    async fn score_one(ai: &DynAiCapability, query: &str, mut item: QueryResult) -> QueryResult {
        let scored = async {
            let score = ai.calculate_relevance(query, &item.content).await?;
            let summary = if item.content.chars().count() > SUMMARY_TRIGGER_CHARS {
                Some(ai.summarize_content(&item.content, Some(SUMMARY_MAX_CHARS)).await?)
            } else {
                None
            };
            Ok::<_, crate::error::AiError>((score, summary))
        }
        .await;

        match scored {
            Ok((score, summary)) => {
                item.relevance_score = Some(if score.is_finite() {
                    score.clamp(0.0, 1.0)
                } else {
                    FALLBACK_SCORE
                });
                item.summary = summary;
            }
            Err(e) => {
                counter!("rerank_item_errors_total").increment(1);
                warn!(
                    target: "rerank",
                    source = %item.source_name,
                    error = %e,
                    "scoring failed; using default"
                );
                item.relevance_score = Some(FALLBACK_SCORE);
                item.summary = None;
            }
        }
        item
    }

    /// Score, sort (stable, descending) and threshold `candidates`.
    pub async fn rank(&self, query: &str, candidates: Vec<QueryResult>) -> Vec<QueryResult> {
        let Some(ai) = &self.ai else {
            return candidates;
        };

        let mut scored: Vec<QueryResult> = join_all(
            candidates
                .iter()
                .cloned()
                .map(|item| Self::score_one(ai, query, item)),
        )
        .await;

        scored.sort_by(|a, b| {
            let sa = a.relevance_score.unwrap_or(0.0);
            let sb = b.relevance_score.unwrap_or(0.0);
            sb.total_cmp(&sa)
        });

        let kept: Vec<QueryResult> = scored
            .into_iter()
            .filter(|r| r.relevance_score.unwrap_or(0.0) >= self.minimum_score)
            .collect();

        debug!(
            target: "rerank",
            provider = ai.name(),
            candidates = candidates.len(),
            kept = kept.len(),
            minimum = self.minimum_score,
            "reranked"
        );

        if kept.is_empty() {
            return candidates;
        }
        kept
    }
}
