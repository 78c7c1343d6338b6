// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::analyze::rerank::DEFAULT_MINIMUM_RELEVANCE;

fn default_primary_provider() -> String {
    "lexical".to_string()
}
fn default_min_score() -> f64 {
    DEFAULT_MINIMUM_RELEVANCE
}

/// `ai` section: which capability reranks results and how strict it is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    #[serde(default)]
    pub enabled: bool,
    /// "lexical" is built in; other names need an injected capability.
    #[serde(default = "default_primary_provider")]
    pub primary_provider: String,
    #[serde(default = "default_min_score")]
    pub minimum_relevance_score: f64,
    /// Provider-specific settings, kept opaque.
    #[serde(default)]
    pub providers: HashMap<String, serde_json::Value>,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            primary_provider: default_primary_provider(),
            minimum_relevance_score: default_min_score(),
            providers: HashMap::new(),
        }
    }
}

impl AiSettings {
    /// Normalize provider name and clamp the threshold into [0,1].
    pub fn sanitize(&mut self) {
        self.primary_provider = self.primary_provider.trim().to_lowercase();
        if !self.minimum_relevance_score.is_finite() {
            self.minimum_relevance_score = default_min_score();
        }
        self.minimum_relevance_score = self.minimum_relevance_score.clamp(0.0, 1.0);
    }
}
