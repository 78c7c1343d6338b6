//! # Fallback Synthesis
//! Templated placeholder documents for sources that could be neither fetched
//! nor recalled from cache.
//!
//! Eligibility:
//! - Known source families (DevOps examples, NixOS) are eligible only when a
//!   keyword falls in their topic allowlist.
//! - Every other source follows the configured [`FallbackPolicy`].

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::sources::{SourceEntry, SourceType};

pub const DEFAULT_FALLBACK_PROBABILITY: f64 = 0.7;

/// A source family recognised by URL marker, with its topic allowlist.
#[derive(Debug, Clone, Copy)]
pub struct SourceFamily {
    pub name: &'static str,
    pub url_markers: &'static [&'static str],
    pub topics: &'static [&'static str],
}

pub const KNOWN_FAMILIES: &[SourceFamily] = &[
    SourceFamily {
        name: "devops-examples",
        url_markers: &["devops"],
        topics: &[
            "devops",
            "docker",
            "kubernetes",
            "pipeline",
            "ci",
            "cd",
            "jenkins",
            "aws",
            "terraform",
        ],
    },
    SourceFamily {
        name: "nixos",
        url_markers: &["nixos"],
        topics: &["nix", "nixos", "package", "flake", "linux", "config", "system"],
    },
];

pub type EligibilityFn = dyn Fn(&SourceEntry, &[String]) -> bool + Send + Sync;

/// Policy for sources outside the known families.
#[derive(Clone, Default)]
pub enum FallbackPolicy {
    #[default]
    Always,
    Never,
    /// Eligible with probability `p` (clamped to [0,1]) on each call.
    Probability(f64),
    Custom(Arc<EligibilityFn>),
}

impl fmt::Debug for FallbackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackPolicy::Always => f.write_str("Always"),
            FallbackPolicy::Never => f.write_str("Never"),
            FallbackPolicy::Probability(p) => write!(f, "Probability({p})"),
            FallbackPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// `fallback` section of the engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackSettings {
    #[serde(default = "default_policy_name")]
    pub policy: String,
    #[serde(default = "default_probability")]
    pub probability: f64,
}

fn default_policy_name() -> String {
    "always".to_string()
}

fn default_probability() -> f64 {
    DEFAULT_FALLBACK_PROBABILITY
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            policy: default_policy_name(),
            probability: default_probability(),
        }
    }
}

impl FallbackSettings {
    /// Unknown policy names fall back to `Always`.
    pub fn to_policy(&self) -> FallbackPolicy {
        match self.policy.trim().to_ascii_lowercase().as_str() {
            "never" | "off" => FallbackPolicy::Never,
            "random" | "probability" => FallbackPolicy::Probability(self.probability),
            _ => FallbackPolicy::Always,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FallbackSynthesizer {
    policy: FallbackPolicy,
}

impl FallbackSynthesizer {
    pub fn new(policy: FallbackPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &FallbackPolicy {
        &self.policy
    }

    /// Family the entry belongs to, if any.
    pub fn family_of(entry: &SourceEntry) -> Option<&'static SourceFamily> {
        let url = entry.url.to_ascii_lowercase();
        KNOWN_FAMILIES
            .iter()
            .find(|fam| fam.url_markers.iter().any(|m| url.contains(m)))
    }

    pub fn is_eligible(&self, entry: &SourceEntry, keywords: &[String]) -> bool {
        if let Some(fam) = Self::family_of(entry) {
            return keywords
                .iter()
                .any(|k| fam.topics.contains(&k.to_ascii_lowercase().as_str()));
        }
        match &self.policy {
            FallbackPolicy::Always => true,
            FallbackPolicy::Never => false,
            FallbackPolicy::Probability(p) => {
                let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
                rand::rng().random_bool(p)
            }
            FallbackPolicy::Custom(f) => f(entry, keywords),
        }
    }

    /// Placeholder document for `entry`, or `None` when the entry is not eligible.
    pub fn synthesize(
        &self,
        entry: &SourceEntry,
        query: &str,
        keywords: &[String],
    ) -> Option<String> {
        if !self.is_eligible(entry, keywords) {
            debug!(target: "fallback", url = %entry.url, "fallback not eligible");
            return None;
        }
        Some(render_template(entry, query, keywords))
    }
}

fn render_template(entry: &SourceEntry, query: &str, keywords: &[String]) -> String {
    let topics = if keywords.is_empty() {
        "general usage".to_string()
    } else {
        keywords.join(", ")
    };
    let name = &entry.display_name;
    let url = &entry.url;

    match entry.source_type {
        SourceType::Markdown => format!(
            "# {name}: {query}\n\n\
             This documentation covers topics related to {topics}.\n\n\
             ## Overview\n\n\
             The guide describes how `{query}` is handled in this project, \
             with configuration notes and common pitfalls.\n\n\
             ```\n# example for {query}\n```\n\n\
             [Read the full documentation]({url})\n"
        ),
        SourceType::MediaWiki => format!(
            "== {query} ==\n\n\
             '''{name}''' has an article about {query}.\n\n\
             === Related topics ===\n\
             * {topics}\n\n\
             See [{url} the wiki page] for the complete article.\n"
        ),
        SourceType::GitBook => format!(
            "# {query}\n\n\
             > GitBook space: {name}\n\n\
             This page walks through {query}, covering {topics}.\n\n\
             {{% hint style=\"info\" %}}\nOpen {url} for the latest version.\n{{% endhint %}}\n"
        ),
        SourceType::Confluence => format!(
            "h1. {query}\n\n\
             Space: {name}\n\n\
             This Confluence page documents {query} (labels: {topics}).\n\n\
             [View in Confluence|{url}]\n"
        ),
        SourceType::SharePoint => format!(
            "{query}\n\n\
             SharePoint site: {name}\n\n\
             Document summary: guidance on {query} and related topics ({topics}).\n\n\
             Open the document library: {url}\n"
        ),
        SourceType::Unknown => format!(
            "{name}: {query}\n\n\
             Documentation related to {topics}.\n\n\
             Source: {url}\n"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{AuthResolver, SourceEntry, DEFAULT_DETECTION_TABLE};

    fn entry(url: &str) -> SourceEntry {
        SourceEntry::parse(url, &AuthResolver::default(), DEFAULT_DETECTION_TABLE).unwrap()
    }

    fn kw(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn markdown_template_contains_query() {
        let s = FallbackSynthesizer::default();
        let e = entry("https://example.com/docs/readme.md");
        let doc = s
            .synthesize(&e, "How do I configure caching?", &kw(&["configure", "caching"]))
            .expect("always policy");
        assert!(doc.contains("How do I configure caching?"));
        assert!(doc.contains("configure, caching"));
        assert!(doc.contains("(https://example.com/docs/readme.md)"));
    }

    #[test]
    fn templates_follow_source_type() {
        let s = FallbackSynthesizer::default();
        let wiki = s
            .synthesize(&entry("https://en.wikipedia.org/wiki/Rust"), "ownership", &[])
            .unwrap();
        assert!(wiki.starts_with("== ownership =="));
        let conf = s
            .synthesize(&entry("https://acme.atlassian.net/wiki/spaces/X"), "runbook", &[])
            .unwrap();
        assert!(conf.starts_with("h1. runbook"));
        assert!(conf.contains("|https://acme.atlassian.net/wiki/spaces/X]"));
    }

    #[test]
    fn known_families_use_topic_allowlist() {
        let s = FallbackSynthesizer::new(FallbackPolicy::Never);
        let devops = entry("https://github.com/acme/devops-examples/blob/main/README.md");
        assert!(s.is_eligible(&devops, &kw(&["kubernetes"])));
        assert!(!s.is_eligible(&devops, &kw(&["error"])));

        let nix = entry("https://wiki.nixos.org/wiki/Flakes");
        assert!(s.is_eligible(&nix, &kw(&["flake", "other"])));
        assert!(!s.is_eligible(&nix, &kw(&["windows"])));

        let always = FallbackSynthesizer::new(FallbackPolicy::Always);
        assert!(!always.is_eligible(&devops, &kw(&["error"])), "family rule wins over policy");
    }

    #[test]
    fn policies_for_other_sources() {
        let e = entry("https://example.com/about");
        assert!(FallbackSynthesizer::new(FallbackPolicy::Always).is_eligible(&e, &[]));
        assert!(!FallbackSynthesizer::new(FallbackPolicy::Never).is_eligible(&e, &[]));
        assert!(!FallbackSynthesizer::new(FallbackPolicy::Probability(0.0)).is_eligible(&e, &[]));
        assert!(FallbackSynthesizer::new(FallbackPolicy::Probability(1.0)).is_eligible(&e, &[]));

        let custom = FallbackPolicy::Custom(Arc::new(|_e: &SourceEntry, k: &[String]| k.len() > 1));
        let s = FallbackSynthesizer::new(custom);
        assert!(s.is_eligible(&e, &kw(&["a", "b"])));
        assert!(s.synthesize(&e, "q", &kw(&["a"])).is_none());
    }

    #[test]
    fn settings_map_to_policies() {
        let s: FallbackSettings =
            serde_json::from_str(r#"{"policy": "random", "probability": 0.25}"#).unwrap();
        assert!(matches!(s.to_policy(), FallbackPolicy::Probability(p) if (p - 0.25).abs() < 1e-9));
        let s: FallbackSettings = serde_json::from_str("{}").unwrap();
        assert!(matches!(s.to_policy(), FallbackPolicy::Always));
        assert!((s.probability - 0.7).abs() < 1e-9);
    }
}
