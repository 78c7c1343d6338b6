// src/config/mod.rs
//! Engine configuration: sources, cache TTL, auth rules, AI and fallback
//! settings. Loaded from JSON or TOML, then adjusted from the environment.

pub mod ai;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::ai::AiSettings;
use crate::fallback::FallbackSettings;
use crate::fetch::transport::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
use crate::sources::AuthRule;

pub const ENV_CONFIG_PATH: &str = "WIKI_CONTEXT_CONFIG";
pub const ENV_CACHE_TTL_MINUTES: &str = "WIKI_CONTEXT_CACHE_TTL_MINUTES";
pub const ENV_MIN_RELEVANCE: &str = "WIKI_CONTEXT_MIN_RELEVANCE";
pub const DEFAULT_JSON_PATH: &str = "config/wiki-context.json";
pub const DEFAULT_TOML_PATH: &str = "config/wiki-context.toml";
pub const DEFAULT_CACHE_TIMEOUT_MINUTES: u64 = 30;

fn default_cache_timeout() -> u64 {
    DEFAULT_CACHE_TIMEOUT_MINUTES
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// `http` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub wiki_urls: Vec<String>,
    #[serde(default = "default_cache_timeout")]
    pub cache_timeout_minutes: u64,
    #[serde(default)]
    pub auth: Vec<AuthRule>,
    #[serde(default)]
    pub ai: AiSettings,
    #[serde(default)]
    pub fallback: FallbackSettings,
    #[serde(default)]
    pub http: HttpSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wiki_urls: Vec::new(),
            cache_timeout_minutes: default_cache_timeout(),
            auth: Vec::new(),
            ai: AiSettings::default(),
            fallback: FallbackSettings::default(),
            http: HttpSettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_timeout_minutes.saturating_mul(60))
    }

    /// Parse from a string. `hint_ext` ("json" / "toml") picks the first
    /// format tried; the other one is tried next.
    pub fn parse(s: &str, hint_ext: &str) -> Result<Self> {
        let try_toml_first = hint_ext.eq_ignore_ascii_case("toml")
            || (!hint_ext.eq_ignore_ascii_case("json") && !s.trim_start().starts_with('{'));

        let mut cfg = if try_toml_first {
            match toml::from_str::<EngineConfig>(s) {
                Ok(c) => c,
                Err(toml_err) => serde_json::from_str(s).map_err(|json_err| {
                    anyhow!("unsupported config format (toml: {toml_err}; json: {json_err})")
                })?,
            }
        } else {
            match serde_json::from_str::<EngineConfig>(s) {
                Ok(c) => c,
                Err(json_err) => toml::from_str(s).map_err(|toml_err| {
                    anyhow!("unsupported config format (json: {json_err}; toml: {toml_err})")
                })?,
            }
        };
        cfg.sanitize();
        Ok(cfg)
    }

    /// Load from an explicit path (format by extension, content as fallback).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = Self::parse(&content, &ext)
            .with_context(|| format!("parsing config {}", path.display()))?;
        info!(
            target: "engine",
            path = %path.display(),
            sources = cfg.wiki_urls.len(),
            auth_rules = cfg.auth.len(),
            "config loaded"
        );
        Ok(cfg)
    }

    /// Resolve the config file, then apply env overrides:
    /// 1) `explicit`
    /// 2) $WIKI_CONTEXT_CONFIG
    /// 3) config/wiki-context.json
    /// 4) config/wiki-context.toml
    /// 5) defaults (no sources)
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut cfg = match Self::resolve_path(explicit)? {
            Some(p) => Self::load_from(&p)?,
            None => {
                info!(target: "engine", "no config file found; using defaults");
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn resolve_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(p) = explicit {
            return Ok(Some(p.to_path_buf()));
        }
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Ok(Some(pb));
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        for candidate in [DEFAULT_JSON_PATH, DEFAULT_TOML_PATH] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Ok(Some(pb));
            }
        }
        Ok(None)
    }

    /// Unparseable values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var(ENV_CACHE_TTL_MINUTES) {
            match raw.trim().parse::<u64>() {
                Ok(m) => self.cache_timeout_minutes = m,
                Err(_) => warn!(
                    target: "engine",
                    value = %raw,
                    "ignoring invalid {ENV_CACHE_TTL_MINUTES}"
                ),
            }
        }
        if let Ok(raw) = std::env::var(ENV_MIN_RELEVANCE) {
            match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => self.ai.minimum_relevance_score = v.clamp(0.0, 1.0),
                _ => warn!(target: "engine", value = %raw, "ignoring invalid {ENV_MIN_RELEVANCE}"),
            }
        }
    }

    fn sanitize(&mut self) {
        self.wiki_urls = self
            .wiki_urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();
        self.ai.sanitize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    const JSON: &str = r#"{
        "wikiUrls": ["https://example.com/docs/readme.md", "  "],
        "cacheTimeoutMinutes": 1,
        "auth": [{"urlPattern": "^https://private\\.", "type": "basic", "username": "u", "password": "p"}],
        "ai": {"enabled": true, "primaryProvider": "lexical", "minimumRelevanceScore": 0.7}
    }"#;

    const TOML: &str = r#"
wikiUrls = ["https://wiki.nixos.org/wiki/Flakes"]
cacheTimeoutMinutes = 5

[[auth]]
urlPattern = "nixos"
type = "token"
token = "t0k"

[fallback]
policy = "random"
probability = 0.25

[http]
timeoutSecs = 3
"#;

    #[test]
    fn json_config_parses_with_defaults() {
        let c = EngineConfig::parse(JSON, "json").unwrap();
        assert_eq!(c.wiki_urls, vec!["https://example.com/docs/readme.md"]);
        assert_eq!(c.cache_ttl(), Duration::from_secs(60));
        assert_eq!(c.auth.len(), 1);
        assert_eq!(c.auth[0].binding.kind(), "basic");
        assert!(c.ai.enabled);
        assert_eq!(c.ai.minimum_relevance_score, 0.7);
        assert_eq!(c.fallback.policy, "always");
        assert_eq!(c.http.timeout_secs, 15);
    }

    #[test]
    fn toml_config_parses_and_sniffs_without_hint() {
        for hint in ["toml", ""] {
            let c = EngineConfig::parse(TOML, hint).unwrap();
            assert_eq!(c.cache_timeout_minutes, 5);
            assert_eq!(c.auth[0].binding.kind(), "token");
            assert_eq!(c.fallback.probability, 0.25);
            assert_eq!(c.http.timeout(), Duration::from_secs(3));
            assert!(!c.ai.enabled);
        }
        // Wrong hint still succeeds through the second format.
        assert!(EngineConfig::parse(JSON, "toml").is_ok());
        assert!(EngineConfig::parse("not a config [", "json").is_err());
    }

    #[serial_test::serial]
    #[test]
    fn load_resolves_env_then_defaults() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_CACHE_TTL_MINUTES);
        env::remove_var(ENV_MIN_RELEVANCE);

        let c = EngineConfig::load(None).unwrap();
        assert!(c.wiki_urls.is_empty());
        assert_eq!(c.cache_timeout_minutes, DEFAULT_CACHE_TIMEOUT_MINUTES);

        fs::create_dir_all("config").unwrap();
        fs::write(DEFAULT_TOML_PATH, TOML).unwrap();
        assert_eq!(EngineConfig::load(None).unwrap().cache_timeout_minutes, 5);

        let p = tmp.path().join("custom.json");
        fs::write(&p, JSON).unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        assert_eq!(EngineConfig::load(None).unwrap().cache_timeout_minutes, 1);

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.json").display().to_string());
        assert!(EngineConfig::load(None).is_err());
        env::remove_var(ENV_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        let mut c = EngineConfig::default();
        env::set_var(ENV_CACHE_TTL_MINUTES, "2");
        env::set_var(ENV_MIN_RELEVANCE, "3.5");
        c.apply_env_overrides();
        assert_eq!(c.cache_timeout_minutes, 2);
        assert_eq!(c.ai.minimum_relevance_score, 1.0);

        env::set_var(ENV_CACHE_TTL_MINUTES, "soon");
        env::set_var(ENV_MIN_RELEVANCE, "NaN");
        c.apply_env_overrides();
        assert_eq!(c.cache_timeout_minutes, 2);
        assert_eq!(c.ai.minimum_relevance_score, 1.0);

        env::remove_var(ENV_CACHE_TTL_MINUTES);
        env::remove_var(ENV_MIN_RELEVANCE);
    }
}
