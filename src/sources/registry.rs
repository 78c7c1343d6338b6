//! Source registry: configured URLs turned into typed, immutable entries.

use reqwest::Url;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::SourceError;
use crate::sources::auth::{AuthBinding, AuthResolver, AuthRule};
use crate::sources::detect::{
    detect_source_type, DetectionRule, SourceType, DEFAULT_DETECTION_TABLE,
};

/// One configured documentation source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceEntry {
    pub url: String,
    pub source_type: SourceType,
    pub display_name: String,
    #[serde(skip)]
    pub auth: Option<AuthBinding>,
}

impl SourceEntry {
    /// Parse one URL, detect its type and attach the first matching auth binding.
    pub fn parse(
        raw: &str,
        auth: &AuthResolver,
        table: &[DetectionRule],
    ) -> Result<Self, SourceError> {
        let trimmed = raw.trim();
        let url = Url::parse(trimmed).map_err(|e| SourceError::InvalidUrl {
            url: trimmed.to_string(),
            reason: e.to_string(),
        })?;
        if url.host_str().is_none() {
            return Err(SourceError::MissingHost(trimmed.to_string()));
        }

        Ok(Self {
            url: trimmed.to_string(),
            source_type: detect_source_type(&url, table),
            display_name: display_name_for(&url),
            auth: auth.resolve(trimmed),
        })
    }

    /// Request headers derived from the attached auth binding.
    pub fn auth_headers(&self) -> Vec<(String, String)> {
        self.auth.as_ref().map(|a| a.headers()).unwrap_or_default()
    }
}

/// `host` without `www.`, plus the last non-empty path segment when present.
fn display_name_for(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host);
    let last = url
        .path_segments()
        .and_then(|mut segs| segs.rfind(|s| !s.is_empty()))
        .map(|s| s.to_string());
    match last {
        Some(seg) => format!("{host} ({seg})"),
        None => host.to_string(),
    }
}

/// Owns every entry for the lifetime of the engine.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    entries: Vec<SourceEntry>,
    rejected: Vec<SourceError>,
}

impl SourceRegistry {
    pub fn new(urls: &[String], auth_rules: &[AuthRule]) -> Self {
        Self::with_detection_table(urls, auth_rules, DEFAULT_DETECTION_TABLE)
    }

    /// Build with a custom detection order. A bad URL is reported and skipped;
    /// the remaining URLs are still registered.
    pub fn with_detection_table(
        urls: &[String],
        auth_rules: &[AuthRule],
        table: &[DetectionRule],
    ) -> Self {
        let resolver = AuthResolver::new(auth_rules);
        let mut entries = Vec::with_capacity(urls.len());
        let mut rejected = Vec::new();

        for raw in urls {
            match SourceEntry::parse(raw, &resolver, table) {
                Ok(entry) => {
                    info!(
                        target: "sources",
                        url = %entry.url,
                        source_type = %entry.source_type,
                        auth = entry.auth.as_ref().map(|a| a.kind()).unwrap_or("none"),
                        "registered source"
                    );
                    entries.push(entry);
                }
                Err(e) => {
                    warn!(target: "sources", error = %e, "skipping source");
                    rejected.push(e);
                }
            }
        }

        Self { entries, rejected }
    }

    pub fn entries(&self) -> &[SourceEntry] {
        &self.entries
    }

    /// URLs that failed to parse during construction.
    pub fn rejected(&self) -> &[SourceError] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url_does_not_abort_registry() {
        let urls = vec![
            "not a url".to_string(),
            "https://example.com/docs/readme.md".to_string(),
            "https://en.wikipedia.org/wiki/Nix".to_string(),
        ];
        let reg = SourceRegistry::new(&urls, &[]);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.rejected().len(), 1);
        assert_eq!(reg.entries()[0].source_type, SourceType::Markdown);
        assert_eq!(reg.entries()[1].source_type, SourceType::MediaWiki);
    }

    #[test]
    fn auth_is_attached_at_parse_time() {
        let rules: Vec<AuthRule> = serde_json::from_str(
            r#"[{"urlPattern": "private", "type": "token", "token": "t"}]"#,
        )
        .unwrap();
        let urls = vec![
            "https://private.example.com/docs/a.md".to_string(),
            "https://public.example.com/docs/a.md".to_string(),
        ];
        let reg = SourceRegistry::new(&urls, &rules);
        assert!(reg.entries()[0].auth.is_some());
        assert!(reg.entries()[1].auth.is_none());
        assert_eq!(
            reg.entries()[0].auth_headers(),
            vec![("Authorization".to_string(), "Bearer t".to_string())]
        );
    }

    #[test]
    fn display_name_uses_host_and_last_segment() {
        let reg = SourceRegistry::new(
            &[
                "https://www.example.com/docs/readme.md".to_string(),
                "https://example.org/".to_string(),
            ],
            &[],
        );
        assert_eq!(reg.entries()[0].display_name, "example.com (readme.md)");
        assert_eq!(reg.entries()[1].display_name, "example.org");
    }
}
