//! Source-type detection as an ordered priority table.
//!
//! Markers overlap (a GitBook site can live under `/docs/`, a Confluence
//! space under a `wiki` path), so the table is evaluated top to bottom and
//! the first predicate that holds decides the type.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wiki/documentation flavour, fixed once at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Markdown,
    MediaWiki,
    GitBook,
    Confluence,
    SharePoint,
    Unknown,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Markdown => "markdown",
            SourceType::MediaWiki => "mediawiki",
            SourceType::GitBook => "gitbook",
            SourceType::Confluence => "confluence",
            SourceType::SharePoint => "sharepoint",
            SourceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type DetectFn = fn(&Url) -> bool;

/// One row of the detection table.
#[derive(Clone, Copy)]
pub struct DetectionRule {
    pub source_type: SourceType,
    pub name: &'static str,
    pub matches: DetectFn,
}

impl fmt::Debug for DetectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectionRule")
            .field("source_type", &self.source_type)
            .field("name", &self.name)
            .finish()
    }
}

fn host(url: &Url) -> String {
    url.host_str().unwrap_or_default().to_ascii_lowercase()
}

fn path(url: &Url) -> String {
    url.path().to_ascii_lowercase()
}

fn is_gitbook(url: &Url) -> bool {
    host(url).contains("gitbook")
}

fn is_mediawiki(url: &Url) -> bool {
    let h = host(url);
    let p = path(url);
    h.contains("wikipedia.org")
        || h.contains("mediawiki")
        || h.starts_with("wiki.")
        || p.ends_with("/api.php")
        || p.ends_with("/index.php")
        || p.starts_with("/w/")
}

fn is_confluence(url: &Url) -> bool {
    let h = host(url);
    h.contains("atlassian.net") || h.contains("confluence") || path(url).contains("/confluence/")
}

fn is_sharepoint(url: &Url) -> bool {
    host(url).contains("sharepoint")
}

fn is_markdown(url: &Url) -> bool {
    let p = path(url);
    p.ends_with(".md")
        || p.ends_with(".markdown")
        || p.contains("/docs/")
        || host(url).starts_with("docs.")
}

/// Built-in detection order.
pub const DEFAULT_DETECTION_TABLE: &[DetectionRule] = &[
    DetectionRule {
        source_type: SourceType::GitBook,
        name: "gitbook-host",
        matches: is_gitbook,
    },
    DetectionRule {
        source_type: SourceType::MediaWiki,
        name: "mediawiki-host-or-path",
        matches: is_mediawiki,
    },
    DetectionRule {
        source_type: SourceType::Confluence,
        name: "confluence-host-or-path",
        matches: is_confluence,
    },
    DetectionRule {
        source_type: SourceType::SharePoint,
        name: "sharepoint-host",
        matches: is_sharepoint,
    },
    DetectionRule {
        source_type: SourceType::Markdown,
        name: "markdown-ext-docs-path-or-subdomain",
        matches: is_markdown,
    },
];

/// First matching type in `table`, or [`SourceType::Unknown`].
pub fn detect_source_type(url: &Url, table: &[DetectionRule]) -> SourceType {
    table
        .iter()
        .find(|rule| (rule.matches)(url))
        .map(|rule| rule.source_type)
        .unwrap_or(SourceType::Unknown)
}
