// src/fetch/strategies.rs
//! One fetch strategy per source type, looked up through a type → strategy table.

use async_trait::async_trait;
use pulldown_cmark::{html, Options, Parser};
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use url::form_urlencoded;

use crate::error::FetchError;
use crate::fetch::html::{extract_text, looks_like_html};
use crate::fetch::transport::{HttpBody, HttpTransport};
use crate::sources::{SourceEntry, SourceType};

pub const MEDIAWIKI_DEFAULT_PAGE: &str = "Main_Page";

#[async_trait]
pub trait ContentStrategy: Send + Sync {
    async fn fetch(
        &self,
        entry: &SourceEntry,
        transport: &dyn HttpTransport,
    ) -> Result<String, FetchError>;
    fn name(&self) -> &'static str;
}

pub type StrategyTable = HashMap<SourceType, Arc<dyn ContentStrategy>>;

/// Markdown → HTML with the usual GitHub extensions.
pub fn render_markdown(md: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES;
    let parser = Parser::new_ext(md, options);
    let mut out = String::with_capacity(md.len() + md.len() / 4);
    html::push_html(&mut out, parser);
    out
}

pub struct MarkdownStrategy;

#[async_trait]
impl ContentStrategy for MarkdownStrategy {
    async fn fetch(
        &self,
        entry: &SourceEntry,
        transport: &dyn HttpTransport,
    ) -> Result<String, FetchError> {
        let body = transport.get(&entry.url, &entry.auth_headers()).await?;
        Ok(match body {
            HttpBody::Text(s) => render_markdown(&s),
            HttpBody::Json(v) => match v.get("content").and_then(|c| c.as_str()) {
                Some(md) => render_markdown(md),
                None => HttpBody::Json(v).into_string(),
            },
        })
    }

    fn name(&self) -> &'static str {
        "markdown"
    }
}

/// `api.php` parse URL for a wiki page URL.
///
/// The page comes from `/wiki/<Title>` or a `title=` query parameter and
/// defaults to [`MEDIAWIKI_DEFAULT_PAGE`].
pub fn mediawiki_api_url(page_url: &str) -> Result<String, FetchError> {
    let url = Url::parse(page_url).map_err(|_| FetchError::InvalidUrl(page_url.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| FetchError::InvalidUrl(page_url.to_string()))?;
    let origin = match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    };

    let path = url.path();
    let api = if path.ends_with("/api.php") {
        format!("{origin}{path}")
    } else {
        format!("{origin}/w/api.php")
    };

    let page = path
        .split_once("/wiki/")
        .map(|(_, rest)| decode_path_title(rest.trim_end_matches('/')))
        .filter(|p| !p.is_empty())
        .or_else(|| {
            url.query_pairs()
                .find(|(k, _)| k == "title")
                .map(|(_, v)| v.into_owned())
        })
        .map(|p| p.replace(' ', "_"))
        .unwrap_or_else(|| MEDIAWIKI_DEFAULT_PAGE.to_string());

    let mut out = Url::parse(&api).map_err(|_| FetchError::InvalidUrl(api.clone()))?;
    out.query_pairs_mut()
        .append_pair("action", "parse")
        .append_pair("format", "json")
        .append_pair("prop", "text")
        .append_pair("page", &page);
    Ok(out.to_string())
}

// Path segments keep `+`, `&` and `=` literal; only `%XX` escapes are decoded.
fn decode_path_title(raw: &str) -> String {
    let escaped = raw
        .replace('+', "%2B")
        .replace('&', "%26")
        .replace('=', "%3D");
    form_urlencoded::parse(format!("page={escaped}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| raw.to_string())
}

/// `parse.text` from an api.php response (`{"*": html}` or a plain string).
pub fn mediawiki_parse_text(v: &serde_json::Value) -> Result<String, FetchError> {
    let text = v
        .get("parse")
        .and_then(|p| p.get("text"))
        .ok_or(FetchError::MissingField("parse.text"))?;
    text.get("*")
        .and_then(|t| t.as_str())
        .or_else(|| text.as_str())
        .map(str::to_string)
        .ok_or(FetchError::MissingField("parse.text"))
}

pub struct MediaWikiStrategy;

#[async_trait]
impl ContentStrategy for MediaWikiStrategy {
    async fn fetch(
        &self,
        entry: &SourceEntry,
        transport: &dyn HttpTransport,
    ) -> Result<String, FetchError> {
        let api = mediawiki_api_url(&entry.url)?;
        let value = match transport.get(&api, &entry.auth_headers()).await? {
            HttpBody::Json(v) => v,
            HttpBody::Text(s) => serde_json::from_str(&s)
                .map_err(|e| FetchError::UnexpectedBody(format!("api.php: {e}")))?,
        };
        mediawiki_parse_text(&value)
    }

    fn name(&self) -> &'static str {
        "mediawiki"
    }
}

/// Rendered page sites (GitBook, Confluence, SharePoint): GET + text extraction.
pub struct HtmlPageStrategy {
    label: &'static str,
}

impl HtmlPageStrategy {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

#[async_trait]
impl ContentStrategy for HtmlPageStrategy {
    async fn fetch(
        &self,
        entry: &SourceEntry,
        transport: &dyn HttpTransport,
    ) -> Result<String, FetchError> {
        let body = transport.get(&entry.url, &entry.auth_headers()).await?;
        Ok(extract_text(&body.into_string()))
    }

    fn name(&self) -> &'static str {
        self.label
    }
}

/// Anything else: HTML documents are reduced to text, other strings pass
/// through, JSON is stringified.
pub struct GenericStrategy;

#[async_trait]
impl ContentStrategy for GenericStrategy {
    async fn fetch(
        &self,
        entry: &SourceEntry,
        transport: &dyn HttpTransport,
    ) -> Result<String, FetchError> {
        let body = transport.get(&entry.url, &entry.auth_headers()).await?;
        Ok(match body {
            HttpBody::Text(s) if looks_like_html(&s) => extract_text(&s),
            other => other.into_string(),
        })
    }

    fn name(&self) -> &'static str {
        "generic"
    }
}

/// Built-in strategy for every source type.
pub fn default_strategies() -> StrategyTable {
    let mut t: StrategyTable = HashMap::new();
    t.insert(SourceType::Markdown, Arc::new(MarkdownStrategy));
    t.insert(SourceType::MediaWiki, Arc::new(MediaWikiStrategy));
    t.insert(SourceType::GitBook, Arc::new(HtmlPageStrategy::new("gitbook")));
    t.insert(SourceType::Confluence, Arc::new(HtmlPageStrategy::new("confluence")));
    t.insert(SourceType::SharePoint, Arc::new(HtmlPageStrategy::new("sharepoint")));
    t.insert(SourceType::Unknown, Arc::new(GenericStrategy));
    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::transport::FixtureTransport;
    use crate::sources::{AuthResolver, DEFAULT_DETECTION_TABLE};
    use serde_json::json;

    fn entry(url: &str) -> SourceEntry {
        SourceEntry::parse(url, &AuthResolver::default(), DEFAULT_DETECTION_TABLE).unwrap()
    }

    #[test]
    fn api_url_rewrites() {
        assert_eq!(
            mediawiki_api_url("https://en.wikipedia.org/wiki/Rust").unwrap(),
            "https://en.wikipedia.org/w/api.php?action=parse&format=json&prop=text&page=Rust"
        );
        assert_eq!(
            mediawiki_api_url("https://wiki.example.org/").unwrap(),
            "https://wiki.example.org/w/api.php?action=parse&format=json&prop=text&page=Main_Page"
        );
        assert_eq!(
            mediawiki_api_url("http://localhost:8080/mw/api.php").unwrap(),
            "http://localhost:8080/mw/api.php?action=parse&format=json&prop=text&page=Main_Page"
        );
        assert_eq!(
            mediawiki_api_url("https://wiki.example.org/index.php?title=Install%20Guide").unwrap(),
            "https://wiki.example.org/w/api.php?action=parse&format=json&prop=text&page=Install_Guide"
        );
    }

    #[test]
    fn api_url_keeps_reserved_characters_in_titles() {
        let api = mediawiki_api_url("https://wiki.example.org/index.php?title=Q%26A").unwrap();
        assert!(api.ends_with("&page=Q%26A"), "{api}");
        let page: Vec<String> = Url::parse(&api)
            .unwrap()
            .query_pairs()
            .filter(|(k, _)| k == "page")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(page, vec!["Q&A".to_string()]);

        let api = mediawiki_api_url("https://en.wikipedia.org/wiki/C%2B%2B").unwrap();
        assert!(api.ends_with("&page=C%2B%2B"), "{api}");
        let api = mediawiki_api_url("https://wiki.example.org/wiki/AT&T").unwrap();
        assert!(api.ends_with("&page=AT%26T"), "{api}");
    }

    #[test]
    fn parse_text_variants() {
        assert_eq!(
            mediawiki_parse_text(&json!({"parse": {"text": {"*": "<p>hi</p>"}}})).unwrap(),
            "<p>hi</p>"
        );
        assert_eq!(
            mediawiki_parse_text(&json!({"parse": {"text": "<p>v2</p>"}})).unwrap(),
            "<p>v2</p>"
        );
        assert!(matches!(
            mediawiki_parse_text(&json!({"error": {"code": "missingtitle"}})),
            Err(FetchError::MissingField("parse.text"))
        ));
    }

    #[tokio::test]
    async fn markdown_text_and_json_bodies() {
        let e = entry("https://example.com/docs/readme.md");
        let t = FixtureTransport::new().with_text(&e.url, "# Title\n\nSome *docs*.");
        let out = MarkdownStrategy.fetch(&e, &t).await.unwrap();
        assert!(out.contains("<h1>Title</h1>"));
        assert!(out.contains("<em>docs</em>"));

        t.set(&e.url, HttpBody::Json(json!({"content": "## Sub"})));
        assert!(MarkdownStrategy.fetch(&e, &t).await.unwrap().contains("<h2>Sub</h2>"));

        t.set(&e.url, HttpBody::Json(json!({"other": 1})));
        assert_eq!(MarkdownStrategy.fetch(&e, &t).await.unwrap(), r#"{"other":1}"#);
    }

    #[tokio::test]
    async fn mediawiki_fetches_api_and_errors_without_parse_text() {
        let e = entry("https://wiki.nixos.org/wiki/Flakes");
        let api = mediawiki_api_url(&e.url).unwrap();
        let body = json!({"parse": {"title": "Flakes", "text": {"*": "<p>nix flake</p>"}}});
        let t = FixtureTransport::new().with_json(&api, body);
        assert_eq!(MediaWikiStrategy.fetch(&e, &t).await.unwrap(), "<p>nix flake</p>");

        t.set(&api, HttpBody::Text(r#"{"parse": {}}"#.into()));
        assert!(matches!(
            MediaWikiStrategy.fetch(&e, &t).await,
            Err(FetchError::MissingField(_))
        ));
    }

    #[tokio::test]
    async fn generic_handles_html_text_and_json() {
        let e = entry("https://example.com/about");
        let t = FixtureTransport::new().with_text(&e.url, "<html><nav>x</nav><p>Hello</p></html>");
        assert_eq!(GenericStrategy.fetch(&e, &t).await.unwrap(), "Hello");

        t.set(&e.url, HttpBody::Text("plain <b>text</b>".into()));
        assert_eq!(GenericStrategy.fetch(&e, &t).await.unwrap(), "plain <b>text</b>");

        t.set(&e.url, HttpBody::Json(json!([1, 2])));
        assert_eq!(GenericStrategy.fetch(&e, &t).await.unwrap(), "[1,2]");
    }

    #[test]
    fn every_type_has_a_strategy() {
        let t = default_strategies();
        for st in [
            SourceType::Markdown,
            SourceType::MediaWiki,
            SourceType::GitBook,
            SourceType::Confluence,
            SourceType::SharePoint,
            SourceType::Unknown,
        ] {
            assert!(t.contains_key(&st), "missing strategy for {st}");
        }
        assert_eq!(t[&SourceType::Confluence].name(), "confluence");
    }
}
