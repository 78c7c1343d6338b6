// src/fetch/html.rs
//! HTML → plain text for page-style sources.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["script", "style", "header", "footer", "nav", "aside"]
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).expect("block regex")
        })
        .collect()
});
static RE_COMMENTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment regex"));
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));
static RE_HTML_DOC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<!doctype\s+html|<html[\s>]").expect("html doc regex"));

/// Drop page chrome (`script`, `style`, `header`, `footer`, `nav`, `aside`)
/// and comments, strip remaining tags, decode entities, collapse whitespace.
pub fn extract_text(html: &str) -> String {
    let mut out = RE_COMMENTS.replace_all(html, " ").into_owned();
    for re in RE_BLOCKS.iter() {
        out = re.replace_all(&out, " ").into_owned();
    }
    out = RE_TAGS.replace_all(&out, " ").into_owned();
    out = html_escape::decode_html_entities(&out).into_owned();
    RE_WS.replace_all(&out, " ").trim().to_string()
}

/// True for bodies that look like a full HTML document.
pub fn looks_like_html(body: &str) -> bool {
    RE_HTML_DOC.is_match(body)
}
