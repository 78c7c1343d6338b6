// src/relevance.rs
//! Relevance primitives: keyword extraction, the relevance predicate, and
//! best-section / code-block extraction for a document given a query.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Fraction of query keywords that must appear for a keyword match.
pub const KEYWORD_OVERLAP_RATIO: f64 = 0.5;
/// Maximum number of code blocks returned by [`extract_section`].
pub const MAX_CODE_BLOCKS: usize = 3;
/// Length of the leading excerpt when nothing in the document matches.
pub const LEAD_EXCERPT_CHARS: usize = 500;

const QUERY_WINDOW_BEFORE: usize = 150;
const QUERY_WINDOW_AFTER: usize = 350;
const KEYWORD_WINDOW_BEFORE: usize = 100;
const KEYWORD_WINDOW_AFTER: usize = 400;

pub const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "him", "his", "how", "its", "may", "new", "now", "old", "see",
    "two", "way", "who", "did", "get", "got", "let", "say", "she", "too", "use", "with", "this",
    "that", "from", "they", "what", "when", "where", "which", "will", "would", "there", "their",
    "about", "into", "than", "then", "them", "these", "those", "some", "such", "your", "been",
    "have", "were", "does", "just", "also", "over", "only", "very", "should", "could", "other",
    "more", "most", "here", "why", "each", "both", "being", "between", "after", "before",
];

static RE_NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?u)[^\w\s]").expect("non-word regex"));
static RE_FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```([\w+#.-]*)[^\n]*\n(.*?)```").expect("fenced regex"));
static RE_PRE_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<pre[^>]*>\s*<code(?:\s+class="(?:language-)?([\w+#.-]+)[^"]*")?[^>]*>(.*?)</code>\s*</pre>"#)
        .expect("pre/code regex")
});
static RE_SYNTAXHIGHLIGHT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<syntaxhighlight(?:\s+lang="([^"]*)")?[^>]*>(.*?)</syntaxhighlight>"#)
        .expect("syntaxhighlight regex")
});

/// A code block pulled out of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
}

impl CodeBlock {
    /// Markdown fenced form.
    pub fn fenced(&self) -> String {
        format!("```{}\n{}\n```", self.language, self.code)
    }
}

/// Lowercase, drop punctuation, split on whitespace, remove short tokens and
/// stop words. Order of first appearance is kept; duplicates are removed.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = RE_NON_WORD.replace_all(&lowered, "");
    let mut out: Vec<String> = Vec::new();
    for tok in cleaned.split_whitespace() {
        if tok.chars().count() <= 2 || STOP_WORDS.contains(&tok) {
            continue;
        }
        if !out.iter().any(|k| k == tok) {
            out.push(tok.to_string());
        }
    }
    out
}

/// Keywords needed for a keyword-overlap match: `max(1, ceil(n * 0.5))`.
pub fn required_keyword_hits(keyword_count: usize) -> usize {
    ((keyword_count as f64 * KEYWORD_OVERLAP_RATIO).ceil() as usize).max(1)
}

/// True if the whole query appears verbatim (case-insensitive), or if enough
/// distinct keywords occur somewhere in the content.
pub fn is_relevant(content: &str, query: &str, keywords: &[String]) -> bool {
    let haystack = content.to_lowercase();
    let needle = query.to_lowercase();
    if !needle.is_empty() && haystack.contains(&needle) {
        return true;
    }

    let mut seen: Vec<&str> = Vec::new();
    for k in keywords {
        let k = k.as_str();
        if !seen.contains(&k) && haystack.contains(&k.to_lowercase()) {
            seen.push(k);
        }
    }
    seen.len() >= required_keyword_hits(keywords.len())
}

/// Every code block in `content`: Markdown fences, HTML `<pre><code>`, and
/// MediaWiki `<syntaxhighlight>`.
pub fn extract_code_blocks(content: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();

    for caps in RE_FENCED.captures_iter(content) {
        blocks.push(CodeBlock {
            language: caps.get(1).map(|m| m.as_str()).unwrap_or_default().to_string(),
            code: caps
                .get(2)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .trim_end_matches(|c: char| c == '\n' || c == '\r')
                .to_string(),
        });
    }

    for re in [&*RE_PRE_CODE, &*RE_SYNTAXHIGHLIGHT] {
        for caps in re.captures_iter(content) {
            let raw = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            blocks.push(CodeBlock {
                language: caps.get(1).map(|m| m.as_str()).unwrap_or_default().to_string(),
                code: html_escape::decode_html_entities(raw)
                    .trim_matches(|c: char| c == '\n' || c == '\r')
                    .to_string(),
            });
        }
    }

    blocks
}

/// Pick the part of `content` most worth returning for this query:
/// matching code blocks, then a window around the query, then around the
/// first keyword found, then the document head.
pub fn extract_section(content: &str, query: &str, keywords: &[String]) -> String {
    let query_words: Vec<String> = query
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .map(str::to_string)
        .collect();

    let matching: Vec<String> = extract_code_blocks(content)
        .into_iter()
        .filter(|b| {
            let code = b.code.to_lowercase();
            keywords.iter().any(|k| code.contains(&k.to_lowercase()))
                || query_words.iter().any(|w| code.contains(w.as_str()))
        })
        .take(MAX_CODE_BLOCKS)
        .map(|b| b.fenced())
        .collect();
    if !matching.is_empty() {
        return matching.join("\n\n");
    }

    let lowered = fold_case(content);
    let query_lower = fold_case(query);
    if !query_lower.is_empty() {
        if let Some(pos) = char_position(&lowered, &query_lower) {
            let len = query_lower.chars().count();
            return char_window(
                content,
                pos.saturating_sub(QUERY_WINDOW_BEFORE),
                pos + len + QUERY_WINDOW_AFTER,
            );
        }
    }

    for k in keywords {
        let k = fold_case(k);
        if let Some(pos) = char_position(&lowered, &k) {
            let len = k.chars().count();
            return char_window(
                content,
                pos.saturating_sub(KEYWORD_WINDOW_BEFORE),
                pos + len + KEYWORD_WINDOW_AFTER,
            );
        }
    }

    let head: String = content.chars().take(LEAD_EXCERPT_CHARS).collect();
    format!("{head}...")
}

// Lowercase one char for one char, so char offsets in the result line up
// with the original text (`İ` lowercases to two chars with `to_lowercase`).
fn fold_case(s: &str) -> String {
    s.chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect()
}

/// Character (not byte) offset of the first occurrence of `needle`.
fn char_position(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .find(needle)
        .map(|byte_idx| haystack[..byte_idx].chars().count())
}

/// Characters `[start, end)` of `s`, clamped to its bounds.
fn char_window(s: &str, start: usize, end: usize) -> String {
    s.chars().skip(start).take(end.saturating_sub(start)).collect()
}

// Short, stable id for a query so logs never carry raw text.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
