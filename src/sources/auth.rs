//! Authentication rules: match a source URL against configured patterns and
//! produce request credentials.
//!
//! Rules are tried in configured order; the first pattern that matches wins.
//! A pattern that fails to compile is logged once and never matches.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Credentials attached to a source entry. Each kind carries only its own fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthBinding {
    Basic {
        username: String,
        password: String,
    },
    Token {
        token: String,
    },
    Custom {
        #[serde(rename = "headerName")]
        header_name: String,
        #[serde(rename = "headerValue")]
        header_value: String,
    },
    /// Accepted in configuration; no token exchange is performed, so no header is sent.
    #[serde(rename = "oauth")]
    OAuth {
        #[serde(rename = "clientId")]
        client_id: String,
        #[serde(rename = "clientSecret")]
        client_secret: String,
        #[serde(rename = "tokenUrl")]
        token_url: String,
    },
}

impl AuthBinding {
    /// Request headers for this binding as `(name, value)` pairs.
    pub fn headers(&self) -> Vec<(String, String)> {
        match self {
            AuthBinding::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{username}:{password}"));
                vec![("Authorization".to_string(), format!("Basic {encoded}"))]
            }
            AuthBinding::Token { token } => {
                vec![("Authorization".to_string(), format!("Bearer {token}"))]
            }
            AuthBinding::Custom {
                header_name,
                header_value,
            } => vec![(header_name.clone(), header_value.clone())],
            AuthBinding::OAuth { .. } => Vec::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AuthBinding::Basic { .. } => "basic",
            AuthBinding::Token { .. } => "token",
            AuthBinding::Custom { .. } => "custom",
            AuthBinding::OAuth { .. } => "oauth",
        }
    }
}

/// One configured rule: `{ "urlPattern": "...", "type": "...", ...fields }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRule {
    #[serde(rename = "urlPattern")]
    pub url_pattern: String,
    #[serde(flatten)]
    pub binding: AuthBinding,
}

#[derive(Debug)]
struct CompiledRule {
    re: Option<Regex>,
    binding: AuthBinding,
}

/// Ordered, pre-compiled rule list. Pure after construction.
#[derive(Debug, Default)]
pub struct AuthResolver {
    rules: Vec<CompiledRule>,
}

impl AuthResolver {
    pub fn new(rules: &[AuthRule]) -> Self {
        let rules = rules
            .iter()
            .map(|r| {
                let re = match Regex::new(&r.url_pattern) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!(
                            target: "auth",
                            pattern = %r.url_pattern,
                            error = %e,
                            "invalid auth urlPattern; rule will never match"
                        );
                        None
                    }
                };
                CompiledRule {
                    re,
                    binding: r.binding.clone(),
                }
            })
            .collect();
        Self { rules }
    }

    /// First binding whose pattern matches `url`, if any.
    pub fn resolve(&self, url: &str) -> Option<AuthBinding> {
        self.rules
            .iter()
            .find(|r| r.re.as_ref().is_some_and(|re| re.is_match(url)))
            .map(|r| r.binding.clone())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules_from_json(s: &str) -> Vec<AuthRule> {
        serde_json::from_str(s).expect("rules json")
    }

    #[test]
    fn basic_rule_produces_base64_header() {
        let rules = rules_from_json(
            r#"[{"urlPattern": "^https://private\\.", "type": "basic", "username": "u", "password": "p"}]"#,
        );
        let resolver = AuthResolver::new(&rules);
        let binding = resolver
            .resolve("https://private.example.com/x")
            .expect("rule should match");
        assert_eq!(
            binding.headers(),
            vec![("Authorization".to_string(), "Basic dTpw".to_string())]
        );
        assert!(resolver.resolve("https://public.example.com/x").is_none());
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = rules_from_json(
            r#"[
                {"urlPattern": "example\\.com", "type": "token", "token": "first"},
                {"urlPattern": "example", "type": "token", "token": "second"}
            ]"#,
        );
        let resolver = AuthResolver::new(&rules);
        assert_eq!(
            resolver.resolve("https://docs.example.com"),
            Some(AuthBinding::Token {
                token: "first".into()
            })
        );
        assert_eq!(
            resolver.resolve("https://example.org"),
            Some(AuthBinding::Token {
                token: "second".into()
            })
        );
    }

    #[test]
    fn invalid_regex_is_skipped_not_fatal() {
        let rules = rules_from_json(
            r#"[
                {"urlPattern": "([unclosed", "type": "token", "token": "bad"},
                {"urlPattern": ".*", "type": "custom", "headerName": "X-Api-Key", "headerValue": "k"}
            ]"#,
        );
        let resolver = AuthResolver::new(&rules);
        assert_eq!(resolver.len(), 2);
        let binding = resolver.resolve("https://anything").expect("second rule");
        assert_eq!(
            binding.headers(),
            vec![("X-Api-Key".to_string(), "k".to_string())]
        );
    }

    #[test]
    fn oauth_is_parsed_but_sends_no_header() {
        let rules = rules_from_json(
            r#"[{"urlPattern": ".", "type": "oauth", "clientId": "id", "clientSecret": "s", "tokenUrl": "https://t"}]"#,
        );
        let binding = AuthResolver::new(&rules).resolve("https://x").unwrap();
        assert_eq!(binding.kind(), "oauth");
        assert!(binding.headers().is_empty());
    }

    #[test]
    fn bearer_header_for_token() {
        let b = AuthBinding::Token { token: "abc".into() };
        assert_eq!(b.headers()[0].1, "Bearer abc");
    }
}
