//! In-memory rule model.
//!
//! A `Rule` binds a request pattern to exactly one action: answer with a
//! canned response, or forward to an upstream URL. The one-of invariant is
//! carried by the `RuleAction` enum so it cannot be violated after
//! construction; the loader rejects documents that declare both or neither.

use bytes::Bytes;
use std::fmt;

/// HTTP verbs recognized for dispatch.
///
/// Anything else parses as `Unrecognized` and never matches a request, so a
/// typo in a config file disables one rule instead of failing the load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Unrecognized(String),
}

impl Method {
    /// Canonicalize a verb string. Comparison is ASCII case-insensitive.
    pub fn parse(s: &str) -> Method {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "PATCH" => Method::Patch,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            other => Method::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Unrecognized(s) => s,
        }
    }

    /// Whether this verb participates in matching at all.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Method::Unrecognized(_))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The request side of a rule.
///
/// `path` is compared byte-for-byte; header names case-insensitively with
/// case-sensitive values; `body`, when present, must equal the request body
/// exactly. Absent `body` accepts any body.
#[derive(Debug, Clone)]
pub struct RequestPattern {
    pub path: String,
    pub method: Method,
    /// Header constraints in document order.
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

/// A canned response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// An upstream forwarding target.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    pub url: String,
    /// Replaces the incoming verb on the outbound request when present.
    pub method_override: Option<Method>,
    /// Extra headers injected on the outbound request; win on collision.
    pub headers: Vec<(String, String)>,
    pub timeout_ms: u64,
}

pub const DEFAULT_PROXY_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MOCK_STATUS: u16 = 200;

/// What a matched rule does with the request.
#[derive(Debug, Clone)]
pub enum RuleAction {
    Mock(MockResponse),
    Proxy(ProxyTarget),
}

/// One declarative binding from a request pattern to an action.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Optional informational name, surfaced in logs on match.
    pub name: Option<String>,
    pub pattern: RequestPattern,
    pub action: RuleAction,
}

impl Rule {
    pub fn is_mock(&self) -> bool {
        matches!(self.action, RuleAction::Mock(_))
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.action, RuleAction::Proxy(_))
    }

    /// Name for log lines: the configured name or the rule's position.
    pub fn display_name(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{index}"),
        }
    }
}

/// An ordered, immutable rule list. Order is load order; the matcher walks
/// it front to back.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        RuleSet { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn mock_count(&self) -> usize {
        self.rules.iter().filter(|r| r.is_mock()).count()
    }

    pub fn proxy_count(&self) -> usize {
        self.rules.iter().filter(|r| r.is_proxy()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_rule(path: &str) -> Rule {
        Rule {
            name: None,
            pattern: RequestPattern {
                path: path.into(),
                method: Method::Get,
                headers: Vec::new(),
                body: None,
            },
            action: RuleAction::Mock(MockResponse {
                status: 200,
                headers: Vec::new(),
                body: Bytes::new(),
            }),
        }
    }

    #[test]
    fn method_parse_canonicalizes_case() {
        assert_eq!(Method::parse("get"), Method::Get);
        assert_eq!(Method::parse("Get"), Method::Get);
        assert_eq!(Method::parse("DELETE"), Method::Delete);
        assert_eq!(Method::parse("options"), Method::Options);
    }

    #[test]
    fn unknown_verb_parses_but_is_unrecognized() {
        let m = Method::parse("brew");
        assert_eq!(m, Method::Unrecognized("BREW".to_string()));
        assert!(!m.is_recognized());
        assert_eq!(m.as_str(), "BREW");
    }

    #[test]
    fn rule_counts_by_action() {
        let proxy = Rule {
            name: Some("fwd".into()),
            pattern: RequestPattern {
                path: "/b".into(),
                method: Method::Post,
                headers: Vec::new(),
                body: None,
            },
            action: RuleAction::Proxy(ProxyTarget {
                url: "https://example.com/x".into(),
                method_override: None,
                headers: Vec::new(),
                timeout_ms: DEFAULT_PROXY_TIMEOUT_MS,
            }),
        };
        let set = RuleSet::new(vec![mock_rule("/a"), proxy]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.mock_count(), 1);
        assert_eq!(set.proxy_count(), 1);
    }

    #[test]
    fn display_name_falls_back_to_index() {
        assert_eq!(mock_rule("/").display_name(3), "#3");
        let mut named = mock_rule("/");
        named.name = Some("health".into());
        assert_eq!(named.display_name(3), "health");
    }
}
