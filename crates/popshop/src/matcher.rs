//! Rule matching engine.
//!
//! A pure function of the request and one rule-set snapshot: the first rule
//! whose entire pattern holds wins. Matching is exact: method
//! (case-insensitive), path (byte-for-byte), required headers
//! (case-insensitive names, exact values), and an optional byte-equal body
//! constraint. Wildcard and regex paths are a documented extension point,
//! not implemented here.

use hyper::HeaderMap;

use crate::config::{Method, Rule, RuleSet};

/// The parts of an incoming request the matcher inspects.
pub struct IncomingRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub headers: &'a HeaderMap,
    pub body: &'a [u8],
}

/// Find the first matching rule, front to back.
pub fn find_match<'a>(
    rules: &'a RuleSet,
    request: &IncomingRequest<'_>,
) -> Option<(usize, &'a Rule)> {
    let method = Method::parse(request.method);
    rules
        .rules()
        .iter()
        .enumerate()
        .find(|(_, rule)| rule_matches(rule, &method, request))
}

fn rule_matches(rule: &Rule, method: &Method, request: &IncomingRequest<'_>) -> bool {
    // Unrecognized verbs parse but never dispatch.
    if !rule.pattern.method.is_recognized() {
        return false;
    }
    if rule.pattern.method != *method {
        return false;
    }
    if rule.pattern.path != request.path {
        return false;
    }

    // Every constrained header must be present with the exact value. Name
    // lookup through HeaderMap is case-insensitive; values are not.
    for (name, expected) in &rule.pattern.headers {
        let found = request
            .headers
            .get_all(name.as_str())
            .iter()
            .any(|value| value.as_bytes() == expected.as_bytes());
        if !found {
            return false;
        }
    }

    if let Some(expected_body) = &rule.pattern.body {
        if expected_body.as_ref() != request.body {
            return false;
        }
    }

    true
}
