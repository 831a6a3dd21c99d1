//! Header hygiene for the proxy hop.
//!
//! Hop-by-hop and identity headers must not cross the proxy in either
//! direction: forwarding them would smuggle connection semantics across the
//! hop, leak proxy-local credentials, or double-apply transfer encodings.

use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

/// Request-side headers removed before forwarding upstream.
const REQUEST_STRIP_LIST: &[&str] = &[
    "host",
    "connection",
    "upgrade",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
];

/// Response-side headers removed before relaying downstream.
/// `content-encoding`/`content-length` go because the relayed body is the
/// decoded, re-framed one.
const RESPONSE_STRIP_LIST: &[&str] = &[
    "content-encoding",
    "content-length",
    "transfer-encoding",
    "connection",
    "upgrade",
    "proxy-authenticate",
    "proxy-authorization",
];

pub static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Build the outbound header set for an upstream request: the incoming
/// headers minus the strip list, the target's injected headers overlaid
/// (winning on collision), and `X-Forwarded-For` extended with the client.
pub fn build_outbound_headers(
    incoming: &HeaderMap,
    injected: &[(String, String)],
    client_ip: &str,
) -> HeaderMap {
    let mut outbound = HeaderMap::with_capacity(incoming.len() + injected.len() + 1);

    for (name, value) in incoming {
        if !is_stripped(name.as_str(), REQUEST_STRIP_LIST) {
            outbound.append(name.clone(), value.clone());
        }
    }

    for (name, value) in injected {
        match (
            name.parse::<HeaderName>(),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                outbound.insert(name, value);
            }
            _ => {
                debug!("skipping injected header '{}' with invalid name or value", name);
            }
        }
    }

    let forwarded_for = match outbound.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {client_ip}"),
        None => client_ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        outbound.insert(X_FORWARDED_FOR.clone(), value);
    }

    outbound
}

/// Copy upstream response headers minus the response-side strip list.
pub fn filter_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if !is_stripped(name.as_str(), RESPONSE_STRIP_LIST) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}

fn is_stripped(name: &str, strip_list: &[&str]) -> bool {
    strip_list.iter().any(|s| name.eq_ignore_ascii_case(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_map(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                name.parse::<HeaderName>().unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn strips_hop_by_hop_request_headers_regardless_of_casing() {
        // HeaderMap lowercases on parse, but mixed-case input must still
        // land on the strip list.
        let incoming = header_map(&[
            ("Host", "mock.internal"),
            ("Connection", "keep-alive"),
            ("Transfer-Encoding", "chunked"),
            ("Proxy-Authorization", "Basic xyz"),
            ("TE", "trailers"),
            ("Accept", "application/json"),
        ]);
        let outbound = build_outbound_headers(&incoming, &[], "203.0.113.9");

        for name in REQUEST_STRIP_LIST {
            assert!(!outbound.contains_key(*name), "{name} should be stripped");
        }
        assert_eq!(outbound.get("accept").unwrap(), "application/json");
    }

    #[test]
    fn injected_headers_win_on_collision() {
        let incoming = header_map(&[("x-api-key", "client-key"), ("accept", "*/*")]);
        let injected = vec![("X-Api-Key".to_string(), "proxy-key".to_string())];
        let outbound = build_outbound_headers(&incoming, &injected, "203.0.113.9");

        assert_eq!(outbound.get("x-api-key").unwrap(), "proxy-key");
        assert_eq!(outbound.get("accept").unwrap(), "*/*");
    }

    #[test]
    fn invalid_injected_headers_are_skipped() {
        let incoming = HeaderMap::new();
        let injected = vec![
            ("bad name with spaces".to_string(), "v".to_string()),
            ("x-ok".to_string(), "fine".to_string()),
        ];
        let outbound = build_outbound_headers(&incoming, &injected, "203.0.113.9");
        assert_eq!(outbound.get("x-ok").unwrap(), "fine");
        assert_eq!(outbound.len(), 2); // x-ok + x-forwarded-for
    }

    #[test]
    fn forwarded_for_is_set_and_extended() {
        let fresh = build_outbound_headers(&HeaderMap::new(), &[], "198.51.100.4");
        assert_eq!(fresh.get("x-forwarded-for").unwrap(), "198.51.100.4");

        let incoming = header_map(&[("x-forwarded-for", "203.0.113.9")]);
        let chained = build_outbound_headers(&incoming, &[], "198.51.100.4");
        assert_eq!(
            chained.get("x-forwarded-for").unwrap(),
            "203.0.113.9, 198.51.100.4"
        );
    }

    #[test]
    fn response_strip_list_removes_framing_and_proxy_headers() {
        let upstream = header_map(&[
            ("content-encoding", "gzip"),
            ("content-length", "1234"),
            ("transfer-encoding", "chunked"),
            ("connection", "close"),
            ("proxy-authenticate", "Basic"),
            ("content-type", "application/json"),
            ("etag", "\"abc\""),
        ]);
        let filtered = filter_response_headers(&upstream);

        for name in RESPONSE_STRIP_LIST {
            assert!(!filtered.contains_key(*name), "{name} should be stripped");
        }
        assert_eq!(filtered.get("content-type").unwrap(), "application/json");
        assert_eq!(filtered.get("etag").unwrap(), "\"abc\"");
    }

    #[test]
    fn repeated_headers_survive_copying() {
        let upstream = header_map(&[("set-cookie", "a=1"), ("set-cookie", "b=2")]);
        let filtered = filter_response_headers(&upstream);
        let cookies: Vec<_> = filtered.get_all("set-cookie").iter().collect();
        assert_eq!(cookies.len(), 2);
    }
}
