//! Proxy target URL policy.
//!
//! A pure predicate over the URL string: scheme must be http(s), the host
//! must not name the local machine or a private network, and an explicit
//! port must not hit a sensitive non-web service. Checks are purely
//! textual; no DNS resolution happens here, so a hostname that *resolves*
//! to a private address still passes. This is a defense-in-depth filter,
//! not a substitute for a network-level egress policy.

use hyper::Uri;

/// Hosts that always name the local machine.
const LITERAL_LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0", "::1"];

/// Returns true only when `url` is safe to dial under the policy.
/// Any parse failure is a rejection.
pub fn is_valid_proxy_url(url: &str, blocked_ports: &[u16]) -> bool {
    let uri: Uri = match url.parse() {
        Ok(uri) => uri,
        Err(_) => return false,
    };

    match uri.scheme_str() {
        Some(scheme) if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") => {}
        _ => return false,
    }

    let host = match uri.host() {
        Some(host) if !host.is_empty() => host,
        _ => return false,
    };
    // IPv6 literals may arrive bracketed.
    let host = host.trim_start_matches('[').trim_end_matches(']');

    if LITERAL_LOCAL_HOSTS
        .iter()
        .any(|local| host.eq_ignore_ascii_case(local))
    {
        return false;
    }

    if is_private_ipv4_prefix(host) || is_unique_local_ipv6_prefix(host) {
        return false;
    }

    if let Some(port) = uri.port_u16() {
        if blocked_ports.contains(&port) {
            return false;
        }
    }

    true
}

/// Dotted-decimal prefix check for the RFC 1918 and link-local ranges.
fn is_private_ipv4_prefix(host: &str) -> bool {
    if host.starts_with("10.") || host.starts_with("192.168.") || host.starts_with("169.254.") {
        return true;
    }
    // 172.16.0.0/12: second octet in [16, 31].
    if let Some(rest) = host.strip_prefix("172.") {
        if let Some(second) = rest.split('.').next() {
            if let Ok(octet) = second.parse::<u8>() {
                return (16..=31).contains(&octet);
            }
        }
    }
    false
}

/// fc00::/7 unique-local prefix check on the textual literal.
fn is_unique_local_ipv6_prefix(host: &str) -> bool {
    let lower = host.to_ascii_lowercase();
    lower.starts_with("fc00:") || lower.starts_with("fd00:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BLOCKED_PROXY_PORTS;

    fn valid(url: &str) -> bool {
        is_valid_proxy_url(url, DEFAULT_BLOCKED_PROXY_PORTS)
    }

    #[test]
    fn accepts_ordinary_web_urls() {
        assert!(valid("https://httpbin.org/get"));
        assert!(valid("http://example.com/path?q=1"));
        assert!(valid("https://api.example.com:8443/v1"));
        assert!(valid("http://example.com:80/"));
        assert!(valid("https://example.com:443/"));
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(!valid("ftp://example.com/file"));
        assert!(!valid("file:///etc/passwd"));
        assert!(!valid("gopher://example.com/"));
    }

    #[test]
    fn rejects_unparseable_urls() {
        assert!(!valid(""));
        assert!(!valid("not a url"));
        assert!(!valid("http://"));
        // Relative reference: no scheme, no host.
        assert!(!valid("/just/a/path"));
    }

    #[test]
    fn rejects_local_hosts() {
        assert!(!valid("http://localhost/x"));
        assert!(!valid("http://LOCALHOST:8080/x"));
        assert!(!valid("http://127.0.0.1:9000/x"));
        assert!(!valid("http://0.0.0.0/x"));
        assert!(!valid("http://[::1]:8080/x"));
    }

    #[test]
    fn rejects_private_ipv4_ranges() {
        assert!(!valid("http://10.0.0.1/x"));
        assert!(!valid("http://10.255.12.1:8080/x"));
        assert!(!valid("http://192.168.1.1/x"));
        assert!(!valid("http://169.254.169.254/latest/meta-data"));
        assert!(!valid("http://172.16.0.1/x"));
        assert!(!valid("http://172.31.255.255/x"));
    }

    #[test]
    fn accepts_public_172_addresses() {
        // Only 172.16-31 is private; the rest of 172/8 is routable.
        assert!(valid("http://172.15.0.1/x"));
        assert!(valid("http://172.32.0.1/x"));
        assert!(valid("http://172.200.1.1/x"));
    }

    #[test]
    fn rejects_unique_local_ipv6() {
        assert!(!valid("http://[fc00::1]/x"));
        assert!(!valid("http://[fd00:1234::1]:8080/x"));
        assert!(!valid("http://[FD00::2]/x"));
    }

    #[test]
    fn rejects_blocked_ports() {
        assert!(!valid("http://example.com:22/"));
        assert!(!valid("http://example.com:25/"));
        assert!(!valid("https://example.com:445/"));
        assert!(!valid("http://example.com:995/"));
    }

    #[test]
    fn blocked_port_list_is_operator_overridable() {
        // An empty override allows everything portwise.
        assert!(is_valid_proxy_url("http://example.com:22/", &[]));
        // A custom list applies instead of the default.
        assert!(!is_valid_proxy_url("http://example.com:8080/", &[8080]));
        assert!(is_valid_proxy_url("http://example.com:25/", &[8080]));
    }

    #[test]
    fn hostnames_resembling_private_prefixes_are_rejected_textually() {
        // Textual prefix match; the check never resolves names.
        assert!(!valid("http://10.evil.example.com/x"));
    }
}
