//! Host allow-list guard.

use hyper::header::{HeaderMap, HOST};

use crate::error::Rejection;

/// When `allowed_hosts` is non-empty, the request's `Host` header must
/// exactly match one entry. An empty list allows everything.
pub fn check_host(headers: &HeaderMap, allowed_hosts: &[String]) -> Result<(), Rejection> {
    if allowed_hosts.is_empty() {
        return Ok(());
    }

    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .ok_or(Rejection::InvalidHost)?;

    if allowed_hosts.iter().any(|allowed| allowed == host) {
        Ok(())
    } else {
        Err(Rejection::InvalidHost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn with_host(host: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(HOST, HeaderValue::from_str(host).unwrap());
        map
    }

    #[test]
    fn empty_list_allows_any_host() {
        assert!(check_host(&with_host("anything.example"), &[]).is_ok());
        assert!(check_host(&HeaderMap::new(), &[]).is_ok());
    }

    #[test]
    fn exact_match_required() {
        let allowed = vec!["api.internal:8080".to_string()];
        assert!(check_host(&with_host("api.internal:8080"), &allowed).is_ok());
        // Port and case variants are distinct values.
        assert!(check_host(&with_host("api.internal"), &allowed).is_err());
        assert!(check_host(&with_host("API.internal:8080"), &allowed).is_err());
    }

    #[test]
    fn missing_host_is_rejected_when_list_configured() {
        let allowed = vec!["api.internal".to_string()];
        assert!(matches!(
            check_host(&HeaderMap::new(), &allowed),
            Err(Rejection::InvalidHost)
        ));
    }
}
