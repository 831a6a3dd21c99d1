//! Configuration types for PopShop.
//!
//! Two layers live here: `ServerSettings`, the operator-tunable knobs the
//! ingress stack consumes, and the rule configuration (model, loader,
//! watcher) in the submodules.

mod loader;
mod rules;
mod watcher;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use loader::{load_rules, parse_document};
pub use rules::{
    Method, MockResponse, ProxyTarget, RequestPattern, Rule, RuleAction, RuleSet,
    DEFAULT_MOCK_STATUS, DEFAULT_PROXY_TIMEOUT_MS,
};
pub use watcher::ConfigWatcher;

/// Ports the proxy refuses to dial by default: well-known non-web service
/// ports whose exposure through a forward proxy is a classic SSRF target.
/// Standard web ports 80/443 stay open.
pub const DEFAULT_BLOCKED_PROXY_PORTS: &[u16] =
    &[22, 23, 25, 53, 69, 110, 135, 139, 143, 445, 993, 995];

/// Operator-tunable server settings.
///
/// Every field has a default so a bare `ServerSettings::default()` yields a
/// working local server; the CLI overrides individual fields.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    /// Reject request bodies larger than this many bytes (413).
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
    /// Reject requests whose summed header lines exceed this many bytes (431).
    #[serde(default = "default_max_header_size")]
    pub max_header_size: usize,

    /// Fixed-window rate limit: requests per window per client.
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,
    #[serde(default = "default_rate_limit_window_seconds")]
    pub rate_limit_window_seconds: u64,

    /// When non-empty, the request Host header must equal one entry.
    #[serde(default)]
    pub allowed_hosts: Vec<String>,

    /// Deadline applied to the downstream handler (408 on expiry).
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Value for Access-Control-Allow-Origin.
    #[serde(default = "default_cors_allow_origin")]
    pub cors_allow_origin: String,

    /// Reload rules when the config path changes.
    #[serde(default)]
    pub watch: bool,

    /// Proxy port blocklist; see `DEFAULT_BLOCKED_PROXY_PORTS`.
    #[serde(default = "default_blocked_proxy_ports")]
    pub blocked_proxy_ports: Vec<u16>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_request_size() -> usize {
    1024 * 1024
}

fn default_max_header_size() -> usize {
    8 * 1024
}

fn default_rate_limit_requests() -> u32 {
    100
}

fn default_rate_limit_window_seconds() -> u64 {
    60
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_cors_allow_origin() -> String {
    "*".to_string()
}

fn default_blocked_proxy_ports() -> Vec<u16> {
    DEFAULT_BLOCKED_PROXY_PORTS.to_vec()
}

impl ServerSettings {
    /// Load settings from a YAML file. Missing fields keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(&path)?;
        let settings: ServerSettings = serde_yaml::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings consistency.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_request_size == 0 {
            anyhow::bail!("max_request_size must be positive");
        }
        if self.max_header_size == 0 {
            anyhow::bail!("max_header_size must be positive");
        }
        if self.rate_limit_requests == 0 {
            anyhow::bail!("rate_limit_requests must be positive");
        }
        if self.rate_limit_window_seconds == 0 {
            anyhow::bail!("rate_limit_window_seconds must be positive");
        }
        if self.request_timeout_seconds == 0 {
            anyhow::bail!("request_timeout_seconds must be positive");
        }
        if self.cors_allow_origin.is_empty() {
            anyhow::bail!("cors_allow_origin must not be empty");
        }
        Ok(())
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: default_host(),
            port: default_port(),
            max_request_size: default_max_request_size(),
            max_header_size: default_max_header_size(),
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_window_seconds: default_rate_limit_window_seconds(),
            allowed_hosts: Vec::new(),
            request_timeout_seconds: default_request_timeout_seconds(),
            cors_allow_origin: default_cors_allow_origin(),
            watch: false,
            blocked_proxy_ports: default_blocked_proxy_ports(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = ServerSettings::default();
        assert_eq!(settings.host, "127.0.0.1");
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.max_request_size, 1024 * 1024);
        assert_eq!(settings.max_header_size, 8 * 1024);
        assert_eq!(settings.rate_limit_requests, 100);
        assert_eq!(settings.rate_limit_window_seconds, 60);
        assert!(settings.allowed_hosts.is_empty());
        assert_eq!(settings.request_timeout_seconds, 30);
        assert_eq!(settings.cors_allow_origin, "*");
        assert!(!settings.watch);
        assert_eq!(settings.blocked_proxy_ports, DEFAULT_BLOCKED_PROXY_PORTS);
    }

    #[test]
    fn settings_deserialize_with_partial_document() {
        let yaml = r#"
port: 9090
allowed_hosts:
  - "api.internal:9090"
rate_limit_requests: 5
"#;
        let settings: ServerSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.port, 9090);
        assert_eq!(settings.allowed_hosts, vec!["api.internal:9090"]);
        assert_eq!(settings.rate_limit_requests, 5);
        // Untouched fields keep their defaults.
        assert_eq!(settings.max_request_size, 1024 * 1024);
        assert_eq!(settings.cors_allow_origin, "*");
    }

    #[test]
    fn validate_rejects_zeroed_limits() {
        let mut settings = ServerSettings::default();
        assert!(settings.validate().is_ok());

        settings.max_request_size = 0;
        assert!(settings.validate().is_err());

        let mut settings = ServerSettings::default();
        settings.rate_limit_window_seconds = 0;
        assert!(settings.validate().is_err());

        let mut settings = ServerSettings::default();
        settings.cors_allow_origin = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn from_file_reads_and_validates() {
        let dir = std::env::temp_dir().join(format!("popshop-settings-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let good = dir.join("settings.yaml");
        std::fs::write(&good, "port: 9999\nwatch: true\n").unwrap();
        let settings = ServerSettings::from_file(&good).unwrap();
        assert_eq!(settings.port, 9999);
        assert!(settings.watch);

        let bad = dir.join("bad.yaml");
        std::fs::write(&bad, "max_request_size: 0\n").unwrap();
        assert!(ServerSettings::from_file(&bad).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn blocked_ports_exclude_standard_web_ports() {
        assert!(!DEFAULT_BLOCKED_PROXY_PORTS.contains(&80));
        assert!(!DEFAULT_BLOCKED_PROXY_PORTS.contains(&443));
        assert!(DEFAULT_BLOCKED_PROXY_PORTS.contains(&22));
        assert!(DEFAULT_BLOCKED_PROXY_PORTS.contains(&25));
    }
}
