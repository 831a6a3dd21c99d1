//! Rule configuration loading.
//!
//! The loader accepts a single YAML file or a directory of `.yaml`/`.yml`
//! files (direct children only, sorted by filename so reloads are
//! deterministic). Documents are walked as `serde_yaml::Value` rather than
//! deserialized into rigid structs. The schema is forgiving (legacy key
//! aliases, status codes as strings, unknown keys kept) and a structural
//! walk expresses that better than serde attributes.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use super::rules::{
    Method, MockResponse, ProxyTarget, RequestPattern, Rule, RuleAction, RuleSet,
    DEFAULT_MOCK_STATUS, DEFAULT_PROXY_TIMEOUT_MS,
};
use crate::error::ConfigError;

/// Load a rule set from a file or directory.
///
/// Directory loads skip files that fail to parse (logged at WARN); a single
/// file that fails to parse is fatal. Either way, ending up with zero rules
/// is `EmptyConfiguration`.
pub fn load_rules(path: &Path) -> Result<RuleSet, ConfigError> {
    let metadata = std::fs::metadata(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let rules = if metadata.is_dir() {
        load_directory(path)?
    } else {
        load_file(path)?
    };

    if rules.is_empty() {
        return Err(ConfigError::EmptyConfiguration {
            path: path.to_path_buf(),
        });
    }

    Ok(RuleSet::new(rules))
}

fn load_directory(dir: &Path) -> Result<Vec<Rule>, ConfigError> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_yaml_extension(path))
        .collect();
    entries.sort();

    let mut rules = Vec::new();
    for path in &entries {
        match load_file(path) {
            Ok(mut file_rules) => {
                debug!("loaded {} rules from {}", file_rules.len(), path.display());
                rules.append(&mut file_rules);
            }
            Err(e) => {
                warn!("skipping unparseable config file {}: {}", path.display(), e);
            }
        }
    }
    Ok(rules)
}

pub(crate) fn has_yaml_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false)
}

fn load_file(path: &Path) -> Result<Vec<Rule>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut rules = Vec::new();
    // A file may hold several `---`-separated documents; each is a rule map
    // or a sequence of rule maps.
    for document in serde_yaml::Deserializer::from_str(&contents) {
        let value = Value::deserialize(document)
            .map_err(|e| ConfigError::invalid(path, e.to_string()))?;
        rules.extend(parse_document(&value).map_err(|msg| ConfigError::invalid(path, msg))?);
    }
    Ok(rules)
}

/// Parse one YAML document into rules. The document must be a rule map or a
/// sequence of rule maps.
pub fn parse_document(value: &Value) -> Result<Vec<Rule>, String> {
    match value {
        Value::Mapping(map) => Ok(vec![build_rule(map)?]),
        Value::Sequence(seq) => seq
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Mapping(map) => {
                    build_rule(map).map_err(|msg| format!("rule {i}: {msg}"))
                }
                other => Err(format!("rule {i}: expected a mapping, got {}", kind_of(other))),
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(format!(
            "document must be a rule or a sequence of rules, got {}",
            kind_of(other)
        )),
    }
}

fn build_rule(map: &Mapping) -> Result<Rule, String> {
    for key in map.keys() {
        if let Value::String(k) = key {
            if !matches!(k.as_str(), "request" | "response" | "proxy" | "name") {
                debug!("keeping unknown rule key '{}'", k);
            }
        }
    }

    let request = get(map, "request")
        .ok_or("missing required key 'request'")?
        .as_mapping()
        .ok_or("'request' must be a mapping")?;

    let response = get(map, "response");
    let proxy = get(map, "proxy");
    let action = match (response, proxy) {
        (Some(response), None) => {
            let map = response.as_mapping().ok_or("'response' must be a mapping")?;
            RuleAction::Mock(build_mock_response(map)?)
        }
        (None, Some(proxy)) => {
            let map = proxy.as_mapping().ok_or("'proxy' must be a mapping")?;
            RuleAction::Proxy(build_proxy_target(map)?)
        }
        (Some(_), Some(_)) => return Err("rule declares both 'response' and 'proxy'".to_string()),
        (None, None) => return Err("rule must declare 'response' or 'proxy'".to_string()),
    };

    let name = get(map, "name").and_then(Value::as_str).map(str::to_string);

    Ok(Rule {
        name,
        pattern: build_request_pattern(request)?,
        action,
    })
}

fn build_request_pattern(map: &Mapping) -> Result<RequestPattern, String> {
    let path = get(map, "path")
        .and_then(Value::as_str)
        .ok_or("missing required field 'request.path'")?
        .to_string();

    let method = method_field(map).ok_or("missing required field 'request.method'")?;

    let body = match get(map, "body") {
        None => None,
        Some(Value::String(s)) => Some(Bytes::from(s.clone())),
        Some(other) => return Err(format!("'request.body' must be a string, got {}", kind_of(other))),
    };

    Ok(RequestPattern {
        path,
        method,
        headers: header_pairs(get(map, "headers")),
        body,
    })
}

fn build_mock_response(map: &Mapping) -> Result<MockResponse, String> {
    let body = match get(map, "body") {
        Some(Value::String(s)) => Bytes::from(s.clone()),
        Some(other) => return Err(format!("'response.body' must be a string, got {}", kind_of(other))),
        None => return Err("missing required field 'response.body'".to_string()),
    };

    Ok(MockResponse {
        status: status_field(get(map, "status")),
        headers: header_pairs(get(map, "headers")),
        body,
    })
}

fn build_proxy_target(map: &Mapping) -> Result<ProxyTarget, String> {
    let url = get(map, "url")
        .and_then(Value::as_str)
        .ok_or("missing required field 'proxy.url'")?
        .to_string();

    let timeout_ms = match get(map, "timeout_ms") {
        None => DEFAULT_PROXY_TIMEOUT_MS,
        Some(v) => v
            .as_u64()
            .ok_or_else(|| format!("'proxy.timeout_ms' must be an integer, got {}", kind_of(v)))?,
    };

    Ok(ProxyTarget {
        url,
        method_override: method_field(map),
        headers: header_pairs(get(map, "headers")),
        timeout_ms,
    })
}

/// Read `method`, falling back to the legacy alias `verb`.
fn method_field(map: &Mapping) -> Option<Method> {
    get(map, "method")
        .or_else(|| get(map, "verb"))
        .and_then(Value::as_str)
        .map(Method::parse)
}

/// Status may be an integer or a decimal string; anything out of the
/// 100–599 range or unparseable falls back to 200.
fn status_field(value: Option<&Value>) -> u16 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse::<u16>().ok(),
        _ => None,
    };
    match parsed {
        Some(status) if (100..=599).contains(&status) => status,
        Some(status) => {
            debug!(status, "status out of range, defaulting to 200");
            DEFAULT_MOCK_STATUS
        }
        None => DEFAULT_MOCK_STATUS,
    }
}

/// Header mappings accept only string values; anything else is skipped.
fn header_pairs(value: Option<&Value>) -> Vec<(String, String)> {
    let Some(Value::Mapping(map)) = value else {
        return Vec::new();
    };
    map.iter()
        .filter_map(|(k, v)| match (k, v) {
            (Value::String(name), Value::String(value)) => {
                Some((name.clone(), value.clone()))
            }
            (Value::String(name), other) => {
                debug!("skipping non-string value for header '{}' ({})", name, kind_of(other));
                None
            }
            _ => None,
        })
        .collect()
}

fn get<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.get(key)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}
