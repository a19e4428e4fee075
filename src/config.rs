// src/config.rs
//! Run configuration: one source, one rule, one sink.
//!
//! Files are JSON or TOML. The extension picks the parser; an unknown
//! extension tries JSON, then TOML.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::mapper::MetaTemplates;
use crate::sink::OutputFormat;

pub const ENV_CONFIG_PATH: &str = "FEEDFILTER_CONFIG";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;
pub const MAX_FETCH_TIMEOUT_SECS: u64 = 600;

/// Validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub from: String,
    pub to: String,
    pub to_fmt: OutputFormat,
    /// Empty means every item is kept.
    pub include_if: String,
    pub meta: MetaTemplates,
    pub fetch_timeout: Duration,
}

/// On-disk shape; everything optional so validation can name what's missing.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    from: String,
    to: String,
    to_fmt: String,
    include_if: String,
    meta: MetaTemplates,
    fetch_timeout_secs: Option<u64>,
}

impl Config {
    /// Build a config in code, with the same validation as a file.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        to_fmt: &str,
        include_if: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        validate(RawConfig {
            from: from.into(),
            to: to.into(),
            to_fmt: to_fmt.to_string(),
            include_if: include_if.into(),
            ..RawConfig::default()
        })
    }

    pub fn with_meta(mut self, meta: MetaTemplates) -> Self {
        self.meta = meta.normalized();
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

/// Load and validate a config file.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let raw = parse_raw(&content, &ext).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })?;
    let cfg = validate(raw)?;
    tracing::debug!(
        target: "config",
        path = %path.display(),
        format = %cfg.to_fmt,
        "config loaded"
    );
    Ok(cfg)
}

/// Which file to load:
/// 1) the explicit path (`--config`)
/// 2) $FEEDFILTER_CONFIG, which must exist
/// 3) ./config.json
/// 4) ./config.toml
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        return if pb.exists() {
            Ok(pb)
        } else {
            Err(ConfigError::MissingEnvPath(pb))
        };
    }
    ["config.json", "config.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or(ConfigError::NotFound)
}

pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    load_from(&resolve_path(explicit)?)
}

fn parse_raw(s: &str, hint_ext: &str) -> Result<RawConfig, String> {
    match hint_ext {
        "json" => serde_json::from_str(s).map_err(|e| e.to_string()),
        "toml" => toml::from_str(s).map_err(|e| e.to_string()),
        _ => serde_json::from_str(s).or_else(|json_err| {
            toml::from_str(s).map_err(|toml_err| {
                format!("neither JSON ({json_err}) nor TOML ({toml_err})")
            })
        }),
    }
}

fn validate(raw: RawConfig) -> Result<Config, ConfigError> {
    let from = raw.from.trim().to_string();
    if !(from.starts_with("http://") || from.starts_with("https://")) {
        return Err(invalid("from", "must be an http:// or https:// URL"));
    }
    if raw.to.is_empty() {
        return Err(invalid("to", "must be a file path or '-' for stdout"));
    }
    let to_fmt: OutputFormat = raw
        .to_fmt
        .parse()
        .map_err(|e: crate::sink::UnknownFormat| invalid("to_fmt", e.to_string()))?;
    let secs = raw.fetch_timeout_secs.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
    if !(1..=MAX_FETCH_TIMEOUT_SECS).contains(&secs) {
        return Err(invalid(
            "fetch_timeout_secs",
            format!("must be between 1 and {MAX_FETCH_TIMEOUT_SECS}"),
        ));
    }

    Ok(Config {
        from,
        to: raw.to,
        to_fmt,
        include_if: raw.include_if,
        meta: raw.meta.normalized(),
        fetch_timeout: Duration::from_secs(secs),
    })
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::ORIG_PLACEHOLDER;

    #[test]
    fn json_and_toml_parse_to_the_same_config() {
        let json = r#"{
            "from": "https://example.com/feed.xml",
            "to": "-",
            "to_fmt": "rss",
            "include_if": "title.contains('x')",
            "meta": {"title": "[m] $$ORIG$$"}
        }"#;
        let toml = r#"
            from = "https://example.com/feed.xml"
            to = "-"
            to_fmt = "rss"
            include_if = "title.contains('x')"
            [meta]
            title = "[m] $$ORIG$$"
        "#;
        let a = validate(parse_raw(json, "json").unwrap()).unwrap();
        let b = validate(parse_raw(toml, "toml").unwrap()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.meta.title, "[m] $$ORIG$$");
        assert_eq!(a.meta.description, ORIG_PLACEHOLDER);
        assert_eq!(a.fetch_timeout, Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS));
    }

    #[test]
    fn unknown_extension_sniffs_content() {
        assert!(parse_raw(r#"{"to": "-"}"#, "").is_ok());
        assert!(parse_raw("to = \"-\"", "conf").is_ok());
        assert!(parse_raw("to: -", "").is_err());
    }

    #[test]
    fn validation_names_the_bad_field() {
        let field = |raw: RawConfig| match validate(raw) {
            Err(ConfigError::Invalid { field, .. }) => field,
            other => panic!("expected invalid, got {other:?}"),
        };
        let base = || RawConfig {
            from: "https://example.com/f".into(),
            to: "out.json".into(),
            to_fmt: "json".into(),
            ..RawConfig::default()
        };

        assert_eq!(
            field(RawConfig {
                from: "ftp://example.com/f".into(),
                ..base()
            }),
            "from"
        );
        assert_eq!(
            field(RawConfig {
                to: String::new(),
                ..base()
            }),
            "to"
        );
        assert_eq!(
            field(RawConfig {
                to_fmt: "yaml".into(),
                ..base()
            }),
            "to_fmt"
        );
        assert_eq!(
            field(RawConfig {
                fetch_timeout_secs: Some(0),
                ..base()
            }),
            "fetch_timeout_secs"
        );
        assert!(validate(base()).is_ok());
    }
}
