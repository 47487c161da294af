//! Configuration types for the Switchboard gateway.
//!
//! Configuration comes from environment variables ([`GatewayConfig::from_env`])
//! or a JSON file ([`GatewayConfig::load`]). Missing values take the defaults
//! below.
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `APP_ID` | `app_id` | none |
//! | `STAGE` | `stage` | `local` |
//! | `LOG_LEVEL` | `log_level` | `INFO` |
//! | `SERVICE_ALIASES` | `service_aliases` | empty |
//! | `STRICT_SIGNATURES` | `strict_signatures` | `false` |
//!
//! `SERVICE_ALIASES` holds `Type$alias` pairs separated by `;`, for example
//! `UserService$users;OrderService$orders`.

use crate::error::GatewayError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Configuration for the registration phase and the dispatch read path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Application identifier.
    pub app_id: Option<String>,

    /// Deployment stage.
    pub stage: String,

    /// Log verbosity.
    pub log_level: LogLevel,

    /// Declaring type name -> externally visible service alias.
    pub service_aliases: BTreeMap<String, String>,

    /// Reject services with methods that lack a complete signature.
    pub strict_signatures: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            stage: "local".to_string(),
            log_level: LogLevel::Info,
            service_aliases: BTreeMap::new(),
            strict_signatures: false,
        }
    }
}

impl GatewayConfig {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Reads configuration from `(name, value)` pairs.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in vars {
            let value = value.as_ref();
            match key.as_ref() {
                "APP_ID" if !value.is_empty() => config.app_id = Some(value.to_string()),
                "STAGE" if !value.is_empty() => config.stage = value.to_string(),
                "LOG_LEVEL" => config.log_level = LogLevel::parse(value).unwrap_or_default(),
                "SERVICE_ALIASES" => config.service_aliases = parse_aliases(value),
                "STRICT_SIGNATURES" => {
                    config.strict_signatures = matches!(value, "1" | "true" | "TRUE" | "yes")
                }
                _ => {}
            }
        }
        config
    }

    /// Loads a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&text)
            .map_err(|e| GatewayError::Config(format!("{}: {}", path.as_ref().display(), e)))
    }

    /// The alias configured for `target`, if any.
    pub fn alias_for(&self, target: &str) -> Option<&str> {
        self.service_aliases.get(target).map(String::as_str)
    }
}

fn parse_aliases(value: &str) -> BTreeMap<String, String> {
    value
        .split(';')
        .filter_map(|pair| pair.split_once('$'))
        .map(|(target, alias)| (target.trim(), alias.trim()))
        .filter(|(target, alias)| !target.is_empty() && !alias.is_empty())
        .map(|(target, alias)| (target.to_string(), alias.to_string()))
        .collect()
}

/// Log verbosity, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    All,
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
    Off,
}

impl LogLevel {
    /// Parses an uppercase level name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "ALL" => Some(LogLevel::All),
            "TRACE" => Some(LogLevel::Trace),
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            "FATAL" => Some(LogLevel::Fatal),
            "OFF" => Some(LogLevel::Off),
            _ => None,
        }
    }

    /// The equivalent `tracing` filter directive.
    pub fn directive(&self) -> &'static str {
        match self {
            LogLevel::All | LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error | LogLevel::Fatal => "error",
            LogLevel::Off => "off",
        }
    }
}
