//! Load config from file and environment.

use serde::Deserialize;
use std::path::PathBuf;

use t4t_core::{PayloadConfig, PayloadKind};

/// Emulator configuration. File: ~/.config/t4t/config.toml or /etc/t4t/config.toml.
/// Env overrides: T4T_VPCD_HOST, T4T_VPCD_PORT, T4T_PAYLOAD, T4T_PAYLOAD_KIND.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Host running vpcd (default 127.0.0.1).
    #[serde(default = "default_vpcd_host")]
    pub vpcd_host: String,
    /// vpcd TCP port (default 35963).
    #[serde(default = "default_vpcd_port")]
    pub vpcd_port: u16,
    /// Initial payload text.
    #[serde(default = "default_payload")]
    pub payload: String,
    /// "uri" or "text".
    #[serde(default = "default_payload_kind")]
    pub payload_kind: PayloadKind,
    /// Log filter used when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Delay before reconnecting to vpcd.
    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: u64,
}

fn default_vpcd_host() -> String {
    "127.0.0.1".to_string()
}
fn default_vpcd_port() -> u16 {
    35963
}
fn default_payload() -> String {
    t4t_core::payload::DEFAULT_PAYLOAD.to_string()
}
fn default_payload_kind() -> PayloadKind {
    PayloadKind::Uri
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_reconnect_secs() -> u64 {
    2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vpcd_host: default_vpcd_host(),
            vpcd_port: default_vpcd_port(),
            payload: default_payload(),
            payload_kind: default_payload_kind(),
            log_level: default_log_level(),
            reconnect_secs: default_reconnect_secs(),
        }
    }
}

impl Config {
    pub fn payload_config(&self) -> PayloadConfig {
        PayloadConfig::new(self.payload.clone(), self.payload_kind)
    }
}

/// Load config: merge default, then config file (if present), then env vars.
/// Runs before logging is set up, so file problems go to stderr.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    apply_env(&mut c, |key| std::env::var(key).ok());
    c
}

fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(s) = var("T4T_VPCD_HOST") {
        if !s.is_empty() {
            c.vpcd_host = s;
        }
    }
    if let Some(s) = var("T4T_VPCD_PORT") {
        if let Ok(p) = s.parse::<u16>() {
            c.vpcd_port = p;
        }
    }
    if let Some(s) = var("T4T_PAYLOAD") {
        c.payload = s;
    }
    if let Some(s) = var("T4T_PAYLOAD_KIND") {
        if let Some(kind) = parse_kind(&s) {
            c.payload_kind = kind;
        }
    }
}

/// "uri"/"url" or "text", case-insensitive.
pub fn parse_kind(s: &str) -> Option<PayloadKind> {
    match s.to_ascii_lowercase().as_str() {
        "uri" | "url" => Some(PayloadKind::Uri),
        "text" => Some(PayloadKind::Text),
        _ => None,
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/t4t/config.toml"));
    }
    out.push(PathBuf::from("/etc/t4t/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            match std::fs::read_to_string(&p) {
                Ok(s) => match toml::from_str::<Config>(&s) {
                    Ok(c) => return Some(c),
                    Err(e) => eprintln!("ignoring config file {}: {e}", p.display()),
                },
                Err(e) => eprintln!("cannot read config file {}: {e}", p.display()),
            }
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_gives_defaults() {
        let c: Config = toml::from_str("").unwrap();
        assert_eq!(c, Config::default());
        assert_eq!(c.payload_config(), PayloadConfig::default());
    }

    #[test]
    fn file_values() {
        let c: Config = toml::from_str(
            r#"
            vpcd_port = 40000
            payload = "hello"
            payload_kind = "text"
            "#,
        )
        .unwrap();
        assert_eq!(c.vpcd_port, 40000);
        assert_eq!(c.payload_config(), PayloadConfig::text("hello"));
        assert_eq!(c.vpcd_host, "127.0.0.1");
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(toml::from_str::<Config>("proxy_port = 1").is_err());
        assert!(toml::from_str::<Config>("payload_kind = \"mime\"").is_err());
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            ("T4T_VPCD_PORT", "12345"),
            ("T4T_PAYLOAD", "https://nfc.cool"),
            ("T4T_PAYLOAD_KIND", "URL"),
        ]
        .into_iter()
        .collect();
        let mut c = Config {
            payload_kind: PayloadKind::Text,
            ..Config::default()
        };
        apply_env(&mut c, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.vpcd_port, 12345);
        assert_eq!(c.payload_config(), PayloadConfig::uri("https://nfc.cool"));
    }

    #[test]
    fn bad_env_values_ignored() {
        let env: HashMap<&str, &str> = [
            ("T4T_VPCD_PORT", "not-a-port"),
            ("T4T_PAYLOAD_KIND", "mime"),
            ("T4T_VPCD_HOST", ""),
        ]
        .into_iter()
        .collect();
        let mut c = Config::default();
        apply_env(&mut c, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c, Config::default());
    }
}
