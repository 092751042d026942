//! Load config from file and environment.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Node configuration. File: ~/.config/wordrelay/config.toml or /etc/wordrelay/config.toml.
/// Env overrides: WORDRELAY_PROCESSING_PORT, WORDRELAY_DISPLAY_HOST, WORDRELAY_DISPLAY_PORT,
/// WORDRELAY_ACK_TIMEOUT_MS, WORDRELAY_RESTART_DELAY_SECS.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Processing node listen port (default 9090).
    #[serde(default = "default_processing_port")]
    pub processing_port: u16,
    /// Display node host as seen from the processing node (default 127.0.0.1).
    #[serde(default = "default_display_host")]
    pub display_host: String,
    /// Display node listen port (default 7070).
    #[serde(default = "default_display_port")]
    pub display_port: u16,
    /// Client ack wait in milliseconds; 0 waits indefinitely (default 5000).
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    /// Delay before a node is restarted after a fatal startup error (default 3).
    #[serde(default = "default_restart_delay_secs")]
    pub restart_delay_secs: u64,
}

fn default_processing_port() -> u16 {
    9090
}
fn default_display_host() -> String {
    "127.0.0.1".to_string()
}
fn default_display_port() -> u16 {
    7070
}
fn default_ack_timeout_ms() -> u64 {
    5000
}
fn default_restart_delay_secs() -> u64 {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            processing_port: default_processing_port(),
            display_host: default_display_host(),
            display_port: default_display_port(),
            ack_timeout_ms: default_ack_timeout_ms(),
            restart_delay_secs: default_restart_delay_secs(),
        }
    }
}

impl Config {
    pub fn ack_timeout(&self) -> Option<Duration> {
        (self.ack_timeout_ms > 0).then(|| Duration::from_millis(self.ack_timeout_ms))
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }

    /// Apply overrides from a variable lookup (the process environment in `load`).
    /// Unparseable values are ignored.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(p) = var("WORDRELAY_PROCESSING_PORT").and_then(|s| s.parse().ok()) {
            self.processing_port = p;
        }
        if let Some(h) = var("WORDRELAY_DISPLAY_HOST").filter(|s| !s.trim().is_empty()) {
            self.display_host = h.trim().to_string();
        }
        if let Some(p) = var("WORDRELAY_DISPLAY_PORT").and_then(|s| s.parse().ok()) {
            self.display_port = p;
        }
        if let Some(ms) = var("WORDRELAY_ACK_TIMEOUT_MS").and_then(|s| s.parse().ok()) {
            self.ack_timeout_ms = ms;
        }
        if let Some(secs) = var("WORDRELAY_RESTART_DELAY_SECS").and_then(|s| s.parse().ok()) {
            self.restart_delay_secs = secs;
        }
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    c.apply_env(|k| std::env::var(k).ok());
    c
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/wordrelay/config.toml"));
    }
    out.push(PathBuf::from("/etc/wordrelay/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            match std::fs::read_to_string(&p) {
                Ok(s) => match parse(&s) {
                    Ok(c) => return Some(c),
                    Err(e) => warn!(path = %p.display(), error = %e, "ignoring invalid config"),
                },
                Err(e) => warn!(path = %p.display(), error = %e, "cannot read config"),
            }
            break;
        }
    }
    None
}

pub fn parse(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(s)
}
