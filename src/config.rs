//! Node configuration loading and persistence.
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! `TREE_*` environment variables. The binary applies command-line flags
//! last.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_TREE_IP, DEFAULT_TREE_PORT, FALLBACK_NODE_NAME};

/// Identity and bind address of this tree node.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct NodeConfig {
    /// This node's name, sent to every peer during the handshake.
    pub name: String,
    /// Host or IP to bind the tree listener on.
    pub tree_ip: String,
    /// Port to bind; `0` means the default tree port.
    pub tree_port: u16,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let name = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| FALLBACK_NODE_NAME.to_string());

        Self {
            name,
            tree_ip: DEFAULT_TREE_IP.to_string(),
            tree_port: 0,
        }
    }
}

impl NodeConfig {
    /// Loads configuration from `path` (if given), with environment overrides.
    ///
    /// A path that was given but cannot be read or parsed is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `TREE_NODE_NAME`, `TREE_IP` and `TREE_PORT` from `lookup`.
    ///
    /// Unparsable port values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup("TREE_NODE_NAME") {
            self.name = name;
        }

        if let Some(ip) = lookup("TREE_IP") {
            self.tree_ip = ip;
        }

        if let Some(port) = lookup("TREE_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.tree_port = port;
            }
        }
    }

    /// Persists the configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Port to bind, with `0` mapped to the default tree port.
    pub fn effective_port(&self) -> u16 {
        if self.tree_port == 0 {
            DEFAULT_TREE_PORT
        } else {
            self.tree_port
        }
    }

    /// `host:port` string the listener resolves.
    pub fn bind_target(&self) -> String {
        if self.tree_ip.contains(':') && !self.tree_ip.starts_with('[') {
            // Bare IPv6 literal
            format!("[{}]:{}", self.tree_ip, self.effective_port())
        } else {
            format!("{}:{}", self.tree_ip, self.effective_port())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert!(!config.name.is_empty());
        assert_eq!(config.tree_ip, "0.0.0.0");
        assert_eq!(config.tree_port, 0);
        assert_eq!(config.effective_port(), 8888);
        assert_eq!(config.bind_target(), "0.0.0.0:8888");
    }

    #[test]
    fn test_explicit_port_is_kept() {
        let config = NodeConfig {
            tree_port: 9000,
            ..NodeConfig::default()
        };
        assert_eq!(config.effective_port(), 9000);
    }

    #[test]
    fn test_ipv6_bind_target() {
        let config = NodeConfig {
            tree_ip: "::1".to_string(),
            tree_port: 7000,
            ..NodeConfig::default()
        };
        assert_eq!(config.bind_target(), "[::1]:7000");
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("TREE_NODE_NAME", "node-a"),
            ("TREE_IP", "127.0.0.1"),
            ("TREE_PORT", "9100"),
        ]
        .into_iter()
        .collect();

        let mut config = NodeConfig::default();
        config.apply_overrides(|key| env.get(key).map(ToString::to_string));
        assert_eq!(config.name, "node-a");
        assert_eq!(config.tree_ip, "127.0.0.1");
        assert_eq!(config.tree_port, 9100);
    }

    #[test]
    fn test_invalid_port_override_ignored() {
        let mut config = NodeConfig {
            tree_port: 9000,
            ..NodeConfig::default()
        };
        config.apply_overrides(|key| (key == "TREE_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.tree_port, 9000);
    }

    #[test]
    fn test_save_and_load_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("node.json");
        let config = NodeConfig {
            name: "node-b".to_string(),
            tree_ip: "127.0.0.1".to_string(),
            tree_port: 9200,
        };
        config.save(&path).unwrap();

        let loaded = NodeConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("node.json");
        fs::write(&path, r#"{"name": "node-c"}"#).unwrap();

        let loaded = NodeConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.name, "node-c");
        assert_eq!(loaded.effective_port(), 8888);
    }

    #[test]
    fn test_missing_file_is_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let result = NodeConfig::load_from_file(&tmp.path().join("missing.json"));
        assert!(result.is_err());
    }
}
