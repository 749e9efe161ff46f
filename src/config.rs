// src/config.rs

//! Configuration file
//!
//! ```toml
//! [transaction]
//! multi_version = false
//! ignore_satisfied = true
//! show_replaced = false
//!
//! [order]
//! group_by_repo = false
//! defer_requested = true
//! removals_first = false
//!
//! [channels]
//! priority = "strict"
//! subdirs = ["linux-64", "noarch"]
//!
//! [logging]
//! filter = "txplan=debug"
//! ```
//!
//! Every section and key is optional.

use crate::error::Result;
use crate::transaction::{OrderFlags, TransactionMode};
use crate::universe::loader::{LoadOptions, native_subdir};
use serde::{Deserialize, Serialize};
use std::path::Path;
use strum_macros::{Display, EnumString};

/// How channel order affects candidate selection
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChannelPriority {
    /// Earlier channels always win
    Strict,
    /// Earlier channels are preferred
    #[default]
    Flexible,
    /// Channel order is ignored; versions decide
    Disabled,
}

/// `[channels]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub priority: ChannelPriority,
    pub subdirs: Vec<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            priority: ChannelPriority::default(),
            subdirs: vec![native_subdir().to_string(), "noarch".to_string()],
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive; `RUST_LOG` overrides it
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transaction: TransactionMode,
    pub order: OrderFlags,
    pub channels: ChannelConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Read a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            subdirs: self.channels.subdirs.clone(),
            priority: self.channels.priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.logging.filter, "info");
        assert_eq!(config.channels.priority, ChannelPriority::Flexible);
        assert!(config.channels.subdirs.contains(&"noarch".to_string()));
    }

    #[test]
    fn test_parse_sections() {
        let config = Config::from_toml_str(
            r#"
            [transaction]
            ignore_satisfied = true

            [order]
            defer_requested = true
            removals_first = true

            [channels]
            priority = "disabled"
            subdirs = ["noarch"]
            "#,
        )
        .unwrap();

        assert!(config.transaction.ignore_satisfied);
        assert!(!config.transaction.multi_version);
        assert!(config.order.defer_requested);
        assert!(config.order.removals_first);
        assert!(!config.order.group_by_repo);
        assert_eq!(config.load_options().priority, ChannelPriority::Disabled);
        assert_eq!(config.load_options().subdirs, vec!["noarch".to_string()]);
    }

    #[test]
    fn test_invalid_priority() {
        let err = Config::from_toml_str("[channels]\npriority = \"loose\"").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
    }

    #[test]
    fn test_to_toml_reloads() {
        let mut config = Config::default();
        config.order.group_by_repo = true;
        config.logging.filter = "txplan=debug".to_string();

        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("txplan.toml");
        std::fs::write(&path, "[channels]\npriority = \"strict\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.channels.priority, ChannelPriority::Strict);

        let missing = Config::load(&dir.path().join("absent.toml")).unwrap_err();
        assert_eq!(missing.code(), ErrorCode::Io);
    }
}
