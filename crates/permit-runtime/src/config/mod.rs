//! Permission registry configuration.
//!
//! Loads [`PermissionNode`] definitions from TOML so hosts can populate a
//! [`PermissionRegistry`] from a file instead of code.
//!
//! # Format
//!
//! ```toml
//! [permissions."cmd.fly"]
//! description = "Allows flying"
//! default = "op"              # true | false | "op" | "not_op" (and aliases)
//! children = { "cmd.fly.self" = true, "cmd.fly.other" = false }
//!
//! [permissions."chat"]
//! default = true
//! ```
//!
//! Children of config-loaded nodes are ordered by name. That order decides
//! equal-depth conflicts during implication expansion.
//!
//! # Example
//!
//! ```
//! use permit_runtime::config::PermissionsConfig;
//! use permit_runtime::PermissionRegistry;
//!
//! let config = PermissionsConfig::from_toml_str(r#"
//!     [permissions."cmd.fly"]
//!     default = "op"
//!     children = { "cmd.fly.self" = true }
//! "#).expect("valid config");
//!
//! let registry = PermissionRegistry::new();
//! assert_eq!(config.apply(&registry, false).expect("apply"), 1);
//! assert_eq!(registry.lookup("cmd.fly").map(|n| n.children().len()), Some(1));
//! ```

mod error;

pub use error::ConfigError;

use crate::PermissionRegistry;
use permit_auth::{PermissionDefault, PermissionNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Root of a permissions config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionsConfig {
    /// Permission definitions keyed by name.
    #[serde(default)]
    pub permissions: BTreeMap<String, PermissionEntry>,
}

/// One permission definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionEntry {
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Default value. Accepts a bool or a default keyword.
    #[serde(default)]
    pub default: DefaultSetting,

    /// Implied children and their weights.
    #[serde(default)]
    pub children: BTreeMap<String, bool>,
}

/// Raw `default` field: either a bool or text such as `"op"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultSetting {
    /// `default = true`
    Flag(bool),
    /// `default = "op"`
    Text(String),
}

impl Default for DefaultSetting {
    fn default() -> Self {
        Self::Flag(false)
    }
}

impl PermissionsConfig {
    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed TOML or unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ReadFile`] or [`ConfigError::ParseToml`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config: Self =
            toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))?;
        debug!(
            "config: loaded {} permissions from {}",
            config.permissions.len(),
            path.display()
        );
        Ok(config)
    }

    /// Converts every entry into a [`PermissionNode`], sorted by name.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidDefault`] for the first entry whose default is
    /// not recognized.
    pub fn to_nodes(&self) -> Result<Vec<PermissionNode>, ConfigError> {
        self.permissions
            .iter()
            .map(|(name, entry)| entry.to_node(name))
            .collect()
    }

    /// Registers every configured node.
    ///
    /// All or nothing: entries are validated, and without `overwrite` every
    /// name is checked against the registry, before anything is registered.
    /// With `overwrite`, existing nodes are replaced. Returns the number
    /// registered.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidDefault`] or [`ConfigError::Register`].
    pub fn apply(
        &self,
        registry: &PermissionRegistry,
        overwrite: bool,
    ) -> Result<usize, ConfigError> {
        let nodes = self.to_nodes()?;
        let count = if overwrite {
            let count = nodes.len();
            for node in nodes {
                registry.register_or_replace(node);
            }
            count
        } else {
            registry.register_all(nodes).map_err(ConfigError::Register)?
        };

        debug!("config: registered {count} permissions");
        Ok(count)
    }
}

impl PermissionEntry {
    fn to_node(&self, name: &str) -> Result<PermissionNode, ConfigError> {
        let default = match &self.default {
            DefaultSetting::Flag(flag) => PermissionDefault::from(*flag),
            DefaultSetting::Text(text) => text.parse::<PermissionDefault>().map_err(|source| {
                ConfigError::InvalidDefault {
                    permission: name.to_string(),
                    source,
                }
            })?,
        };

        let mut node = PermissionNode::new(name).with_default(default);
        if let Some(description) = &self.description {
            node = node.with_description(description.clone());
        }
        Ok(self
            .children
            .iter()
            .fold(node, |node, (child, &value)| node.with_child(child, value)))
    }
}
