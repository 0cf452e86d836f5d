//! Configuration errors.

use permit_auth::PermissionError;
use permit_types::ErrorCode;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML from a file.
    #[error("failed to parse config file '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Failed to parse TOML from a string.
    #[error("failed to parse permissions config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A permission entry has an unrecognized default.
    #[error("permission '{permission}' has an invalid default: {source}")]
    InvalidDefault {
        permission: String,
        #[source]
        source: PermissionError,
    },

    /// Registering a configured node failed.
    #[error("failed to register permission: {0}")]
    Register(#[source] PermissionError),
}

impl ConfigError {
    /// Creates a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse TOML error.
    pub fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::ReadFile { .. } => "CONFIG_READ_FILE",
            Self::ParseToml { .. } | Self::Parse(_) => "CONFIG_PARSE",
            Self::InvalidDefault { .. } => "CONFIG_INVALID_DEFAULT",
            Self::Register(_) => "CONFIG_REGISTER",
        }
    }

    fn is_recoverable(&self) -> bool {
        // A missing or unreadable file can be fixed and retried
        matches!(self, Self::ReadFile { .. })
    }
}
