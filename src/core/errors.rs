//! UBP-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, UbpError>;

/// Top-level error type for the booster panel.
#[derive(Debug, Error)]
pub enum UbpError {
    #[error("[UBP-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[UBP-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[UBP-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[UBP-2001] agent call {method} failed: {details}")]
    AgentTransport {
        method: &'static str,
        details: String,
    },

    #[error("[UBP-2002] agent call {method} returned an unreadable reply: {details}")]
    AgentReply {
        method: &'static str,
        details: String,
    },

    #[error("[UBP-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[UBP-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[UBP-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl UbpError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "UBP-1001",
            Self::MissingConfig { .. } => "UBP-1002",
            Self::ConfigParse { .. } => "UBP-1003",
            Self::AgentTransport { .. } => "UBP-2001",
            Self::AgentReply { .. } => "UBP-2002",
            Self::Serialization { .. } => "UBP-2101",
            Self::Io { .. } => "UBP-3002",
            Self::Runtime { .. } => "UBP-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AgentTransport { .. }
                | Self::Io { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for UbpError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for UbpError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
