// src/core/errors.rs

use thiserror::Error;

/// A malformed configuration. Every variant is fatal; there is no partial result.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A field holds a value of the wrong kind.
    #[error("{message}")]
    Type { message: String },
    /// A field holds a value of the right kind that is still not acceptable.
    #[error("{message}")]
    Value { message: String },
    /// A template or script chain loops back on itself.
    #[error("Circular {kind} detected for field `{field}`: {chain}")]
    Cycle {
        kind: &'static str,
        field: String,
        chain: String,
    },
    /// Two otherwise valid settings cannot be combined.
    #[error("{message}")]
    Conflict { message: String },
    /// `tool.hatch.env.collectors` names a collector nobody provides.
    #[error("Unknown environment collector: {name}")]
    UnknownCollector { name: String },
    /// Returned by an [`EnvironmentCollector`](crate::core::collectors::EnvironmentCollector)
    /// hook that rejects the configuration it was given.
    #[error("Environment collector `{name}` failed: {message}")]
    Collector { name: String, message: String },
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error parsing TOML in '{path}': {source}")]
    TomlParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::Type {
            message: message.into(),
        }
    }

    pub(crate) fn value_error(message: impl Into<String>) -> Self {
        Self::Value {
            message: message.into(),
        }
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub(crate) fn cycle(kind: &'static str, field: impl Into<String>, chain: &[String]) -> Self {
        Self::Cycle {
            kind,
            field: field.into(),
            chain: chain.join(" -> "),
        }
    }
}

/// Result alias used across the resolver.
pub type Result<T> = std::result::Result<T, ConfigError>;
