//! Handler configuration loader.
//!
//! A handler receives two configuration strings (unsecure and secure). The
//! effective one is decoded into a [`HandlerConfig`] according to the format
//! the handler declares:
//! - [`ConfigFormat::None`]: nothing is decoded
//! - [`ConfigFormat::Opaque`]: the blob is kept as a single [`OPAQUE_SETTING`]
//! - [`ConfigFormat::Json`]: `{"settings": [{"name": "...", "value": "..."}]}`,
//!   loose dialect accepted (bare property names, single quotes)
//! - [`ConfigFormat::Xml`]: `<config><setting name="...">value</setting></config>`
//!
//! Every decoding failure surfaces as [`ConfigError::Deserialization`]; the
//! parser-level error is available through `source()`.

mod json;
mod loose;
mod setting;
mod xml;

pub use loose::normalize as normalize_loose_json;
pub use setting::{ConfigSetting, HandlerConfig};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name of the single setting an [`ConfigFormat::Opaque`] blob is stored under.
pub const OPAQUE_SETTING: &str = "value";

/// Declared encoding of a handler's configuration strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigFormat {
    #[serde(rename = "none", alias = "None")]
    None,
    #[serde(rename = "string", alias = "String")]
    Opaque,
    #[default]
    #[serde(rename = "json", alias = "Json")]
    Json,
    #[serde(rename = "xml", alias = "Xml")]
    Xml,
}

impl ConfigFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Opaque => "string",
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "string" | "opaque" => Ok(Self::Opaque),
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            _ => Err(ConfigError::UnknownFormat(s.to_string())),
        }
    }
}

/// Low-level failure inside one of the format codecs.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Xml(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("{0}")]
    Structure(String),
}

/// Errors raised by the configuration loader.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to deserialize {format} configuration: {source}")]
    Deserialization {
        format: ConfigFormat,
        #[source]
        source: ParseError,
    },

    #[error("unable to serialize {format} configuration: {source}")]
    Serialization {
        format: ConfigFormat,
        #[source]
        source: ParseError,
    },

    #[error("unknown configuration format: {0}")]
    UnknownFormat(String),
}

impl ConfigError {
    /// Format the failing blob was declared with, if any.
    pub fn format(&self) -> Option<ConfigFormat> {
        match self {
            Self::Deserialization { format, .. } | Self::Serialization { format, .. } => {
                Some(*format)
            }
            Self::UnknownFormat(_) => None,
        }
    }
}

/// Decodes `blob` as `format`.
///
/// An absent, empty or whitespace-only blob yields an empty configuration
/// for every format.
pub fn parse(blob: Option<&str>, format: ConfigFormat) -> Result<HandlerConfig, ConfigError> {
    let blob = match blob {
        Some(blob) if !blob.trim().is_empty() => blob,
        _ => return Ok(HandlerConfig::new()),
    };

    let decoded = match format {
        ConfigFormat::None => Ok(HandlerConfig::new()),
        ConfigFormat::Opaque => Ok(HandlerConfig::new().with(OPAQUE_SETTING, blob)),
        ConfigFormat::Json => json::parse(blob),
        ConfigFormat::Xml => xml::parse(blob),
    };
    decoded.map_err(|source| ConfigError::Deserialization { format, source })
}

/// Encodes `config` as `format`; the inverse of [`parse`].
///
/// `None` and `Opaque` can only represent an empty configuration or, for
/// `Opaque`, a lone [`OPAQUE_SETTING`].
pub fn serialize(config: &HandlerConfig, format: ConfigFormat) -> Result<String, ConfigError> {
    let encoded = match format {
        ConfigFormat::None if config.is_empty() => Ok(String::new()),
        ConfigFormat::None => Err(ParseError::Structure(
            "settings cannot be represented without a format".to_string(),
        )),
        ConfigFormat::Opaque => serialize_opaque(config),
        ConfigFormat::Json => json::serialize(config),
        ConfigFormat::Xml => xml::serialize(config),
    };
    encoded.map_err(|source| ConfigError::Serialization { format, source })
}

fn serialize_opaque(config: &HandlerConfig) -> Result<String, ParseError> {
    match config.settings() {
        [] => Ok(String::new()),
        [only] if only.name().eq_ignore_ascii_case(OPAQUE_SETTING) => Ok(only.value().to_string()),
        _ => Err(ParseError::Structure(format!(
            "an opaque configuration holds a single '{OPAQUE_SETTING}' setting"
        ))),
    }
}
