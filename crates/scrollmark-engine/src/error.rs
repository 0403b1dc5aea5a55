#![forbid(unsafe_code)]

//! Error types for the collaborator boundaries.
//!
//! None of these escape the engine's event handlers: the boundary adapters
//! log them and degrade to "no anchors" or "nothing persisted".

use std::fmt;

/// Failure reading candidates from the anchor source.
#[derive(Debug)]
pub enum SourceError {
    /// The content container is gone (navigated away, re-mounted).
    Detached,
    /// The source could not produce candidates for another reason.
    Unavailable(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detached => write!(f, "anchor container is detached"),
            Self::Unavailable(why) => write!(f, "anchor source unavailable: {why}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Failure reading or writing persisted anchor state.
#[derive(Debug)]
pub enum PersistError {
    Io(std::io::Error),
    /// Stored data could not be decoded or encoded.
    Encoding(String),
    /// The backend refused the operation (quota, permissions, closed store).
    Unavailable(String),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Encoding(e) => write!(f, "encoding error: {e}"),
            Self::Unavailable(why) => write!(f, "storage unavailable: {why}"),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Encoding(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<std::io::Error> for PersistError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Errors loading an engine configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    #[cfg(feature = "config-file")]
    Toml(toml::de::Error),
    #[cfg(feature = "config-file")]
    Json(serde_json::Error),
    /// One message per out-of-range parameter.
    Validation(Vec<String>),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "config-file")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "config-file")]
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => write!(f, "validation errors: {}", errors.join("; ")),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "config-file")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "config-file")]
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}
