#![forbid(unsafe_code)]

//! Structured logging.
//!
//! Library code logs through the `tracing` macros re-exported here. Hosts
//! that do not bring their own subscriber can call [`install`], which sets
//! up a `tracing-subscriber` fmt layer filtered by `RUST_LOG` (falling back
//! to the given default directive). With the `tracing-json` feature the
//! output is JSON lines.

pub use tracing::{debug, debug_span, info, trace, warn};

use tracing_subscriber::EnvFilter;

/// Errors from [`install`].
#[derive(Debug)]
pub enum LoggingError {
    /// The default directive did not parse.
    Filter(String),
    /// A global subscriber is already installed.
    AlreadyInstalled,
}

impl std::fmt::Display for LoggingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Filter(e) => write!(f, "invalid log filter: {e}"),
            Self::AlreadyInstalled => write!(f, "a global subscriber is already installed"),
        }
    }
}

impl std::error::Error for LoggingError {}

/// Install a global subscriber.
///
/// `default_directive` is used when `RUST_LOG` is unset, e.g. `"scrollmark=info"`.
pub fn install(default_directive: &str) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)
            .map_err(|e| LoggingError::Filter(e.to_string()))?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    #[cfg(feature = "tracing-json")]
    let builder = builder.json();
    builder
        .try_init()
        .map_err(|_| LoggingError::AlreadyInstalled)
}
