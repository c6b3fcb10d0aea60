//! Error types for nuoscillator

use thiserror::Error;

/// nuoscillator error type
///
/// The four taxonomy variants carry the identifier of the engine or strategy
/// that raised them (`origin`) and a message naming the offending index or
/// value. None of them is recoverable: callers are expected to abandon the
/// computation.
#[derive(Error, Debug)]
pub enum Error {
    /// Inconsistent or missing setup: unknown/duplicate channel, wrong
    /// parameter count, double setup, mismatched cosine-z policy.
    #[error("configuration error in {origin}: {message}")]
    Configuration { origin: String, message: String },

    /// Value outside its physical domain or outside the bin edges.
    #[error("range error in {origin}: {message}")]
    Range { origin: String, message: String },

    /// Exact-match lookup failure (energy, cosine-z, channel, neutrino type).
    #[error("lookup error in {origin}: {message}")]
    Lookup { origin: String, message: String },

    /// NaN or out-of-tolerance probability.
    #[error("numerical error in {origin}: {message}")]
    Numerical { origin: String, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl Error {
    pub(crate) fn configuration(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration { origin: origin.into(), message: message.into() }
    }

    pub(crate) fn range(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Range { origin: origin.into(), message: message.into() }
    }

    pub(crate) fn lookup(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Lookup { origin: origin.into(), message: message.into() }
    }

    pub(crate) fn numerical(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Numerical { origin: origin.into(), message: message.into() }
    }

    /// Re-attribute a taxonomy error to `origin`; other variants pass through.
    pub(crate) fn with_origin(self, origin: &str) -> Self {
        match self {
            Self::Configuration { message, .. } => Self::configuration(origin, message),
            Self::Range { message, .. } => Self::range(origin, message),
            Self::Lookup { message, .. } => Self::lookup(origin, message),
            Self::Numerical { message, .. } => Self::numerical(origin, message),
            other => other,
        }
    }

    /// Short name of the error category, used by the CLI exit report.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Range { .. } => "range",
            Self::Lookup { .. } => "lookup",
            Self::Numerical { .. } => "numerical",
            Self::Io(_) => "io",
            Self::Yaml(_) => "yaml",
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
