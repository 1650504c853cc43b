//! Error types for guidmap

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for guidmap operations
pub type Result<T> = std::result::Result<T, GuidError>;

/// Errors raised while resolving identities.
///
/// An unknown user or group is never an error: it gets a generated id.
#[derive(Debug, Error)]
pub enum GuidError {
    /// Local account file is missing or unreadable
    #[error("failed to read account source {path}: {source}")]
    AccountSourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configured digest is not supported
    #[error("hash algorithm unavailable: {0}")]
    HashAlgorithmUnavailable(String),

    /// A listing line that cannot be used; parsers skip these
    #[error("malformed listing line {line:?}: {reason}")]
    MalformedListingLine { line: String, reason: &'static str },

    /// Operation needs a configured session
    #[error("permission context is not configured")]
    NotConfigured,
}

impl GuidError {
    pub(crate) fn source_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GuidError::AccountSourceUnavailable { path: path.into(), source }
    }

    pub(crate) fn malformed(line: &str, reason: &'static str) -> Self {
        GuidError::MalformedListingLine { line: line.to_string(), reason }
    }
}
