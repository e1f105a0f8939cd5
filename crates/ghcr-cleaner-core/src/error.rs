//! Error types for ghcr-cleaner-core

use thiserror::Error;

/// Errors that can occur while planning or executing a cleanup run.
///
/// Only the variants for which [`CleanerError::is_fatal`] holds abort a run
/// (malformed manifest, invalid digest, listing failure, bad configuration).
/// The remaining variants are
/// produced by collaborators for a single object and are recovered locally by
/// the driver or the classifier.
#[derive(Error, Debug)]
pub enum CleanerError {
    /// An index manifest could not be parsed
    #[error("malformed manifest for {digest}: {reason}")]
    MalformedManifest { digest: String, reason: String },

    /// A digest string is not of the `algorithm:hex` form
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    /// The package versions could not be listed
    #[error("unable to list package versions: {0}")]
    Inventory(String),

    /// A manifest could not be fetched from the registry
    #[error("unable to fetch manifest {digest}: {reason}")]
    ManifestFetch { digest: String, reason: String },

    /// The registry returned a manifest type we do not manage
    #[error("unsupported media type for {digest}: {media_type}")]
    UnsupportedMediaType { digest: String, media_type: String },

    /// The pull request status lookup failed
    #[error("unable to retrieve pull request #{id} status: {reason}")]
    PullRequestLookup { id: u64, reason: String },

    /// A package version could not be deleted
    #[error("unable to delete package version {version_id} ({digest}): {reason}")]
    Deletion {
        version_id: u64,
        digest: String,
        reason: String,
    },

    /// Invalid run configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for cleanup operations
pub type CleanerResult<T> = std::result::Result<T, CleanerError>;

impl From<regex::Error> for CleanerError {
    fn from(err: regex::Error) -> Self {
        CleanerError::Config(format!("invalid tag pattern: {err}"))
    }
}

impl CleanerError {
    /// True for errors that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CleanerError::MalformedManifest { .. }
                | CleanerError::InvalidDigest(_)
                | CleanerError::Inventory(_)
                | CleanerError::Config(_)
        )
    }
}
