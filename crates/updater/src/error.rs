use std::path::PathBuf;

/// Convenient result alias for updater operations.
pub type Result<T> = std::result::Result<T, UpdaterError>;

/// Errors that can occur while checking for or applying an update.
#[derive(thiserror::Error, Debug)]
pub enum UpdaterError {
    /// The request to the release index or the asset host failed.
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// The release index response was not the expected JSON document.
    #[error("release metadata decoding failed: {0}")]
    Decode(#[from] serde_json::Error),
    /// The release index answered with an empty release.
    #[error("release index returned an empty response (no tag and no assets)")]
    EmptyRelease,
    /// The release carries no archive for the running platform.
    #[error("couldn't find download URL for {0}")]
    AssetNotFound(String),
    /// The downloaded bytes are not a readable zip archive.
    #[error("release archive is malformed: {0}")]
    ArchiveFormat(#[from] zip::result::ZipError),
    /// No payload for the target was found in the archive.
    #[error("could not find {0} binary")]
    MissingBinary(String),
    /// No detached signature for the target was found in the archive.
    #[error("could not find {0} signature")]
    MissingSignature(String),
    /// The archive holds more than one candidate file for a target.
    #[error("archive contains more than one {name} entry for {target}")]
    DuplicateEntry {
        /// Target being extracted.
        target: String,
        /// Base name of the repeated entry.
        name: String,
    },
    /// The detached signature does not match the payload.
    #[error("signature verification failed for {0}")]
    Verification(String),
    /// Writing the verified binary failed; the previous binary is in place.
    #[error("failed to install {target} at {}: {source}", path.display())]
    Write {
        /// Target being installed.
        target: String,
        /// Final path of the binary.
        path: PathBuf,
        /// Underlying filesystem error.
        source: std::io::Error,
    },
    /// Writing failed and the previous binary could not be restored.
    #[error(
        "failed to install {target} ({source}) and failed to restore the previous binary from {}: {rollback}",
        backup.display()
    )]
    CriticalRollback {
        /// Target being installed.
        target: String,
        /// Backup that could not be moved back into place.
        backup: PathBuf,
        /// Error that triggered the rollback.
        source: std::io::Error,
        /// Error raised by the rollback itself.
        rollback: std::io::Error,
    },
    /// Some targets were replaced before a later target failed.
    #[error("update partially applied (replaced: {}): {source}", applied.join(", "))]
    PartiallyApplied {
        /// Targets whose new binary is already in place.
        applied: Vec<String>,
        /// Failure of the first target that was not applied.
        source: Box<UpdaterError>,
    },
    /// The configured trust anchor is not a valid RSA public key.
    #[error("invalid trust anchor: {0}")]
    InvalidTrustAnchor(String),
    /// Failed to perform an I/O operation.
    #[error("filesystem operation failed: {0}")]
    Io(#[from] std::io::Error),
    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl UpdaterError {
    /// Helper for wrapping validation failures.
    pub fn validation(msg: impl Into<String>) -> Self {
        UpdaterError::Other(msg.into())
    }

    /// Returns the rollback failure if this error (or the failure it wraps)
    /// left the installation without a restored binary.
    pub fn rollback_error(&self) -> Option<&std::io::Error> {
        match self {
            UpdaterError::CriticalRollback { rollback, .. } => Some(rollback),
            UpdaterError::PartiallyApplied { source, .. } => source.rollback_error(),
            _ => None,
        }
    }

    /// Whether the installation may be unusable after this error.
    pub fn is_critical(&self) -> bool {
        self.rollback_error().is_some()
    }
}
