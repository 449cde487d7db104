use node_updater::UpdaterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    /// The daemon was assembled without a capability it needs.
    #[error("invalid daemon configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Updater(#[from] UpdaterError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DaemonResult<T> = Result<T, DaemonError>;
