//! Signed self-update for the node daemon and its companion binaries.
//!
//! The updater asks the release index for the latest release, compares it
//! with the running build, and on request downloads the platform archive,
//! extracts each binary together with its detached signature, verifies the
//! signature against a fixed RSA trust anchor and swaps the binary in place.
//!
//! ```ignore
//! use node_updater::{GithubReleaseClient, TrustAnchor, Updater, UpdaterConfig};
//!
//! # async fn demo() -> node_updater::Result<()> {
//! let source = GithubReleaseClient::builder().build()?;
//! let config = UpdaterConfig::for_running_executable(env!("CARGO_PKG_VERSION"))?;
//! let updater = Updater::new(source, TrustAnchor::embedded()?, config);
//!
//! if updater.check_for_update().await?.available {
//!     updater.apply_latest().await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Each binary is replaced atomically, but the set is not: when a later
//! binary fails, binaries already replaced stay in place and the error is
//! reported as [`UpdaterError::PartiallyApplied`].

mod apply;
mod archive;
mod error;
mod fetcher;
mod plan;
mod release;
mod trust;
mod updater;
pub mod version;

pub use apply::{backup_path, install_binary};
pub use archive::{ExtractedUpdate, ReleaseArchive};
pub use error::{Result, UpdaterError};
pub use fetcher::{
    GithubReleaseClient, GithubReleaseClientBuilder, ReleaseSource, DEFAULT_MAX_ARCHIVE_BYTES,
    DEFAULT_RELEASE_URL, RELEASE_MEDIA_TYPE,
};
pub use plan::{UpdatePlan, UpdateTarget, SIGNATURE_SUFFIX};
pub use release::{Asset, Platform, Release};
pub use reqwest::Url;
pub use trust::{TrustAnchor, RELEASE_SIGNING_KEY_PEM};
pub use updater::{
    AppliedTarget, ApplyReport, UpdateInfo, UpdatePhase, Updater, UpdaterConfig, DEFAULT_PRODUCT,
};
pub use version::is_newer;
