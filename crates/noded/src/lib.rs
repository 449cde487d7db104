//! HTTP surface of the node daemon.
//!
//! Exposes the build version, the self-update check and apply endpoints
//! backed by [`node_updater`], and a stop endpoint that shuts the server down
//! gracefully once its response has been sent.

pub mod api;
pub mod config;
pub mod error;
pub mod shutdown;

pub use api::{apply_error_message, ApiBuilder, ApiError, DaemonVersion};
pub use config::{DaemonArgs, VERSION};
pub use error::{DaemonError, DaemonResult};
pub use shutdown::{ShutdownSignal, ShutdownTrigger};
