use crate::error::{DaemonError, DaemonResult};
use clap::Parser;
use node_updater::{
    UpdatePlan, UpdateTarget, UpdaterConfig, DEFAULT_MAX_ARCHIVE_BYTES, DEFAULT_PRODUCT,
    DEFAULT_RELEASE_URL,
};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Version of the running build, compared against release tags.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command-line arguments for the node daemon
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Node daemon", long_about = None)]
pub struct DaemonArgs {
    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Address the HTTP API listens on
    #[arg(long, env = "NODED_BIND", default_value = "127.0.0.1:9980")]
    pub bind: SocketAddr,

    /// Release index queried for updates
    #[arg(long, env = "NODED_RELEASE_URL", default_value = DEFAULT_RELEASE_URL)]
    pub release_url: String,

    /// Directory holding the binaries to update (defaults to the executable's directory)
    #[arg(long, env = "NODED_INSTALL_DIR")]
    pub install_dir: Option<PathBuf>,

    /// Binaries replaced by an update, in order
    #[arg(long = "target", value_delimiter = ',', default_values_t = default_targets())]
    pub targets: Vec<String>,

    /// Product prefix of release archive names
    #[arg(long, default_value = DEFAULT_PRODUCT)]
    pub product: String,

    /// Largest release archive kept in memory, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_ARCHIVE_BYTES)]
    pub max_archive_bytes: usize,
}

fn default_targets() -> Vec<String> {
    UpdatePlan::default()
        .targets()
        .iter()
        .map(|target| target.name().to_string())
        .collect()
}

impl DaemonArgs {
    /// Updater settings derived from the arguments.
    pub fn updater_config(&self) -> DaemonResult<UpdaterConfig> {
        let plan = UpdatePlan::new(
            self.targets
                .iter()
                .map(|name| name.trim())
                .filter(|name| !name.is_empty())
                .map(UpdateTarget::from),
        );
        if plan.is_empty() {
            return Err(DaemonError::Config("at least one update target is required".into()));
        }
        if let Some(bad) = plan
            .targets()
            .iter()
            .find(|target| target.name().contains(['/', '\\']))
        {
            return Err(DaemonError::Config(format!(
                "update target {bad} must be a file name, not a path"
            )));
        }

        let config = match &self.install_dir {
            Some(dir) => UpdaterConfig::new(VERSION, dir),
            None => UpdaterConfig::for_running_executable(VERSION)?,
        };
        Ok(config.with_product(self.product.clone()).with_plan(plan))
    }
}
