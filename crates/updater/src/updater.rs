use crate::{
    apply::install_binary,
    archive::{ExtractedUpdate, ReleaseArchive},
    error::{Result, UpdaterError},
    fetcher::ReleaseSource,
    plan::{UpdatePlan, UpdateTarget},
    release::{Platform, Release},
    trust::TrustAnchor,
    version::is_newer,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::{watch, Mutex};
use tokio::task;

/// Product name used in release archive names.
pub const DEFAULT_PRODUCT: &str = "Node";

/// Static settings of an [`Updater`].
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Prefix of release archive names (`<product>-<tag>-<os>-<arch>.zip`).
    pub product: String,
    /// Version of the running build.
    pub current_version: String,
    /// Directory holding the binaries listed in `plan`.
    pub install_dir: PathBuf,
    pub plan: UpdatePlan,
    pub platform: Platform,
}

impl UpdaterConfig {
    pub fn new(current_version: impl Into<String>, install_dir: impl Into<PathBuf>) -> Self {
        Self {
            product: DEFAULT_PRODUCT.to_string(),
            current_version: current_version.into(),
            install_dir: install_dir.into(),
            plan: UpdatePlan::default(),
            platform: Platform::current(),
        }
    }

    /// Configuration for binaries installed next to the running executable.
    pub fn for_running_executable(current_version: impl Into<String>) -> Result<Self> {
        let exe = std::env::current_exe()?;
        let dir = exe
            .parent()
            .ok_or_else(|| UpdaterError::validation("executable has no parent directory"))?;
        Ok(Self::new(current_version, dir))
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = product.into();
        self
    }

    pub fn with_plan(mut self, plan: UpdatePlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }
}

/// Answer of an update check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateInfo {
    pub available: bool,
    /// Latest release version, without the tag marker.
    pub version: String,
}

/// A binary that was replaced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppliedTarget {
    pub target: UpdateTarget,
    pub path: PathBuf,
}

/// Result of a fully applied update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplyReport {
    pub version: String,
    pub applied: Vec<AppliedTarget>,
}

/// Where the most recent check or apply stands.
///
/// Failures are terminal; the caller checks again before retrying.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum UpdatePhase {
    Idle,
    Fetching,
    UpToDate { version: String },
    UpdateAvailable { version: String },
    FetchFailed { message: String },
    Resolving { version: String },
    Downloading { url: String },
    Extracting,
    Verifying { target: String },
    Applying { target: String },
    Applied { version: String },
    Failed { message: String },
    PartiallyApplied { applied: Vec<String>, message: String },
    CriticalFailure { message: String },
}

/// Checks for and applies signed releases of the node binaries.
pub struct Updater<S> {
    source: S,
    trust_anchor: TrustAnchor,
    config: UpdaterConfig,
    apply_lock: Mutex<()>,
    phase: watch::Sender<UpdatePhase>,
}

impl<S> Updater<S>
where
    S: ReleaseSource,
{
    /// Create a new updater. Every binary must be signed by `trust_anchor`.
    pub fn new(source: S, trust_anchor: TrustAnchor, config: UpdaterConfig) -> Self {
        let (phase, _) = watch::channel(UpdatePhase::Idle);
        Self {
            source,
            trust_anchor,
            config,
            apply_lock: Mutex::new(()),
            phase,
        }
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Current phase of the last check or apply.
    pub fn phase(&self) -> UpdatePhase {
        self.phase.borrow().clone()
    }

    /// Follow phase changes.
    pub fn subscribe(&self) -> watch::Receiver<UpdatePhase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: UpdatePhase) {
        tracing::debug!(?phase, "update phase changed");
        self.phase.send_replace(phase);
    }

    /// Record a phase from outside an apply. While an apply holds the lock
    /// the phase belongs to it and is left unchanged.
    fn set_check_phase(&self, phase: UpdatePhase) {
        match self.apply_lock.try_lock() {
            Ok(_guard) => self.set_phase(phase),
            Err(_) => tracing::debug!(?phase, "apply in progress, phase left unchanged"),
        }
    }

    /// Fetch the latest release, recording the outcome in the phase unless
    /// an apply is in progress.
    pub async fn latest_release(&self) -> Result<Release> {
        self.fetch_release(false).await
    }

    async fn fetch_release(&self, locked: bool) -> Result<Release> {
        let report = |phase| {
            if locked {
                self.set_phase(phase)
            } else {
                self.set_check_phase(phase)
            }
        };
        report(UpdatePhase::Fetching);
        match self.source.fetch_latest_release().await {
            Ok(release) => Ok(release),
            Err(err) => {
                report(UpdatePhase::FetchFailed {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Determine whether the latest release is newer than the running build.
    pub async fn check_for_update(&self) -> Result<UpdateInfo> {
        let release = self.latest_release().await?;
        let version = release.version().to_string();
        let available = is_newer(&self.config.current_version, &version);

        if available {
            tracing::info!(current = %self.config.current_version, latest = %version, "update available");
            self.set_check_phase(UpdatePhase::UpdateAvailable {
                version: version.clone(),
            });
        } else {
            self.set_check_phase(UpdatePhase::UpToDate {
                version: version.clone(),
            });
        }
        Ok(UpdateInfo { available, version })
    }

    /// Fetch the latest release and install it. Nothing stops this from
    /// reinstalling the running version; check first.
    pub async fn apply_latest(&self) -> Result<ApplyReport> {
        let _guard = self.apply_lock.lock().await;
        let release = self.fetch_release(true).await?;
        self.apply_locked(&release).await
    }

    /// Install the binaries of `release`.
    pub async fn apply_release(&self, release: &Release) -> Result<ApplyReport> {
        let _guard = self.apply_lock.lock().await;
        self.apply_locked(release).await
    }

    async fn apply_locked(&self, release: &Release) -> Result<ApplyReport> {
        let result = self.run_apply(release).await;
        match &result {
            Ok(report) => {
                tracing::info!(version = %report.version, "update applied");
                self.set_phase(UpdatePhase::Applied {
                    version: report.version.clone(),
                });
            }
            Err(err) if err.is_critical() => {
                tracing::error!(error = %err, "update left the installation without a usable binary");
                self.set_phase(UpdatePhase::CriticalFailure {
                    message: err.to_string(),
                });
            }
            Err(UpdaterError::PartiallyApplied { applied, source }) => {
                tracing::warn!(?applied, error = %source, "update partially applied, replaced binaries are kept");
                self.set_phase(UpdatePhase::PartiallyApplied {
                    applied: applied.clone(),
                    message: source.to_string(),
                });
            }
            Err(err) => {
                tracing::warn!(error = %err, "update failed");
                self.set_phase(UpdatePhase::Failed {
                    message: err.to_string(),
                });
            }
        }
        result
    }

    async fn run_apply(&self, release: &Release) -> Result<ApplyReport> {
        let version = release.version().to_string();
        self.set_phase(UpdatePhase::Resolving {
            version: version.clone(),
        });
        let asset = release.resolve_asset(&self.config.product, &self.config.platform)?;

        self.set_phase(UpdatePhase::Downloading {
            url: asset.download_url.clone(),
        });
        let bytes = self.source.download_archive(&asset.download_url).await?;

        self.set_phase(UpdatePhase::Extracting);
        let plan = self.config.plan.clone();
        let updates = task::spawn_blocking(move || {
            ReleaseArchive::from_bytes(bytes)?.extract_plan(&plan)
        })
        .await
        .map_err(join_error)??;

        // Targets are applied one by one; a replaced binary is not reverted
        // when a later target fails.
        let mut applied = Vec::with_capacity(updates.len());
        for update in updates {
            match self.apply_target(update).await {
                Ok(target) => applied.push(target),
                Err(err) if applied.is_empty() => return Err(err),
                Err(err) => {
                    return Err(UpdaterError::PartiallyApplied {
                        applied: applied
                            .iter()
                            .map(|done: &AppliedTarget| done.target.to_string())
                            .collect(),
                        source: Box::new(err),
                    })
                }
            }
        }

        Ok(ApplyReport { version, applied })
    }

    async fn apply_target(&self, update: ExtractedUpdate) -> Result<AppliedTarget> {
        self.set_phase(UpdatePhase::Verifying {
            target: update.target.to_string(),
        });
        let anchor = self.trust_anchor.clone();
        let update = task::spawn_blocking(move || {
            anchor
                .verify(&update.target, &update.binary, &update.signature)
                .map(|()| update)
        })
        .await
        .map_err(join_error)??;

        self.set_phase(UpdatePhase::Applying {
            target: update.target.to_string(),
        });
        let path = self.config.install_dir.join(&update.file_name);
        let target = update.target.clone();
        let target_path = path.clone();
        task::spawn_blocking(move || install_binary(&update.target, &update.binary, &target_path))
            .await
            .map_err(join_error)??;

        tracing::info!(binary = %target, path = %path.display(), "binary replaced");
        Ok(AppliedTarget { target, path })
    }

    /// Path a target's binary is installed at for the running platform.
    pub fn installed_path(&self, target: &UpdateTarget) -> PathBuf {
        let name = if self.config.platform.os == "windows" {
            format!("{}.exe", target.name())
        } else {
            target.name().to_string()
        };
        self.install_dir().join(name)
    }

    pub fn install_dir(&self) -> &Path {
        &self.config.install_dir
    }
}

fn join_error(err: task::JoinError) -> UpdaterError {
    UpdaterError::Other(format!("task join error: {err}"))
}
