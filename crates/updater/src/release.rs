use crate::error::{Result, UpdaterError};
use crate::version::strip_marker;
use serde::{Deserialize, Serialize};

/// Subset of the release index document relevant to updating.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Release {
    /// Release tag, e.g. `v1.3.0`.
    #[serde(rename = "tag_name", default)]
    pub tag: String,
    /// Files published with the release, in index order.
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// One downloadable file attached to a release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Asset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

impl Release {
    /// A release with neither a tag nor assets carries no information.
    pub fn is_empty(&self) -> bool {
        self.tag.is_empty() && self.assets.is_empty()
    }

    /// The tag without its leading marker character (`v1.3.0`, `V1.3.0`).
    pub fn version(&self) -> &str {
        strip_marker(&self.tag)
    }

    /// File name of the archive published for `platform`.
    pub fn asset_name(&self, product: &str, platform: &Platform) -> String {
        format!(
            "{product}-{}-{}-{}.zip",
            self.tag, platform.os, platform.arch
        )
    }

    /// Find the archive for `platform`. Only an exact name match is accepted.
    pub fn resolve_asset(&self, product: &str, platform: &Platform) -> Result<&Asset> {
        let expected = self.asset_name(product, platform);
        self.assets
            .iter()
            .find(|asset| asset.name == expected)
            .ok_or(UpdaterError::AssetNotFound(expected))
    }
}

/// Operating system and architecture, spelled the way release archives are named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Platform of the running build.
    pub fn current() -> Self {
        Self::from_rust_target(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Map Rust target names (`macos`, `x86_64`, ...) to release names
    /// (`darwin`, `amd64`, ...). Unknown names pass through unchanged.
    pub fn from_rust_target(os: &str, arch: &str) -> Self {
        let os = match os {
            "macos" => "darwin",
            other => other,
        };
        let arch = match arch {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        };
        Self::new(os, arch)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}
