use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix of detached signature files.
pub const SIGNATURE_SUFFIX: &str = ".sig";

/// One binary that is replaced during an update.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateTarget(String);

impl UpdateTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// File names accepted for the binary payload.
    pub fn binary_names(&self) -> [String; 2] {
        [self.0.clone(), format!("{}.exe", self.0)]
    }

    /// File names accepted for the detached signature.
    pub fn signature_names(&self) -> [String; 2] {
        self.binary_names()
            .map(|name| format!("{name}{SIGNATURE_SUFFIX}"))
    }
}

impl fmt::Display for UpdateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UpdateTarget {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Ordered list of binaries processed by a single update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdatePlan(Vec<UpdateTarget>);

impl UpdatePlan {
    pub fn new(targets: impl IntoIterator<Item = UpdateTarget>) -> Self {
        Self(targets.into_iter().collect())
    }

    pub fn targets(&self) -> &[UpdateTarget] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for UpdatePlan {
    /// The daemon first, then the client that ships next to it.
    fn default() -> Self {
        Self::new(["noded", "nodec"].map(UpdateTarget::from))
    }
}
