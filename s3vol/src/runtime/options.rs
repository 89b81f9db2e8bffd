//! Configuration for the volume driver.

use std::path::PathBuf;

use s3vol_shared::constants::paths;
use serde::{Deserialize, Serialize};

use crate::helper::HelperConfig;

use super::layout::FilesystemLayout;

/// Options used to open a [`VolumeDriver`](crate::VolumeDriver).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverOptions {
    /// Directory holding `volumes/` and `state/`.
    ///
    /// Default: /mnt (inside the plugin rootfs)
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,

    /// External programs used to mount and unmount buckets.
    #[serde(default)]
    pub helper: HelperConfig,
}

fn default_base_path() -> PathBuf {
    PathBuf::from(paths::DEFAULT_BASE_PATH)
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            helper: HelperConfig::default(),
        }
    }
}

impl DriverOptions {
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Default::default()
        }
    }

    pub fn layout(&self) -> FilesystemLayout {
        FilesystemLayout::new(self.base_path.clone())
    }
}
