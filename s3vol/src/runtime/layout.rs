use s3vol_shared::errors::{S3volError, S3volResult};
use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

/// Directory structure constants
pub mod dirs {
    /// Per-volume mount points live here
    pub const VOLUMES_DIR: &str = "volumes";

    /// Registry state file and lock
    pub const STATE_DIR: &str = "state";

    /// Registry state file name
    pub const STATE_FILE: &str = "s3fs-state.json";

    /// Lock file guarding the state directory
    pub const LOCK_FILE: &str = ".lock";
}

/// Permission bits for volume and state directories.
pub const DIR_MODE: u32 = 0o700;

/// Permission bits for the state file.
pub const FILE_MODE: u32 = 0o600;

// ============================================================================
// FILESYSTEM LAYOUT (base directory)
// ============================================================================

/// Paths used by the driver under one base directory.
///
/// ```text
/// {base}/
/// ├── volumes/
/// │   └── {volume-name}/     # mount point, created with the volume
/// └── state/
///     ├── .lock              # held by the running plugin
///     └── s3fs-state.json    # registry snapshot
/// ```
#[derive(Clone, Debug)]
pub struct FilesystemLayout {
    base_dir: PathBuf,
}

impl FilesystemLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Root of all mount points: {base}/volumes
    pub fn volumes_dir(&self) -> PathBuf {
        self.base_dir.join(dirs::VOLUMES_DIR)
    }

    /// Mount point of one volume: {base}/volumes/{name}
    ///
    /// The name must already be validated as a single path component.
    pub fn volume_dir(&self, name: &str) -> PathBuf {
        self.volumes_dir().join(name)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.base_dir.join(dirs::STATE_DIR)
    }

    /// Registry snapshot: {base}/state/s3fs-state.json
    pub fn state_file(&self) -> PathBuf {
        self.state_dir().join(dirs::STATE_FILE)
    }

    /// Initialize the filesystem structure.
    ///
    /// Creates the volumes and state directories with owner-only permissions.
    pub fn prepare(&self) -> S3volResult<()> {
        create_private_dir(&self.volumes_dir())?;
        create_private_dir(&self.state_dir())?;
        Ok(())
    }
}

/// Recursively create `path` with [`DIR_MODE`] permissions.
pub fn create_private_dir(path: &Path) -> S3volResult<()> {
    DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(path)
        .map_err(|e| S3volError::resource("create directory", path, e))
}

/// [`create_private_dir`] without blocking the async runtime.
pub async fn create_private_dir_async(path: &Path) -> S3volResult<()> {
    tokio::fs::DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(path)
        .await
        .map_err(|e| S3volError::resource("create directory", path, e))
}
