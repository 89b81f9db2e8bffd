//! Volume lifecycle controller.
//!
//! [`VolumeDriver`] serializes every create/mount/unmount/remove behind one
//! lock held for the whole operation, helper subprocess and state write
//! included. Queries take the shared side of the same lock, so they never see
//! a half-applied change.
//!
//! ```text
//!           create()                         remove() [ref_count == 0]
//!   (none) --------> UNMOUNTED (ref_count 0) -----------------------> (none)
//!                        |  ^
//!   mount() 0→1, s3fs    |  | unmount() 1→0, umount + verify
//!                        v  |
//!                   MOUNTED (ref_count ≥ 1)
//!                        ↺ mount()/unmount() in between, no helper call
//! ```

mod lifecycle;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

use s3vol_shared::errors::{S3volError, S3volResult};
use s3vol_shared::protocol::{Capability, Scope};

use crate::helper::{HelperConfig, ProcessRunner, TokioProcessRunner};
use crate::runtime::layout::{FilesystemLayout, create_private_dir};
use crate::runtime::lock::StateLock;
use crate::runtime::options::DriverOptions;
use crate::store::{JsonStateStore, StateSnapshot, StateStore};
use crate::volumes::{VolumeInfo, VolumeRegistry};

/// Reference-counting s3fs volume driver.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct VolumeDriver {
    inner: Arc<DriverInner>,
}

struct DriverInner {
    layout: FilesystemLayout,
    helper: HelperConfig,
    runner: Arc<dyn ProcessRunner>,
    store: Arc<dyn StateStore>,
    registry: RwLock<VolumeRegistry>,
    _lock: Option<StateLock>,
}

impl VolumeDriver {
    /// Open the driver on disk: lock the state directory, load the state file
    /// and run helpers as real subprocesses.
    ///
    /// # Errors
    ///
    /// Fails if the directories cannot be created, another plugin holds the
    /// state lock, or the state file is unreadable or corrupt.
    pub fn open(options: DriverOptions) -> S3volResult<Self> {
        let layout = options.layout();
        layout.prepare()?;
        let lock = StateLock::acquire(&layout.state_dir())?;

        tracing::info!(
            volumes = %layout.volumes_dir().display(),
            state = %layout.state_file().display(),
            "Initialized driver"
        );

        let store = Arc::new(JsonStateStore::new(layout.state_file()));
        Self::build(
            layout,
            options.helper,
            Arc::new(TokioProcessRunner),
            store,
            Some(lock),
        )
    }

    /// Create a driver with an injected process runner and state store.
    ///
    /// No state lock is taken; the caller owns exclusivity of `store`.
    pub fn with_parts(
        options: DriverOptions,
        runner: Arc<dyn ProcessRunner>,
        store: Arc<dyn StateStore>,
    ) -> S3volResult<Self> {
        let layout = options.layout();
        layout.prepare()?;
        Self::build(layout, options.helper, runner, store, None)
    }

    fn build(
        layout: FilesystemLayout,
        helper: HelperConfig,
        runner: Arc<dyn ProcessRunner>,
        store: Arc<dyn StateStore>,
        lock: Option<StateLock>,
    ) -> S3volResult<Self> {
        let registry = match store.load()? {
            Some(snapshot) => VolumeRegistry::from_volumes(snapshot.volumes),
            None => VolumeRegistry::new(),
        };

        for volume in registry.volumes() {
            if volume.is_mounted() {
                tracing::warn!(
                    volume = %volume.name,
                    ref_count = volume.ref_count,
                    "Volume was mounted before restart"
                );
            }
            if !volume.mount_point.is_dir() {
                tracing::warn!(
                    volume = %volume.name,
                    mount_point = %volume.mount_point.display(),
                    "Recreating missing mount point"
                );
                create_private_dir(&volume.mount_point)?;
            }
        }

        tracing::debug!(volumes = registry.volumes().count(), "Loaded registry");

        Ok(Self {
            inner: Arc::new(DriverInner {
                layout,
                helper,
                runner,
                store,
                registry: RwLock::new(registry),
                _lock: lock,
            }),
        })
    }

    pub fn layout(&self) -> &FilesystemLayout {
        &self.inner.layout
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// Public info for one volume.
    pub async fn get(&self, name: &str) -> S3volResult<VolumeInfo> {
        let registry = self.inner.registry.read().await;
        registry
            .get(name)
            .map(|v| v.info())
            .ok_or_else(|| not_found("get", name))
    }

    /// Mount point of one volume, mounted or not.
    pub async fn path(&self, name: &str) -> S3volResult<PathBuf> {
        let registry = self.inner.registry.read().await;
        registry
            .get(name)
            .map(|v| v.mount_point.clone())
            .ok_or_else(|| not_found("find path for", name))
    }

    /// All volumes, sorted by name.
    pub async fn list(&self) -> Vec<VolumeInfo> {
        self.inner.registry.read().await.list()
    }

    /// Volumes are backed by shared buckets, so they are visible cluster-wide.
    pub fn capabilities(&self) -> Capability {
        Capability {
            scope: Scope::Global,
        }
    }

    /// Write the registry to the state store.
    ///
    /// The write runs on the blocking pool. The in-memory registry stays
    /// authoritative, a failed write is only logged.
    async fn persist(&self, registry: &VolumeRegistry) {
        let snapshot = StateSnapshot::new(registry.to_volumes());
        let store = Arc::clone(&self.inner.store);

        match tokio::task::spawn_blocking(move || store.save(&snapshot)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Failed to save state"),
            Err(e) => tracing::error!(error = %e, "State save task failed"),
        }
    }
}

impl std::fmt::Debug for VolumeDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeDriver")
            .field("layout", &self.inner.layout)
            .field("helper", &self.inner.helper)
            .finish_non_exhaustive()
    }
}

fn not_found(action: &str, name: &str) -> S3volError {
    tracing::error!(
        volume = %name,
        "Failed to {} volume because it doesn't exist",
        action
    );
    S3volError::not_found(name)
}

#[cfg(test)]
mod tests;
