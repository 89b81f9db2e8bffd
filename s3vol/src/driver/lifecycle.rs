//! Mutating operations. Each holds the registry write lock from start to end.

use std::collections::BTreeMap;
use std::path::PathBuf;

use s3vol_shared::errors::{S3volError, S3volResult};

use super::{VolumeDriver, not_found};
use crate::helper;
use crate::runtime::layout::create_private_dir_async;
use crate::volumes::{Volume, VolumeSettings, validate_name};

impl VolumeDriver {
    /// Register a new volume and reserve its mount point.
    ///
    /// Creating a name that already exists with identical options is a
    /// no-op; with different options it fails with
    /// [`S3volError::AlreadyExists`].
    ///
    /// # Errors
    ///
    /// - [`S3volError::Validation`]: bad name, missing bucket or half a
    ///   credential pair (nothing is changed)
    /// - [`S3volError::Resource`]: the mount point could not be created
    pub async fn create(&self, name: &str, opts: &BTreeMap<String, String>) -> S3volResult<()> {
        let mut registry = self.inner.registry.write().await;

        let settings = validate_name(name)
            .and_then(|_| VolumeSettings::parse(opts))
            .inspect_err(|e| tracing::error!(volume = %name, error = %e, "Rejected create"))?;

        if let Some(existing) = registry.get(name) {
            if existing.has_settings(&settings) {
                tracing::debug!(volume = %name, "Volume already exists with same options");
                return create_private_dir_async(&existing.mount_point).await;
            }
            tracing::error!(volume = %name, "Volume already exists with different options");
            return Err(S3volError::AlreadyExists {
                name: name.to_string(),
            });
        }

        let mount_point = self.inner.layout.volume_dir(name);
        create_private_dir_async(&mount_point).await.inspect_err(|e| {
            tracing::error!(
                volume = %name,
                mount_point = %mount_point.display(),
                error = %e,
                "Failed to create the volume mount path"
            )
        })?;

        tracing::info!(
            volume = %name,
            bucket = %settings.bucket,
            options = ?settings.options,
            "Created volume"
        );
        registry.insert(Volume::new(name, mount_point, settings));
        self.persist(&registry).await;
        Ok(())
    }

    /// Take a reference on a volume, mounting its bucket on the first one.
    ///
    /// Returns the mount point. `id` identifies the caller and is only logged.
    ///
    /// # Errors
    ///
    /// - [`S3volError::NotFound`]
    /// - [`S3volError::Helper`]: s3fs failed; the reference count is unchanged
    pub async fn mount(&self, name: &str, id: &str) -> S3volResult<PathBuf> {
        let mut registry = self.inner.registry.write().await;
        let volume = registry
            .get_mut(name)
            .ok_or_else(|| not_found("mount", name))?;

        if volume.ref_count == 0 {
            tracing::debug!(
                volume = %volume.name,
                bucket = %volume.bucket,
                mount_id = %id,
                "First volume mount, establishing connection to bucket"
            );
            helper::mount_volume(self.inner.runner.as_ref(), &self.inner.helper, volume)
                .await
                .inspect_err(|e| {
                    tracing::error!(volume = %name, error = %e, "Failed to mount volume")
                })?;
        }

        volume.ref_count = volume.ref_count.saturating_add(1);
        let mount_point = volume.mount_point.clone();
        tracing::debug!(volume = %name, mount_id = %id, ref_count = volume.ref_count, "Mounted");

        self.persist(&registry).await;
        Ok(mount_point)
    }

    /// Drop a reference on a volume, unmounting its bucket with the last one.
    ///
    /// The reference is released whatever the unmount program does, so the
    /// count is zero after the last unmount even when an error is returned.
    /// Extra unmounts at a reference count of zero are tolerated: the unmount
    /// program is still run and the count stays at zero.
    ///
    /// # Errors
    ///
    /// - [`S3volError::NotFound`]
    /// - [`S3volError::Helper`] with `UnmountFailed`/`Spawn`: the unmount
    ///   program failed, the bucket may still be mounted
    /// - [`S3volError::Helper`] with `Verification`: the unmount ran but the
    ///   mount point is not empty
    pub async fn unmount(&self, name: &str, id: &str) -> S3volResult<()> {
        let mut registry = self.inner.registry.write().await;
        let volume = registry
            .get_mut(name)
            .ok_or_else(|| not_found("unmount", name))?;

        if volume.ref_count > 1 {
            volume.ref_count -= 1;
            tracing::debug!(volume = %name, mount_id = %id, ref_count = volume.ref_count, "Unmounted");
            self.persist(&registry).await;
            return Ok(());
        }

        if volume.ref_count == 0 {
            tracing::warn!(volume = %name, mount_id = %id, "Unmount without outstanding mounts");
        }

        volume.ref_count = 0;
        let result = match helper::unmount_volume(
            self.inner.runner.as_ref(),
            &self.inner.helper,
            volume,
        )
        .await
        {
            Ok(()) => {
                tracing::debug!(volume = %name, mount_id = %id, "Last reference released, bucket unmounted");
                helper::verify_unmounted(&volume.name, &volume.mount_point)
                    .await
                    .inspect_err(|e| {
                        tracing::error!(volume = %name, error = %e, "Unmount verification failed")
                    })
            }
            Err(e) => {
                tracing::error!(volume = %name, error = %e, "Failed to unmount volume");
                Err(e)
            }
        };

        self.persist(&registry).await;
        result
    }

    /// Delete an unreferenced volume and its mount point.
    ///
    /// # Errors
    ///
    /// - [`S3volError::NotFound`]
    /// - [`S3volError::Busy`]: the volume is still mounted
    /// - [`S3volError::Resource`]: the mount point could not be removed,
    ///   e.g. it is not empty
    pub async fn remove(&self, name: &str) -> S3volResult<()> {
        let mut registry = self.inner.registry.write().await;
        let volume = registry.get(name).ok_or_else(|| not_found("remove", name))?;

        if volume.is_mounted() {
            tracing::error!(
                volume = %name,
                ref_count = volume.ref_count,
                "Can't remove volume because it is still mounted"
            );
            return Err(S3volError::Busy {
                name: name.to_string(),
                ref_count: volume.ref_count,
            });
        }

        match tokio::fs::remove_dir(&volume.mount_point).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    volume = %name,
                    mount_point = %volume.mount_point.display(),
                    "Mount point already gone"
                );
            }
            Err(e) => {
                tracing::error!(
                    volume = %name,
                    mount_point = %volume.mount_point.display(),
                    error = %e,
                    "Failed to remove the volume mount point"
                );
                return Err(S3volError::resource("remove mount point", &volume.mount_point, e));
            }
        }

        registry.remove(name);
        tracing::info!(volume = %name, "Removed volume");
        self.persist(&registry).await;
        Ok(())
    }
}
