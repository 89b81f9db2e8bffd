//! Mount helper orchestration.
//!
//! Turns a volume into an `s3fs` invocation, runs it through a
//! [`ProcessRunner`] and maps the outcome onto [`HelperError`]s. The driver
//! only calls in here on the 0→1 and 1→0 reference count edges.

mod command;
mod runner;

use std::path::Path;

use s3vol_shared::errors::{HelperError, S3volError, S3volResult};

use crate::volumes::Volume;

pub use command::{CommandSpec, HelperConfig, mount_command, unmount_command};
pub use runner::{CommandOutput, ProcessRunner, TokioProcessRunner};

/// Mount the volume's bucket on its mount point.
pub async fn mount_volume(
    runner: &dyn ProcessRunner,
    config: &HelperConfig,
    volume: &Volume,
) -> S3volResult<()> {
    let spec = mount_command(volume, config);
    let out = runner.run(&spec).await.map_err(|source| {
        S3volError::helper(
            &volume.name,
            HelperError::Spawn {
                program: spec.program.clone(),
                source,
            },
        )
    })?;

    if !out.is_success() {
        return Err(S3volError::helper(
            &volume.name,
            HelperError::MountFailed {
                program: spec.program,
                code: out.code,
                output: out.output,
            },
        ));
    }

    tracing::debug!(volume = %volume.name, output = %out.output, "Mount helper succeeded");
    Ok(())
}

/// Run the unmount program against the volume's mount point.
///
/// Does not inspect the mount point; see [`verify_unmounted`].
pub async fn unmount_volume(
    runner: &dyn ProcessRunner,
    config: &HelperConfig,
    volume: &Volume,
) -> S3volResult<()> {
    let spec = unmount_command(&volume.mount_point, config);
    let out = runner.run(&spec).await.map_err(|source| {
        S3volError::helper(
            &volume.name,
            HelperError::Spawn {
                program: spec.program.clone(),
                source,
            },
        )
    })?;

    if !out.is_success() {
        return Err(S3volError::helper(
            &volume.name,
            HelperError::UnmountFailed {
                program: spec.program,
                code: out.code,
                output: out.output,
            },
        ));
    }
    Ok(())
}

/// Check that nothing is left in a mount point after unmounting.
///
/// Leftover entries mean the filesystem was not really torn down.
pub async fn verify_unmounted(name: &str, mount_point: &Path) -> S3volResult<()> {
    let read_err = |e: std::io::Error| S3volError::resource("read mount point", mount_point, e);

    let mut dir = tokio::fs::read_dir(mount_point).await.map_err(read_err)?;
    let mut entries = 0;
    while dir.next_entry().await.map_err(read_err)?.is_some() {
        entries += 1;
    }

    if entries > 0 {
        return Err(S3volError::helper(
            name,
            HelperError::Verification {
                mount_point: mount_point.to_path_buf(),
                entries,
            },
        ));
    }
    Ok(())
}
