//! State directory lock to prevent two plugin processes sharing one registry.
//!
//! Uses `flock` so the lock disappears with the process, even on a crash.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use s3vol_shared::errors::{S3volError, S3volResult};

use super::layout::{create_private_dir, dirs};

/// Guard holding an exclusive lock on the state directory.
///
/// Released when dropped or when the process exits.
#[derive(Debug)]
pub struct StateLock {
    file: File,
    path: PathBuf,
}

impl StateLock {
    /// Acquire the lock on `state_dir`, failing immediately if it is taken.
    pub fn acquire(state_dir: &Path) -> S3volResult<Self> {
        create_private_dir(state_dir)?;

        let lock_path = state_dir.join(dirs::LOCK_FILE);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| S3volError::resource("open lock file", &lock_path, e))?;

        use std::os::unix::io::AsRawFd;
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };

        if result != 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::WouldBlock {
                return Err(S3volError::Lock(format!(
                    "another s3vol plugin is already using state directory {}",
                    state_dir.display()
                )));
            }
            return Err(S3volError::resource("lock", &lock_path, err));
        }

        tracing::debug!(lock_path = %lock_path.display(), "Acquired state lock");

        Ok(StateLock {
            file,
            path: lock_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        use std::os::unix::io::AsRawFd;
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }

        tracing::debug!(lock_path = %self.path.display(), "Released state lock");
    }
}
