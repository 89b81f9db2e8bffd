//! Error types for the s3vol driver.
//!
//! Errors are grouped by what the caller can do about them:
//! - [`ValidationError`]: bad create request, nothing was changed
//! - [`HelperError`]: the external mount/unmount program failed
//! - the remaining [`S3volError`] variants cover lookups, conflicts,
//!   filesystem and persistence failures

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across all s3vol crates.
pub type S3volResult<T> = Result<T, S3volError>;

// ============================================================================
// Top-Level Error
// ============================================================================

/// Errors returned by volume lifecycle operations.
///
/// ```ignore
/// match driver.remove("data").await {
///     Err(S3volError::Busy { ref_count, .. }) => { /* still mounted */ }
///     Err(S3volError::NotFound { .. }) => { /* nothing to do */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Error)]
pub enum S3volError {
    /// Create request rejected before any state was touched.
    #[error("invalid volume request: {0}")]
    Validation(#[from] ValidationError),

    /// No volume with this name is registered.
    #[error("volume {name} not found")]
    NotFound { name: String },

    /// A volume with this name exists with different settings.
    #[error("volume {name} already exists with different options")]
    AlreadyExists { name: String },

    /// Volume is still referenced by running containers.
    #[error("volume {name} is mounted by {ref_count} containers")]
    Busy { name: String, ref_count: u32 },

    /// Filesystem operation on a volume directory failed.
    #[error("failed to {action} {}: {source}", path.display())]
    Resource {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// External mount helper failed.
    #[error("volume {name}: {source}")]
    Helper {
        name: String,
        #[source]
        source: HelperError,
    },

    /// State file could not be written.
    #[error("persistence: {0}")]
    Persistence(String),

    /// State file exists but cannot be decoded.
    #[error("corrupt state file {}: {reason}", path.display())]
    StateCorrupt { path: PathBuf, reason: String },

    /// Another plugin instance owns the state directory.
    #[error("lock: {0}")]
    Lock(String),
}

// ============================================================================
// Validation Errors (create options, user-fixable)
// ============================================================================

/// Problems with the options or name passed to create.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("'bucket' option required")]
    MissingBucket,

    #[error("'access_key_id' and 'secret_access_key' options must be used together")]
    CredentialPair,

    #[error("invalid volume name {0:?}")]
    InvalidName(String),
}

// ============================================================================
// Helper Errors (s3fs / umount subprocesses)
// ============================================================================

/// Failures of the external mount and unmount programs.
#[derive(Debug, Error)]
pub enum HelperError {
    /// Program could not be started at all.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Mount helper exited non-zero.
    #[error("{program} exited with {} ({output})", exit_label(*code))]
    MountFailed {
        program: String,
        code: Option<i32>,
        output: String,
    },

    /// Unmount program exited non-zero.
    #[error("{program} exited with {} ({output})", exit_label(*code))]
    UnmountFailed {
        program: String,
        code: Option<i32>,
        output: String,
    },

    /// Unmount succeeded but the mount point is not empty.
    #[error("after unmount {entries} files still exist in {}", mount_point.display())]
    Verification { mount_point: PathBuf, entries: usize },
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "signal".to_string(),
    }
}

// ============================================================================
// Convenience
// ============================================================================

impl S3volError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn resource(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Resource {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn helper(name: impl Into<String>, source: HelperError) -> Self {
        Self::Helper {
            name: name.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// The helper failure, if this error wraps one.
    pub fn helper_error(&self) -> Option<&HelperError> {
        match self {
            Self::Helper { source, .. } => Some(source),
            _ => None,
        }
    }
}
