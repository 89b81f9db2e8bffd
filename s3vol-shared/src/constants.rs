//! Shared constants for the s3vol plugin.

/// Defaults for filesystem locations.
pub mod paths {
    /// Base path inside the plugin rootfs.
    pub const DEFAULT_BASE_PATH: &str = "/mnt";

    /// Unix socket Docker discovers the plugin on.
    pub const DEFAULT_UNIX_SOCKET: &str = "/run/docker/plugins/s3fs.sock";
}

/// Option keys understood at volume creation.
pub mod options {
    /// Backend bucket name (required)
    pub const BUCKET: &str = "bucket";

    /// Access key id, must be paired with [`SECRET_ACCESS_KEY`]
    pub const ACCESS_KEY_ID: &str = "access_key_id";

    /// Secret access key, must be paired with [`ACCESS_KEY_ID`]
    pub const SECRET_ACCESS_KEY: &str = "secret_access_key";

    /// Dropped at parse time, s3fs misbehaves when run with it
    pub const DEBUG: &str = "debug";
}

/// External helper programs and their environment.
pub mod helper {
    /// Default FUSE mount helper
    pub const MOUNT_PROGRAM: &str = "s3fs";

    /// Default unmount program
    pub const UNMOUNT_PROGRAM: &str = "umount";

    /// Environment variable s3fs reads the access key id from
    pub const ENV_ACCESS_KEY_ID: &str = "AWSACCESSKEYID";

    /// Environment variable s3fs reads the secret access key from
    pub const ENV_SECRET_ACCESS_KEY: &str = "AWSSECRETACCESSKEY";
}

pub mod envs {
    pub const DEBUG: &str = "DEBUG";
    pub const BASE_PATH: &str = "S3VOL_BASE_PATH";
    pub const SOCKET: &str = "S3VOL_SOCKET";
    pub const LOG_DIR: &str = "S3VOL_LOG_DIR";
    pub const MOUNT_PROGRAM: &str = "S3VOL_MOUNT_PROGRAM";
    pub const UNMOUNT_PROGRAM: &str = "S3VOL_UNMOUNT_PROGRAM";
}

/// Docker plugin protocol constants
pub mod plugin {
    /// Content type returned on every plugin response
    pub const CONTENT_TYPE: &str = "application/vnd.docker.plugins.v1+json";

    /// Subsystem advertised during activation
    pub const IMPLEMENTS_VOLUME_DRIVER: &str = "VolumeDriver";
}
