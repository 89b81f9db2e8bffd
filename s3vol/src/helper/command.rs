//! Command building for the mount and unmount helpers.
//!
//! Both builders are pure: they only describe the subprocess. Running it is
//! the job of a [`ProcessRunner`](super::ProcessRunner).

use std::fmt;
use std::path::Path;

use s3vol_shared::constants::helper as consts;
use serde::{Deserialize, Serialize};

use crate::volumes::Volume;

/// Programs used for mounting and unmounting buckets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperConfig {
    /// FUSE mount helper, invoked as `<program> <bucket> <mount point> -o ...`
    ///
    /// Default: s3fs
    #[serde(default = "default_mount_program")]
    pub mount_program: String,

    /// Unmount program, invoked as `<program> <mount point>`
    ///
    /// Default: umount
    #[serde(default = "default_unmount_program")]
    pub unmount_program: String,
}

fn default_mount_program() -> String {
    consts::MOUNT_PROGRAM.to_string()
}

fn default_unmount_program() -> String {
    consts::UNMOUNT_PROGRAM.to_string()
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            mount_program: default_mount_program(),
            unmount_program: default_unmount_program(),
        }
    }
}

/// A subprocess to run: program, arguments and extra environment.
///
/// The child inherits the parent environment with `env` layered on top.
/// `Debug` hides environment values since they carry credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Value of an environment override, if set.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &env_keys)
            .finish()
    }
}

/// Mount command for a volume.
///
/// `s3fs <bucket> <mount point> [-o <option>]...`, with credentials in the
/// environment so they never show up in process listings.
pub fn mount_command(volume: &Volume, config: &HelperConfig) -> CommandSpec {
    let mut cmd = CommandSpec::new(&config.mount_program)
        .arg(&volume.bucket)
        .arg(volume.mount_point.to_string_lossy());

    if let Some(creds) = &volume.credentials {
        cmd = cmd
            .env(consts::ENV_ACCESS_KEY_ID, &creds.access_key_id)
            .env(consts::ENV_SECRET_ACCESS_KEY, &creds.secret_access_key);
    }

    for option in &volume.options {
        cmd = cmd.arg("-o").arg(option);
    }

    cmd
}

/// Unmount command for a mount point, run directly without a shell.
pub fn unmount_command(mount_point: &Path, config: &HelperConfig) -> CommandSpec {
    CommandSpec::new(&config.unmount_program).arg(mount_point.to_string_lossy())
}
