use std::path::PathBuf;

use clap::Parser;
use s3vol::{DriverOptions, HelperConfig};
use s3vol_shared::constants::{envs, helper, paths};

/// s3fs volume plugin for Docker
#[derive(Parser, Debug)]
#[command(name = "s3vol-plugin", author, version, about, long_about = None)]
pub struct Cli {
    /// Base directory for volume mount points and plugin state
    #[arg(long, env = envs::BASE_PATH, default_value = paths::DEFAULT_BASE_PATH)]
    pub base_path: PathBuf,

    /// Unix socket to serve the plugin API on
    #[arg(long, env = envs::SOCKET, default_value = paths::DEFAULT_UNIX_SOCKET)]
    pub socket: PathBuf,

    /// Enable debug logging (accepts 1, t, T, TRUE, true, True)
    #[arg(
        long,
        env = envs::DEBUG,
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = parse_debug
    )]
    pub debug: bool,

    /// Also write daily-rotated log files into this directory
    #[arg(long, env = envs::LOG_DIR)]
    pub log_dir: Option<PathBuf>,

    /// Program used to mount buckets
    #[arg(long, env = envs::MOUNT_PROGRAM, default_value = helper::MOUNT_PROGRAM)]
    pub mount_program: String,

    /// Program used to unmount buckets
    #[arg(long, env = envs::UNMOUNT_PROGRAM, default_value = helper::UNMOUNT_PROGRAM)]
    pub unmount_program: String,
}

impl Cli {
    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            base_path: self.base_path.clone(),
            helper: HelperConfig {
                mount_program: self.mount_program.clone(),
                unmount_program: self.unmount_program.clone(),
            },
        }
    }
}

/// Anything that is not a recognised true value disables debug logging.
fn parse_debug(value: &str) -> Result<bool, String> {
    Ok(s3vol::util::parse_bool(value).unwrap_or(false))
}
