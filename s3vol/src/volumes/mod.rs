//! Volume records, create-option parsing and the in-memory registry.
//!
//! # Overview
//!
//! - **Volume**: persisted record (bucket, s3fs flags, credentials, ref count)
//! - **VolumeSettings**: parsed `docker volume create -o` options
//! - **VolumeRegistry**: name → record map owned by the driver
//! - **VolumeInfo**: public snapshot returned by queries

mod options;
mod registry;
mod volume;

pub use options::{VolumeSettings, validate_name};
pub use registry::VolumeRegistry;
pub use volume::{Credentials, Volume, VolumeInfo};
