//! s3vol - reference-counted s3fs volumes for Docker
//!
//! The [`VolumeDriver`] owns a registry of volumes, mounts a volume's bucket
//! with the external `s3fs` helper on first use and unmounts it when the last
//! container detaches. Registry state survives restarts through a
//! [`StateStore`].

pub mod driver;
pub mod helper;
pub mod runtime;
pub mod store;
pub mod util;
pub mod volumes;

pub use driver::VolumeDriver;
pub use helper::{CommandOutput, CommandSpec, HelperConfig, ProcessRunner, TokioProcessRunner};
pub use runtime::layout::FilesystemLayout;
pub use runtime::lock::StateLock;
pub use runtime::options::DriverOptions;
pub use store::{JsonStateStore, MemoryStateStore, StateSnapshot, StateStore};
pub use volumes::{Credentials, Volume, VolumeInfo, VolumeSettings};

pub use s3vol_shared::errors::{HelperError, S3volError, S3volResult, ValidationError};
pub use s3vol_shared::protocol::Scope;
