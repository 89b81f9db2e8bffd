//! s3vol shared - code used by both the driver library and the plugin binary
//!
//! This crate contains the error taxonomy, the Docker volume plugin wire
//! types and the constants that both sides of the plugin boundary agree on.

pub mod constants;
pub mod errors;
pub mod protocol;

pub use errors::{HelperError, S3volError, S3volResult, ValidationError};
