//! Docker volume plugin front end for [`s3vol`].
//!
//! [`cli`] holds process configuration, [`server`] maps the plugin protocol
//! onto a shared [`s3vol::VolumeDriver`].

pub mod cli;
pub mod server;

pub use cli::Cli;
pub use server::router;
