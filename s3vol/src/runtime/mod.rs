//! Driver configuration, on-disk layout and process-level locking.

pub mod layout;
pub mod lock;
pub mod options;
