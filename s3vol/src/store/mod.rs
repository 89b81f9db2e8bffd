//! Persistence of the volume registry.
//!
//! The driver writes a full [`StateSnapshot`] after every mutating operation
//! and reads one back once at startup. Where it goes is up to the
//! [`StateStore`] implementation:
//!
//! - [`JsonStateStore`]: versioned JSON file, replaced atomically
//! - [`MemoryStateStore`]: in-process, for tests and embedding

mod json;
mod memory;

use std::collections::HashMap;

use s3vol_shared::errors::S3volResult;

use crate::volumes::Volume;

pub use json::{JsonStateStore, STATE_VERSION};
pub use memory::MemoryStateStore;

/// Complete copy of the registry at one point in time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    pub volumes: HashMap<String, Volume>,
}

impl StateSnapshot {
    pub fn new(volumes: HashMap<String, Volume>) -> Self {
        Self { volumes }
    }
}

/// Load/save capability for registry snapshots.
pub trait StateStore: Send + Sync {
    /// Read the last saved snapshot.
    ///
    /// `Ok(None)` means nothing was ever saved. Unreadable or undecodable
    /// state is an error; it must not be silently replaced.
    fn load(&self) -> S3volResult<Option<StateSnapshot>>;

    /// Replace the stored snapshot.
    fn save(&self, snapshot: &StateSnapshot) -> S3volResult<()>;
}
