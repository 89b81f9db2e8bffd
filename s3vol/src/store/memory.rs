use parking_lot::Mutex;

use s3vol_shared::errors::{S3volError, S3volResult};

use super::{StateSnapshot, StateStore};

/// [`StateStore`] that keeps the last snapshot in memory.
///
/// Also counts saves and can be told to fail them, which is what the
/// driver tests need to observe persistence behaviour.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    snapshot: Option<StateSnapshot>,
    saves: usize,
    fail_saves: bool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that starts out holding `snapshot`.
    pub fn with_snapshot(snapshot: StateSnapshot) -> Self {
        let store = Self::new();
        store.inner.lock().snapshot = Some(snapshot);
        store
    }

    pub fn snapshot(&self) -> Option<StateSnapshot> {
        self.inner.lock().snapshot.clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.inner.lock().saves
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.inner.lock().fail_saves = fail;
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> S3volResult<Option<StateSnapshot>> {
        Ok(self.inner.lock().snapshot.clone())
    }

    fn save(&self, snapshot: &StateSnapshot) -> S3volResult<()> {
        let mut inner = self.inner.lock();
        if inner.fail_saves {
            return Err(S3volError::Persistence("save disabled".to_string()));
        }
        inner.snapshot = Some(snapshot.clone());
        inner.saves += 1;
        Ok(())
    }
}
