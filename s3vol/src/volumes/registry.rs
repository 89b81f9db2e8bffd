//! In-memory volume registry.

use std::collections::HashMap;

use super::volume::{Volume, VolumeInfo};

/// Map of volume name to record.
///
/// Owned by the driver and only reached through its lock; callers get
/// [`VolumeInfo`] copies, never references into the map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VolumeRegistry {
    volumes: HashMap<String, Volume>,
}

impl VolumeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted snapshot.
    pub fn from_volumes(volumes: HashMap<String, Volume>) -> Self {
        Self { volumes }
    }

    pub fn get(&self, name: &str) -> Option<&Volume> {
        self.volumes.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Volume> {
        self.volumes.get_mut(name)
    }

    /// Insert a volume, replacing any record with the same name.
    pub fn insert(&mut self, volume: Volume) {
        self.volumes.insert(volume.name.clone(), volume);
    }

    pub fn remove(&mut self, name: &str) -> Option<Volume> {
        self.volumes.remove(name)
    }

    pub fn volumes(&self) -> impl Iterator<Item = &Volume> {
        self.volumes.values()
    }

    /// Public info for every volume, sorted by name.
    pub fn list(&self) -> Vec<VolumeInfo> {
        let mut infos: Vec<VolumeInfo> = self.volumes.values().map(Volume::info).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Copy of the full map for persistence.
    pub fn to_volumes(&self) -> HashMap<String, Volume> {
        self.volumes.clone()
    }
}
