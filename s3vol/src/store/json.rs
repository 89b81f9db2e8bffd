//! JSON state file.
//!
//! Current format:
//! ```json
//! { "version": 1, "volumes": { "data": { "name": "data", "mountPoint": "...", ... } } }
//! ```
//! Older plugin releases wrote a bare map of PascalCase
//! records; those are migrated on load and rewritten in the current format on
//! the next save.

use std::collections::HashMap;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use s3vol_shared::errors::{S3volError, S3volResult};

use super::{StateSnapshot, StateStore};
use crate::runtime::layout::{FILE_MODE, create_private_dir};
use crate::volumes::{Credentials, Volume};

/// Schema version written to the state file.
pub const STATE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct StateDocument {
    version: u32,
    volumes: HashMap<String, Volume>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LegacyVolume {
    name: String,
    mount_point: PathBuf,
    created_at: String,
    ref_count: i64,
    #[serde(default)]
    options: Option<Vec<String>>,
    bucket: String,
    #[serde(rename = "AccessKeyID", default)]
    access_key_id: String,
    #[serde(default)]
    secret_access_key: String,
}

impl LegacyVolume {
    fn migrate(self) -> Result<Volume, String> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| format!("volume {}: bad CreatedAt: {e}", self.name))?
            .with_timezone(&Utc);

        let credentials = match (
            self.access_key_id.is_empty(),
            self.secret_access_key.is_empty(),
        ) {
            (false, false) => Some(Credentials::new(
                self.access_key_id,
                self.secret_access_key,
            )),
            (true, true) => None,
            _ => return Err(format!("volume {}: incomplete credential pair", self.name)),
        };

        Ok(Volume {
            name: self.name,
            mount_point: self.mount_point,
            created_at,
            ref_count: self.ref_count.clamp(0, u32::MAX as i64) as u32,
            options: self.options.unwrap_or_default(),
            bucket: self.bucket,
            credentials,
        })
    }
}

/// [`StateStore`] backed by one JSON file.
#[derive(Clone, Debug)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corrupt(&self, reason: impl Into<String>) -> S3volError {
        S3volError::StateCorrupt {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn decode(&self, contents: &str) -> S3volResult<StateSnapshot> {
        let value: serde_json::Value =
            serde_json::from_str(contents).map_err(|e| self.corrupt(e.to_string()))?;

        let versioned = value.get("version").is_some_and(serde_json::Value::is_number);
        if versioned {
            let doc: StateDocument =
                serde_json::from_value(value).map_err(|e| self.corrupt(e.to_string()))?;
            if doc.version != STATE_VERSION {
                return Err(self.corrupt(format!("unsupported version {}", doc.version)));
            }
            return Ok(StateSnapshot::new(doc.volumes));
        }

        let legacy: HashMap<String, LegacyVolume> =
            serde_json::from_value(value).map_err(|e| self.corrupt(e.to_string()))?;

        tracing::info!(
            path = %self.path.display(),
            volumes = legacy.len(),
            "Migrating unversioned state file"
        );

        let mut volumes = HashMap::with_capacity(legacy.len());
        for (key, vol) in legacy {
            volumes.insert(key, vol.migrate().map_err(|e| self.corrupt(e))?);
        }
        Ok(StateSnapshot::new(volumes))
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> S3volResult<Option<StateSnapshot>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No state found");
                return Ok(None);
            }
            Err(e) => return Err(S3volError::resource("read state file", &self.path, e)),
        };

        let snapshot = self.decode(&contents)?;
        tracing::debug!(
            path = %self.path.display(),
            volumes = snapshot.volumes.len(),
            "Loaded state"
        );
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &StateSnapshot) -> S3volResult<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| S3volError::Persistence(format!("no parent for {}", self.path.display())))?;
        create_private_dir(dir)?;

        let doc = StateDocument {
            version: STATE_VERSION,
            volumes: snapshot.volumes.clone(),
        };
        let json = serde_json::to_vec_pretty(&doc)
            .map_err(|e| S3volError::Persistence(format!("failed to serialize state: {e}")))?;

        // Same directory so the rename stays on one filesystem
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| S3volError::Persistence(format!("failed to create temp file: {e}")))?;
        tmp.write_all(&json)
            .and_then(|_| tmp.as_file().sync_all())
            .and_then(|_| {
                tmp.as_file()
                    .set_permissions(std::fs::Permissions::from_mode(FILE_MODE))
            })
            .map_err(|e| S3volError::Persistence(format!("failed to write state: {e}")))?;
        tmp.persist(&self.path).map_err(|e| {
            S3volError::Persistence(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e.error
            ))
        })?;

        tracing::trace!(
            path = %self.path.display(),
            volumes = snapshot.volumes.len(),
            "Saved state"
        );
        Ok(())
    }
}
