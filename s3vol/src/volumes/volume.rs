//! Volume records held by the registry.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::options::VolumeSettings;

/// Access key pair handed to s3fs through its environment.
///
/// Both halves are always present together; the secret is redacted from
/// `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// One logical volume.
///
/// `ref_count` counts mounts not yet matched by an unmount; the bucket is
/// mounted exactly while it is above zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,

    pub mount_point: PathBuf,

    pub created_at: DateTime<Utc>,

    pub ref_count: u32,

    /// s3fs `-o` flags, `key` or `key=value`
    #[serde(default)]
    pub options: Vec<String>,

    pub bucket: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

impl Volume {
    /// New unmounted volume created now.
    pub fn new(name: impl Into<String>, mount_point: PathBuf, settings: VolumeSettings) -> Self {
        Self {
            name: name.into(),
            mount_point,
            created_at: Utc::now(),
            ref_count: 0,
            options: settings.options,
            bucket: settings.bucket,
            credentials: settings.credentials,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.ref_count > 0
    }

    /// Whether this volume was created with exactly these settings.
    pub fn has_settings(&self, settings: &VolumeSettings) -> bool {
        self.bucket == settings.bucket
            && self.options == settings.options
            && self.credentials == settings.credentials
    }

    pub fn info(&self) -> VolumeInfo {
        VolumeInfo {
            name: self.name.clone(),
            mount_point: self.mount_point.clone(),
            created_at: self.created_at,
            ref_count: self.ref_count,
        }
    }
}

/// Public view of a volume returned by queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VolumeInfo {
    pub name: String,
    pub mount_point: PathBuf,
    pub created_at: DateTime<Utc>,
    pub ref_count: u32,
}
