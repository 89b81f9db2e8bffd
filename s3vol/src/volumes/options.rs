//! Parsing of `docker volume create -o` options.

use std::collections::BTreeMap;

use s3vol_shared::constants::options as keys;
use s3vol_shared::errors::ValidationError;

use super::volume::Credentials;

/// Settings fixed when a volume is created.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VolumeSettings {
    pub bucket: String,

    /// Flags passed to s3fs as `-o <flag>`, in key order
    pub options: Vec<String>,

    pub credentials: Option<Credentials>,
}

impl VolumeSettings {
    /// Split create options into bucket, credentials and s3fs flags.
    ///
    /// `bucket`, `access_key_id` and `secret_access_key` are consumed; an empty
    /// value counts as absent. `debug` is dropped. Every other key becomes a
    /// flag, `key=value` or a bare `key` when the value is empty.
    pub fn parse(opts: &BTreeMap<String, String>) -> Result<Self, ValidationError> {
        let mut bucket = None;
        let mut access_key_id = None;
        let mut secret_access_key = None;
        let mut options = Vec::new();

        for (key, val) in opts {
            match key.as_str() {
                keys::BUCKET => bucket = non_empty(val),
                keys::ACCESS_KEY_ID => access_key_id = non_empty(val),
                keys::SECRET_ACCESS_KEY => secret_access_key = non_empty(val),
                keys::DEBUG => {
                    tracing::info!("Ignoring debug option, as it breaks s3fs");
                }
                _ if val.is_empty() => options.push(key.clone()),
                _ => options.push(format!("{key}={val}")),
            }
        }

        let bucket = bucket.ok_or(ValidationError::MissingBucket)?;

        let credentials = match (access_key_id, secret_access_key) {
            (Some(id), Some(secret)) => Some(Credentials::new(id, secret)),
            (None, None) => None,
            _ => return Err(ValidationError::CredentialPair),
        };

        Ok(Self {
            bucket,
            options,
            credentials,
        })
    }
}

fn non_empty(val: &str) -> Option<String> {
    (!val.is_empty()).then(|| val.to_string())
}

/// Check that a volume name is usable as a single directory name.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\0');

    if invalid {
        return Err(ValidationError::InvalidName(name.to_string()));
    }
    Ok(())
}
