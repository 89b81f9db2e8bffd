use super::*;

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use s3vol_shared::errors::{HelperError, ValidationError};
use tempfile::TempDir;

use crate::helper::{CommandOutput, CommandSpec};
use crate::store::MemoryStateStore;

/// Counts mount/unmount invocations; mounts fail while `fail_mount` is set.
#[derive(Default)]
struct CountingRunner {
    mounts: AtomicUsize,
    unmounts: AtomicUsize,
    fail_mount: AtomicBool,
    fail_unmount: AtomicBool,
}

#[async_trait]
impl ProcessRunner for CountingRunner {
    async fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
        if spec.program == "s3fs" {
            self.mounts.fetch_add(1, Ordering::SeqCst);
            if self.fail_mount.load(Ordering::SeqCst) {
                return Ok(CommandOutput::failure(1, "s3fs: bucket not found"));
            }
        } else {
            self.unmounts.fetch_add(1, Ordering::SeqCst);
            if self.fail_unmount.load(Ordering::SeqCst) {
                return Ok(CommandOutput::failure(32, "umount: target is busy"));
            }
        }
        Ok(CommandOutput::success())
    }
}

/// Store whose saves block the calling thread for a while.
struct SlowStore {
    inner: MemoryStateStore,
    delay_ms: AtomicU64,
}

impl StateStore for SlowStore {
    fn load(&self) -> S3volResult<Option<StateSnapshot>> {
        self.inner.load()
    }

    fn save(&self, snapshot: &StateSnapshot) -> S3volResult<()> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(delay));
        self.inner.save(snapshot)
    }
}

struct Fixture {
    driver: VolumeDriver,
    runner: Arc<CountingRunner>,
    store: Arc<MemoryStateStore>,
    _temp_dir: TempDir,
}

fn fixture() -> Fixture {
    let temp_dir = TempDir::new().unwrap();
    let runner = Arc::new(CountingRunner::default());
    let store = Arc::new(MemoryStateStore::new());
    let driver = VolumeDriver::with_parts(
        DriverOptions::with_base_path(temp_dir.path()),
        runner.clone(),
        store.clone(),
    )
    .unwrap();
    Fixture {
        driver,
        runner,
        store,
        _temp_dir: temp_dir,
    }
}

fn opts(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_create_reserves_mount_point() {
    let fx = fixture();
    fx.driver.create("data", &opts(&[("bucket", "b")])).await.unwrap();

    let info = fx.driver.get("data").await.unwrap();
    assert_eq!(info.ref_count, 0);
    assert!(info.mount_point.is_dir());
    assert_eq!(info.mount_point, fx.driver.layout().volume_dir("data"));
    assert_eq!(fx.store.save_count(), 1);
}

#[tokio::test]
async fn test_create_validation_leaves_no_trace() {
    let fx = fixture();

    let err = fx
        .driver
        .create("data", &opts(&[("bucket", "b"), ("access_key_id", "k")]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        S3volError::Validation(ValidationError::CredentialPair)
    ));

    let err = fx.driver.create("data", &opts(&[])).await.unwrap_err();
    assert!(matches!(
        err,
        S3volError::Validation(ValidationError::MissingBucket)
    ));

    assert!(fx.driver.list().await.is_empty());
    assert!(!fx.driver.layout().volume_dir("data").exists());
    assert_eq!(fx.store.save_count(), 0);
}

#[tokio::test]
async fn test_create_rejects_path_names() {
    let fx = fixture();
    let err = fx
        .driver
        .create("../escape", &opts(&[("bucket", "b")]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        S3volError::Validation(ValidationError::InvalidName(_))
    ));
}

#[tokio::test]
async fn test_create_existing_name() {
    let fx = fixture();
    fx.driver.create("data", &opts(&[("bucket", "b")])).await.unwrap();
    fx.driver.mount("data", "c1").await.unwrap();

    // Same options: accepted, reference count untouched
    fx.driver.create("data", &opts(&[("bucket", "b")])).await.unwrap();
    assert_eq!(fx.driver.get("data").await.unwrap().ref_count, 1);

    let err = fx
        .driver
        .create("data", &opts(&[("bucket", "other")]))
        .await
        .unwrap_err();
    assert!(matches!(err, S3volError::AlreadyExists { .. }));
}

#[tokio::test]
async fn test_create_existing_name_restores_mount_point() {
    let fx = fixture();
    fx.driver.create("data", &opts(&[("bucket", "b")])).await.unwrap();
    let mount_point = fx.driver.path("data").await.unwrap();
    std::fs::remove_dir(&mount_point).unwrap();

    fx.driver.create("data", &opts(&[("bucket", "b")])).await.unwrap();
    assert!(mount_point.is_dir());
}

#[tokio::test]
async fn test_mount_only_first_reference_runs_helper() {
    let fx = fixture();
    fx.driver.create("data", &opts(&[("bucket", "b")])).await.unwrap();

    let p1 = fx.driver.mount("data", "c1").await.unwrap();
    let p2 = fx.driver.mount("data", "c2").await.unwrap();

    assert_eq!(p1, p2);
    assert_eq!(fx.runner.mounts.load(Ordering::SeqCst), 1);
    assert_eq!(fx.driver.get("data").await.unwrap().ref_count, 2);
}

#[tokio::test]
async fn test_mount_failure_keeps_count() {
    let fx = fixture();
    fx.driver.create("data", &opts(&[("bucket", "b")])).await.unwrap();
    fx.runner.fail_mount.store(true, Ordering::SeqCst);

    let err = fx.driver.mount("data", "c1").await.unwrap_err();
    match err.helper_error() {
        Some(HelperError::MountFailed { output, .. }) => {
            assert_eq!(output, "s3fs: bucket not found")
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fx.driver.get("data").await.unwrap().ref_count, 0);
    assert_eq!(fx.store.save_count(), 1);
}

#[tokio::test]
async fn test_mount_unknown_volume() {
    let fx = fixture();
    let err = fx.driver.mount("missing", "c1").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(fx.driver.list().await.is_empty());
    assert_eq!(fx.runner.mounts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unmount_only_last_reference_runs_helper() {
    let fx = fixture();
    fx.driver.create("data", &opts(&[("bucket", "b")])).await.unwrap();
    fx.driver.mount("data", "c1").await.unwrap();
    fx.driver.mount("data", "c2").await.unwrap();

    fx.driver.unmount("data", "c1").await.unwrap();
    assert_eq!(fx.runner.unmounts.load(Ordering::SeqCst), 0);
    assert_eq!(fx.driver.get("data").await.unwrap().ref_count, 1);

    fx.driver.unmount("data", "c2").await.unwrap();
    assert_eq!(fx.runner.unmounts.load(Ordering::SeqCst), 1);
    assert_eq!(fx.driver.get("data").await.unwrap().ref_count, 0);
}

#[tokio::test]
async fn test_unbalanced_unmount_clamps_to_zero() {
    let fx = fixture();
    fx.driver.create("data", &opts(&[("bucket", "b")])).await.unwrap();

    fx.driver.unmount("data", "c1").await.unwrap();
    fx.driver.unmount("data", "c1").await.unwrap();

    assert_eq!(fx.driver.get("data").await.unwrap().ref_count, 0);
    assert_eq!(fx.runner.unmounts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unmount_failure_releases_reference() {
    let fx = fixture();
    fx.driver.create("data", &opts(&[("bucket", "b")])).await.unwrap();
    fx.driver.mount("data", "c1").await.unwrap();
    fx.runner.fail_unmount.store(true, Ordering::SeqCst);

    let err = fx.driver.unmount("data", "c1").await.unwrap_err();
    assert!(matches!(
        err.helper_error(),
        Some(HelperError::UnmountFailed { code: Some(32), .. })
    ));
    assert_eq!(fx.driver.get("data").await.unwrap().ref_count, 0);
    assert_eq!(fx.store.snapshot().unwrap().volumes["data"].ref_count, 0);

    // Not left busy
    fx.driver.remove("data").await.unwrap();
    assert!(fx.driver.get("data").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_unmount_failure_with_other_references_runs_no_helper() {
    let fx = fixture();
    fx.driver.create("data", &opts(&[("bucket", "b")])).await.unwrap();
    fx.driver.mount("data", "c1").await.unwrap();
    fx.driver.mount("data", "c2").await.unwrap();
    fx.runner.fail_unmount.store(true, Ordering::SeqCst);

    fx.driver.unmount("data", "c1").await.unwrap();
    assert_eq!(fx.runner.unmounts.load(Ordering::SeqCst), 0);
    assert_eq!(fx.driver.get("data").await.unwrap().ref_count, 1);
}

#[tokio::test]
async fn test_unmount_verification_failure_clamps() {
    let fx = fixture();
    fx.driver.create("data", &opts(&[("bucket", "b")])).await.unwrap();
    let mount_point = fx.driver.mount("data", "c1").await.unwrap();
    std::fs::write(mount_point.join("leftover"), b"x").unwrap();

    let err = fx.driver.unmount("data", "c1").await.unwrap_err();
    assert!(matches!(
        err.helper_error(),
        Some(HelperError::Verification { entries: 1, .. })
    ));
    assert_eq!(fx.driver.get("data").await.unwrap().ref_count, 0);

    let persisted = fx.store.snapshot().unwrap();
    assert_eq!(persisted.volumes["data"].ref_count, 0);
}

#[tokio::test]
async fn test_remove_busy_then_free() {
    let fx = fixture();
    fx.driver.create("data", &opts(&[("bucket", "b")])).await.unwrap();
    let mount_point = fx.driver.mount("data", "c1").await.unwrap();

    let err = fx.driver.remove("data").await.unwrap_err();
    assert!(matches!(err, S3volError::Busy { ref_count: 1, .. }));

    fx.driver.unmount("data", "c1").await.unwrap();
    fx.driver.remove("data").await.unwrap();

    assert!(fx.driver.get("data").await.unwrap_err().is_not_found());
    assert!(!mount_point.exists());
    assert!(fx.store.snapshot().unwrap().volumes.is_empty());
}

#[tokio::test]
async fn test_remove_non_empty_mount_point() {
    let fx = fixture();
    fx.driver.create("data", &opts(&[("bucket", "b")])).await.unwrap();
    let path = fx.driver.path("data").await.unwrap();
    std::fs::write(path.join("file"), b"x").unwrap();

    let err = fx.driver.remove("data").await.unwrap_err();
    assert!(matches!(err, S3volError::Resource { .. }));
    assert!(fx.driver.get("data").await.is_ok());
}

#[tokio::test]
async fn test_persistence_failure_does_not_roll_back() {
    let fx = fixture();
    fx.store.set_fail_saves(true);

    fx.driver.create("data", &opts(&[("bucket", "b")])).await.unwrap();
    fx.driver.mount("data", "c1").await.unwrap();

    assert_eq!(fx.driver.get("data").await.unwrap().ref_count, 1);
    assert!(fx.store.snapshot().is_none());
}

#[tokio::test]
async fn test_state_reloaded_by_new_driver() {
    let fx = fixture();
    fx.driver
        .create(
            "data",
            &opts(&[
                ("bucket", "b"),
                ("access_key_id", "k"),
                ("secret_access_key", "s"),
                ("allow_other", ""),
            ]),
        )
        .await
        .unwrap();
    fx.driver.mount("data", "c1").await.unwrap();

    let reopened = VolumeDriver::with_parts(
        DriverOptions::with_base_path(fx.driver.layout().base_dir()),
        fx.runner.clone(),
        Arc::new(MemoryStateStore::with_snapshot(fx.store.snapshot().unwrap())),
    )
    .unwrap();

    assert_eq!(reopened.list().await, fx.driver.list().await);
    assert_eq!(reopened.get("data").await.unwrap().ref_count, 1);
}

#[tokio::test]
async fn test_capabilities_global() {
    let fx = fixture();
    assert_eq!(fx.driver.capabilities().scope, Scope::Global);
}

#[tokio::test]
async fn test_concurrent_mounts_single_helper_call() {
    let fx = fixture();
    fx.driver.create("data", &opts(&[("bucket", "b")])).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        let driver = fx.driver.clone();
        handles.push(tokio::spawn(async move {
            driver.mount("data", &format!("c{i}")).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(fx.driver.get("data").await.unwrap().ref_count, 16);
    assert_eq!(fx.runner.mounts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_slow_state_save_does_not_stall_runtime() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(SlowStore {
        inner: MemoryStateStore::new(),
        delay_ms: AtomicU64::new(0),
    });
    let driver = VolumeDriver::with_parts(
        DriverOptions::with_base_path(temp_dir.path()),
        Arc::new(CountingRunner::default()),
        store.clone(),
    )
    .unwrap();
    driver.create("data", &opts(&[("bucket", "b")])).await.unwrap();
    store.delay_ms.store(500, Ordering::SeqCst);

    // Single-threaded runtime: a blocking save here would hold up the timer
    let mount = tokio::spawn({
        let driver = driver.clone();
        async move { driver.mount("data", "c1").await }
    });
    let start = Instant::now();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(start.elapsed() < Duration::from_millis(400), "{:?}", start.elapsed());

    mount.await.unwrap().unwrap();
    assert_eq!(store.inner.save_count(), 2);
}
