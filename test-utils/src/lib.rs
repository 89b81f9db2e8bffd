//! Shared fixtures for s3vol integration tests.
//!
//! - [`RecordingRunner`]: fake process runner that records every helper call
//! - [`TestDriver`]: driver on a temporary base directory with a real state file

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use s3vol::{
    CommandOutput, CommandSpec, DriverOptions, HelperConfig, JsonStateStore, ProcessRunner,
    VolumeDriver,
};

/// Build a create-options map from pairs.
pub fn opts(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ============================================================================
// RECORDING RUNNER
// ============================================================================

/// Fake [`ProcessRunner`] that records calls instead of spawning processes.
///
/// Calls to the default mount program count as mounts, everything else as
/// unmounts. Results are configurable and default to success.
#[derive(Default)]
pub struct RecordingRunner {
    state: Mutex<RunnerState>,
}

#[derive(Default)]
struct RunnerState {
    calls: Vec<CommandSpec>,
    mount_result: Option<CommandOutput>,
    unmount_result: Option<CommandOutput>,
    spawn_error: bool,
    delay: Option<Duration>,
}

fn is_mount(spec: &CommandSpec) -> bool {
    spec.program == HelperConfig::default().mount_program
}

impl RecordingRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make subsequent mounts exit with `code` and `output`.
    pub fn fail_mounts(&self, code: i32, output: &str) {
        self.state.lock().mount_result = Some(CommandOutput::failure(code, output));
    }

    /// Make subsequent unmounts exit with `code` and `output`.
    pub fn fail_unmounts(&self, code: i32, output: &str) {
        self.state.lock().unmount_result = Some(CommandOutput::failure(code, output));
    }

    /// Make every call fail as if the program did not exist.
    pub fn fail_spawns(&self) {
        self.state.lock().spawn_error = true;
    }

    /// Restore default successful behaviour.
    pub fn succeed(&self) {
        let mut state = self.state.lock();
        state.mount_result = None;
        state.unmount_result = None;
        state.spawn_error = false;
    }

    /// Sleep this long inside every call, to widen race windows.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.state.lock().calls.clone()
    }

    pub fn mount_calls(&self) -> Vec<CommandSpec> {
        self.calls().into_iter().filter(is_mount).collect()
    }

    pub fn unmount_calls(&self) -> Vec<CommandSpec> {
        self.calls().into_iter().filter(|c| !is_mount(c)).collect()
    }
}

#[async_trait]
impl ProcessRunner for RecordingRunner {
    async fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
        let (result, delay) = {
            let mut state = self.state.lock();
            state.calls.push(spec.clone());

            if state.spawn_error {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{}: not found", spec.program),
                ));
            }

            let result = if is_mount(spec) {
                state.mount_result.clone()
            } else {
                state.unmount_result.clone()
            };
            (result.unwrap_or_else(CommandOutput::success), state.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(result)
    }
}

// ============================================================================
// TEST DRIVER
// ============================================================================

/// Driver on a temporary base directory, persisting to a real state file.
pub struct TestDriver {
    pub driver: VolumeDriver,
    pub runner: Arc<RecordingRunner>,
    temp_dir: TempDir,
}

impl TestDriver {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let runner = RecordingRunner::new();
        let driver = open_driver(temp_dir.path(), runner.clone());
        Self {
            driver,
            runner,
            temp_dir,
        }
    }

    /// A fresh driver over the same directory, as after a process restart.
    pub fn reopen(&self) -> VolumeDriver {
        open_driver(self.temp_dir.path(), self.runner.clone())
    }

    pub fn base_dir(&self) -> &Path {
        self.temp_dir.path()
    }
}

impl Default for TestDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn open_driver(base: &Path, runner: Arc<RecordingRunner>) -> VolumeDriver {
    let options = DriverOptions::with_base_path(base);
    let store = Arc::new(JsonStateStore::new(options.layout().state_file()));
    VolumeDriver::with_parts(options, runner, store).expect("Failed to open driver")
}
