pub mod builders;
pub mod failing_store;
pub mod fake_launcher;

use std::sync::{Arc, Once};
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use pulsar::config::ConfigFile;
use pulsar::exec::ProcessLauncher;
use pulsar::job::{JobId, JobStatus};
use pulsar::manager::{Manager, ManagerOptions};
use pulsar::store::{JobRecord, JobStore, MemoryJobStore};
use pulsar::tasks::ConfigTaskResolver;

use crate::builders::{ConfigFileBuilder, TaskConfigBuilder};

pub const APP: &str = "example";
pub const ENV: &str = "production";
pub const SLEEPY_TASK: &str = "dummy_sleepy";
pub const UNKILLABLE_TASK: &str = "dummy_unkillable";
pub const QUICK_TASK: &str = "dummy_quick";

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Config with the dummy tasks used throughout the tests.
///
/// The commands are real shell lines so the same config works with
/// `TokioLauncher`.
pub fn test_config(kill_timeout: &str) -> ConfigFile {
    ConfigFileBuilder::new()
        .kill_timeout(kill_timeout)
        .with_task(
            SLEEPY_TASK,
            TaskConfigBuilder::new("sleep 2")
                .description("Sleeps and honours SIGTERM")
                .variable("foo", "any value")
                .app(APP)
                .build(),
        )
        .with_task(
            UNKILLABLE_TASK,
            TaskConfigBuilder::new("trap '' TERM; sleep 5")
                .description("Ignores SIGTERM")
                .app(APP)
                .build(),
        )
        .with_task(
            QUICK_TASK,
            TaskConfigBuilder::new("echo \"hello $foo\"")
                .description("Prints and exits")
                .build(),
        )
        .build()
}

/// Manager over an in-memory store, built from `test_config`.
pub fn test_manager(
    launcher: Arc<dyn ProcessLauncher>,
    kill_timeout: &str,
) -> (Manager, Arc<MemoryJobStore>) {
    let store = Arc::new(MemoryJobStore::new());
    let manager = manager_with_store(
        launcher,
        Arc::clone(&store) as Arc<dyn JobStore>,
        kill_timeout,
    );
    (manager, store)
}

/// Manager over the given store, built from `test_config`.
pub fn manager_with_store(
    launcher: Arc<dyn ProcessLauncher>,
    store: Arc<dyn JobStore>,
    kill_timeout: &str,
) -> Manager {
    let cfg = test_config(kill_timeout);
    Manager::new(
        store,
        Arc::new(ConfigTaskResolver::from_config(&cfg)),
        launcher,
        ManagerOptions::from(&cfg),
    )
}

/// Poll `store` until the record for `id` reaches `status`.
///
/// The manager mirrors transitions asynchronously, so a job can be terminal
/// a moment before its record is.
pub async fn wait_for_record(store: &dyn JobStore, id: JobId, status: JobStatus) -> JobRecord {
    with_timeout(async {
        loop {
            if let Ok(Some(record)) = store.find_by_id(id).await {
                if record.status == status {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}
