// tests/process_lifecycle.rs
//
// Real processes through `TokioLauncher`.
#![cfg(unix)]

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use pulsar::exec::{ProcessLauncher, TokioLauncher};
use pulsar::job::JobStatus;
use pulsar::manager::{Manager, ManagerOptions};
use pulsar::store::{JobStore, MemoryJobStore};
use pulsar::tasks::{ConfigTaskResolver, SHELL_TASK};
use pulsar_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use pulsar_test_utils::{
    init_tracing, test_manager, wait_for_record, with_timeout, APP, ENV, QUICK_TASK, SLEEPY_TASK,
    UNKILLABLE_TASK,
};

type TestResult = Result<(), Box<dyn Error>>;

fn real_manager(kill_timeout: &str) -> (Manager, Arc<MemoryJobStore>) {
    test_manager(Arc::new(TokioLauncher::new()) as Arc<dyn ProcessLauncher>, kill_timeout)
}

/// Output readers run alongside the process; give them a moment after exit.
async fn wait_for_output(job: &pulsar::Job, needle: &str) -> Vec<String> {
    with_timeout(async {
        loop {
            let lines = job.output();
            if lines.iter().any(|line| line.contains(needle)) {
                return lines;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}

#[tokio::test]
async fn quick_task_sees_its_variables() -> TestResult {
    init_tracing();
    let (manager, store) = real_manager("5s");

    let vars = json!({ "foo": "world" });
    let job = manager.create_job(APP, ENV, QUICK_TASK, Some(&vars)).await?;
    job.execute()?;

    let data = with_timeout(job.closed()).await;
    assert_eq!(data.status, JobStatus::Finished);
    assert_eq!(data.exit.as_ref().and_then(|e| e.code), Some(0));

    wait_for_output(&job, "hello world").await;
    wait_for_record(store.as_ref(), job.id(), JobStatus::Finished).await;
    Ok(())
}

#[tokio::test]
async fn shell_task_reports_exit_code_and_identity() -> TestResult {
    init_tracing();
    let (manager, _store) = real_manager("5s");

    let vars = json!({ "command": "echo \"$PULSAR_TASK@$PULSAR_APP\"; exit 3" });
    let job = manager.create_job(APP, ENV, SHELL_TASK, Some(&vars)).await?;
    job.execute()?;

    let data = with_timeout(job.closed()).await;
    assert_eq!(data.status, JobStatus::Finished);
    assert_eq!(data.exit.as_ref().and_then(|e| e.code), Some(3));

    wait_for_output(&job, &format!("{SHELL_TASK}@{APP}")).await;
    Ok(())
}

#[tokio::test]
async fn sleepy_job_stops_on_graceful_signal() -> TestResult {
    init_tracing();
    let (manager, _store) = real_manager("5s");

    let job = manager.create_job(APP, ENV, SLEEPY_TASK, None).await?;
    job.execute()?;
    assert!(job.data().pid.is_some());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(job.kill());
    assert_eq!(job.status(), JobStatus::Killing);

    let data = with_timeout(job.closed()).await;
    assert_eq!(data.status, JobStatus::Finished);
    assert_eq!(data.exit.as_ref().and_then(|e| e.signal), Some(15));
    Ok(())
}

#[tokio::test]
async fn unkillable_job_is_force_killed() -> TestResult {
    init_tracing();
    let (manager, store) = real_manager("200ms");

    let job = manager.create_job(APP, ENV, UNKILLABLE_TASK, None).await?;
    job.execute()?;

    // Let the shell install its trap first.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let started = std::time::Instant::now();
    assert!(job.kill());

    let data = with_timeout(job.closed()).await;
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(200 + 1500), "took {elapsed:?}");
    assert_eq!(data.status, JobStatus::Killed);
    assert_eq!(data.exit.as_ref().and_then(|e| e.signal), Some(9));

    wait_for_record(store.as_ref(), job.id(), JobStatus::Killed).await;
    Ok(())
}

#[tokio::test]
async fn missing_working_directory_fails_to_spawn() -> TestResult {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_task(
            "nowhere",
            TaskConfigBuilder::new("true")
                .cwd("/definitely/not/a/real/dir")
                .build(),
        )
        .build();
    let store = Arc::new(MemoryJobStore::new());
    let manager = Manager::new(
        Arc::clone(&store) as Arc<dyn JobStore>,
        Arc::new(ConfigTaskResolver::from_config(&cfg)),
        Arc::new(TokioLauncher::new()),
        ManagerOptions::from(&cfg),
    );

    let job = manager.create_job(APP, ENV, "nowhere", None).await?;
    assert!(job.execute().is_err());

    let data = with_timeout(job.closed()).await;
    assert_eq!(data.status, JobStatus::Finished);
    assert!(data.exit.and_then(|exit| exit.error).is_some());
    Ok(())
}
