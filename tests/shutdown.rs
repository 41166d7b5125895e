// tests/shutdown.rs

use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pulsar::exec::{ProcessLauncher, TermSignal};
use pulsar::job::JobStatus;
use pulsar::manager::ShutdownSignal;
use pulsar::store::JobStore;
use pulsar::PulsarError;
use pulsar_test_utils::fake_launcher::{FakeBehaviour, FakeLauncher};
use pulsar_test_utils::{
    init_tracing, test_manager, with_timeout, APP, ENV, SLEEPY_TASK, UNKILLABLE_TASK,
};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn shutdown_signals_map_to_conventional_exit_codes() {
    assert_eq!(ShutdownSignal::Interrupt.exit_code(), 130);
    assert_eq!(ShutdownSignal::Terminate.exit_code(), 143);
    assert_eq!(ShutdownSignal::Terminate.to_string(), "SIGTERM");
}

#[tokio::test]
async fn stop_all_with_no_jobs_returns_at_once() {
    init_tracing();
    let launcher = Arc::new(FakeLauncher::new(FakeBehaviour::Cooperative));
    let (manager, _store) = test_manager(launcher as Arc<dyn ProcessLauncher>, "5s");

    let report = with_timeout(manager.stop_all(ShutdownSignal::Interrupt)).await;
    assert!(report.stopped.is_empty());
}

#[tokio::test]
async fn stop_all_waits_for_every_running_job() -> TestResult {
    init_tracing();
    let kill_timeout = Duration::from_millis(150);
    let launcher = Arc::new(FakeLauncher::new(FakeBehaviour::Cooperative));
    let (manager, store) = test_manager(
        Arc::clone(&launcher) as Arc<dyn ProcessLauncher>,
        "150ms",
    );

    let polite = manager.create_job(APP, ENV, SLEEPY_TASK, None).await?;
    polite.execute()?;

    launcher.set_behaviour(FakeBehaviour::Unkillable);
    let stubborn = manager.create_job(APP, ENV, UNKILLABLE_TASK, None).await?;
    stubborn.execute()?;

    let idle = manager.create_job(APP, ENV, SLEEPY_TASK, None).await?;

    let started = Instant::now();
    let report = with_timeout(manager.stop_all(ShutdownSignal::Terminate)).await;
    let elapsed = started.elapsed();
    assert!(elapsed >= kill_timeout);
    assert!(elapsed < kill_timeout + Duration::from_millis(250), "took {elapsed:?}");

    assert_eq!(report.stopped.len(), 2);
    assert!(report.stopped.iter().all(|data| data.status.is_terminal()));

    assert_eq!(polite.status(), JobStatus::Finished);
    assert_eq!(stubborn.status(), JobStatus::Killed);
    assert_eq!(idle.status(), JobStatus::Created);

    let processes = launcher.spawned();
    assert_eq!(processes.len(), 2);
    assert_eq!(processes[0].signals(), vec![TermSignal::Graceful]);
    assert_eq!(
        processes[1].signals(),
        vec![TermSignal::Graceful, TermSignal::Forced]
    );

    // Final statuses are persisted before stop_all returns.
    let polite_record = store.find_by_id(polite.id()).await?.expect("record");
    assert_eq!(polite_record.status, JobStatus::Finished);
    let stubborn_record = store.find_by_id(stubborn.id()).await?.expect("record");
    assert_eq!(stubborn_record.status, JobStatus::Killed);
    let idle_record = store.find_by_id(idle.id()).await?.expect("record");
    assert_eq!(idle_record.status, JobStatus::Created);
    Ok(())
}

#[tokio::test]
async fn stop_all_includes_jobs_already_killing() -> TestResult {
    init_tracing();
    let launcher = Arc::new(FakeLauncher::new(FakeBehaviour::Unkillable));
    let (manager, _store) = test_manager(
        Arc::clone(&launcher) as Arc<dyn ProcessLauncher>,
        "100ms",
    );

    let job = manager.create_job(APP, ENV, UNKILLABLE_TASK, None).await?;
    job.execute()?;
    assert!(job.kill());

    let report = with_timeout(manager.stop_all(ShutdownSignal::Interrupt)).await;
    assert_eq!(report.stopped.len(), 1);
    assert_eq!(report.stopped[0].status, JobStatus::Killed);

    // The second kill was a no-op: no extra graceful signal.
    assert_eq!(
        launcher.last().signals(),
        vec![TermSignal::Graceful, TermSignal::Forced]
    );
    Ok(())
}

#[tokio::test]
async fn stop_all_tolerates_jobs_finishing_concurrently() -> TestResult {
    init_tracing();
    let launcher = Arc::new(FakeLauncher::new(FakeBehaviour::ExitAfter(
        Duration::from_millis(5),
        0,
    )));
    let (manager, _store) = test_manager(
        Arc::clone(&launcher) as Arc<dyn ProcessLauncher>,
        "5s",
    );

    for _ in 0..5 {
        manager
            .create_job(APP, ENV, SLEEPY_TASK, None)
            .await?
            .execute()?;
    }

    let report = with_timeout(manager.stop_all(ShutdownSignal::Terminate)).await;
    assert!(report.stopped.len() <= 5);
    assert!(manager
        .job_list()
        .iter()
        .all(|job| job.status() == JobStatus::Finished));
    Ok(())
}

#[tokio::test]
async fn new_work_is_refused_once_shutdown_begins() -> TestResult {
    init_tracing();
    let launcher = Arc::new(FakeLauncher::new(FakeBehaviour::Cooperative));
    let (manager, store) = test_manager(
        Arc::clone(&launcher) as Arc<dyn ProcessLauncher>,
        "300ms",
    );

    let done = manager.create_job(APP, ENV, SLEEPY_TASK, None).await?;
    done.execute()?;
    launcher.last().finish(0);
    with_timeout(done.closed()).await;

    let pending = manager.create_job(APP, ENV, SLEEPY_TASK, None).await?;

    launcher.set_behaviour(FakeBehaviour::Unkillable);
    let stubborn = manager.create_job(APP, ENV, UNKILLABLE_TASK, None).await?;
    stubborn.execute()?;

    let stopping = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.stop_all(ShutdownSignal::Interrupt).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(manager.is_shutting_down());
    assert_eq!(stubborn.status(), JobStatus::Killing);

    assert!(matches!(
        manager.create_job(APP, ENV, SLEEPY_TASK, None).await,
        Err(PulsarError::ShuttingDown(_))
    ));
    assert!(matches!(
        manager.restart_job(done.id()).await,
        Err(PulsarError::ShuttingDown(_))
    ));
    assert!(matches!(
        pending.execute(),
        Err(PulsarError::ShuttingDown(_))
    ));
    assert_eq!(pending.status(), JobStatus::Created);

    let report = with_timeout(stopping).await?;
    assert_eq!(report.stopped.len(), 1);
    assert_eq!(stubborn.status(), JobStatus::Killed);

    // Nothing was spawned after shutdown began, and nothing is left running.
    assert_eq!(launcher.spawn_count(), 2);
    assert!(launcher.spawned().iter().all(|process| process.has_exited()));
    assert!(manager.job_list().iter().all(|job| !job.status().is_active()));
    assert_eq!(store.find_all().await?.len(), 3);
    Ok(())
}
