
use std::sync::Arc;
use std::time::Duration;

use swarm_exec::cleanup::{CleanupController, CleanupOutcome};
use swarm_exec::service::DockerCli;
use swarm_exec::SwarmExecError;
use test_harness::FakeDocker;

const SERVICE: &str = "swarm-exec_cleanup_0000f00d";

fn created() -> FakeDocker {
    let fake = FakeDocker::new();
    fake.mark_created();
    fake
}

fn controller(fake: &FakeDocker) -> CleanupController {
    CleanupController::new(
        DockerCli::new(fake.binary()),
        SERVICE,
        false,
        Duration::from_millis(10),
    )
}

#[tokio::test]
async fn test_cleanup_twice_is_idempotent() {
    let fake = created();
    let cleanup = controller(&fake);

    assert_eq!(cleanup.cleanup().await.unwrap(), CleanupOutcome::Removed);
    assert_eq!(cleanup.cleanup().await.unwrap(), CleanupOutcome::AlreadyRemoved);

    assert_eq!(fake.calls_with_prefix("service rm"), vec![format!("service rm {}", SERVICE)]);
    assert!(fake.is_removed());
    assert!(!fake.service_exists());
}

#[tokio::test]
async fn test_service_removed_elsewhere_is_not_an_error() {
    // Never created here, so `rm` reports it missing
    let fake = FakeDocker::new();

    let outcome = controller(&fake).cleanup().await.unwrap();
    assert_eq!(outcome, CleanupOutcome::AlreadyRemoved);
    assert_eq!(fake.calls_with_prefix("service rm").len(), 1);
}

#[tokio::test]
async fn test_single_failure_is_retried_once() {
    let fake = created();
    fake.fail_removals(1);

    let outcome = controller(&fake).cleanup().await.unwrap();
    assert_eq!(outcome, CleanupOutcome::Removed);
    assert_eq!(fake.calls_with_prefix("service rm").len(), 2);
}

#[tokio::test]
async fn test_persistent_failure_surfaces_after_one_retry() {
    let fake = created();
    fake.fail_removals(5);
    let cleanup = controller(&fake);

    match cleanup.cleanup().await {
        Err(SwarmExecError::Cleanup { name, exit_code }) => {
            assert_eq!(name, SERVICE);
            assert_eq!(exit_code, Some(1));
        }
        other => panic!("expected cleanup failure, got {:?}", other),
    }
    assert_eq!(fake.calls_with_prefix("service rm").len(), 2);
    assert!(!fake.is_removed());
    assert!(fake.service_exists());
}

#[tokio::test]
async fn test_concurrent_cleanups_remove_once() {
    let fake = created();
    let cleanup = Arc::new(controller(&fake));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cleanup = cleanup.clone();
            tokio::spawn(async move { cleanup.cleanup().await })
        })
        .collect();

    let mut removed = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() == CleanupOutcome::Removed {
            removed += 1;
        }
    }

    assert_eq!(removed, 1);
    assert_eq!(fake.calls_with_prefix("service rm").len(), 1);
}
