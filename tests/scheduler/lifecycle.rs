use std::time::Duration as StdDuration;

use chrono::Utc;
use tempfile::TempDir;

use cronhold::{Platform, TaskError};

use crate::harness::{engine_paused, next_due, node};

#[tokio::test]
async fn create_with_existing_id_conflicts() {
    let tmp = TempDir::new().unwrap();
    let node = node(&tmp, "node-a").await;
    let service = &node.platform.service;

    service.create_task("t1", "*/5 * * * * *").await.unwrap();
    let err = service.create_task("t1", "*/5 * * * * *").await.unwrap_err();

    assert!(matches!(err, TaskError::Conflict(_)));
}

#[tokio::test]
async fn delete_then_recreate_same_id() {
    let tmp = TempDir::new().unwrap();
    let node = node(&tmp, "node-a").await;
    let service = &node.platform.service;

    service.create_task("t1", "*/5 * * * * *").await.unwrap();
    service.pause_or_resume("t1", true, false).await.unwrap();
    service.delete_task("t1").await.unwrap();

    let task = service.create_task("t1", "*/10 * * * * *").await.unwrap();

    assert!(!task.paused);
    assert!(!engine_paused(&node.platform, "t1").await);
    let view = service.inspect_task("t1").await.unwrap();
    assert_eq!(view.execution.unwrap().payload.cron, "*/10 * * * * *");
}

#[tokio::test]
async fn deleted_task_stops_firing() {
    let tmp = TempDir::new().unwrap();
    let node = node(&tmp, "node-a").await;
    let service = &node.platform.service;

    service.create_task("t1", "*/5 * * * * *").await.unwrap();
    let due = next_due(&node.platform, "t1").await;
    service.delete_task("t1").await.unwrap();

    let report = node.scheduler.poll_once(due).await.unwrap();

    assert_eq!(report.claimed, 0);
    assert!(node.runner.firings().is_empty());
}

#[tokio::test]
async fn delete_during_claim_leaves_execution_behind() {
    let tmp = TempDir::new().unwrap();
    let node = node(&tmp, "node-a").await;
    let platform = &node.platform;
    platform.service.create_task("t1", "*/5 * * * * *").await.unwrap();

    let due = next_due(platform, "t1").await;
    let claimed = platform.engine.claim_due(due, "node-b", 1).await.unwrap();
    platform.service.delete_task("t1").await.unwrap();
    platform.engine.release(&claimed[0]).await.unwrap();

    assert!(matches!(
        platform.service.get_task("t1").await.unwrap_err(),
        TaskError::NotFound(_)
    ));
    // No registry row reads as active, so the orphan keeps running.
    let report = node.scheduler.poll_once(due).await.unwrap();
    assert_eq!(report.executed, 1);
}

#[tokio::test]
async fn paused_task_does_not_fire() {
    let tmp = TempDir::new().unwrap();
    let node = node(&tmp, "node-a").await;
    let service = &node.platform.service;

    service.create_task("t1", "*/5 * * * * *").await.unwrap();
    service.pause_or_resume("t1", true, false).await.unwrap();

    for _ in 0..3 {
        let due = next_due(&node.platform, "t1").await;
        let report = node.scheduler.poll_once(due).await.unwrap();
        assert_eq!(report.rescheduled, 1);
    }
    assert!(node.runner.firings().is_empty());

    service.pause_or_resume("t1", false, false).await.unwrap();
    let due = next_due(&node.platform, "t1").await;
    node.scheduler.poll_once(due).await.unwrap();
    assert_eq!(node.runner.firings_for("t1").len(), 1);
}

#[tokio::test]
async fn abandoned_claim_does_not_block_recreation() {
    let tmp = TempDir::new().unwrap();
    let platform = Platform::open_with_claim_timeout(
        &tmp.path().join("shared.db"),
        "node-a",
        StdDuration::ZERO,
    )
    .await
    .unwrap();
    platform
        .service
        .create_task("t1", "* * * * * *")
        .await
        .unwrap();

    // node-b claims and never completes.
    let due = next_due(&platform, "t1").await;
    let claimed = platform.engine.claim_due(due, "node-b", 1).await.unwrap();
    assert_eq!(claimed.len(), 1);
    let wait = (due - Utc::now()).to_std().unwrap_or_default();
    tokio::time::sleep(wait + StdDuration::from_millis(50)).await;

    platform.service.delete_task("t1").await.unwrap();
    assert!(platform.engine.get("t1").await.unwrap().is_none());

    platform
        .service
        .create_task("t1", "0 0 * * * *")
        .await
        .unwrap();
    let execution = platform
        .service
        .inspect_task("t1")
        .await
        .unwrap()
        .execution
        .unwrap();
    assert_eq!(execution.payload.cron, "0 0 * * * *");
    assert_eq!(execution.picked_by, None);
}
