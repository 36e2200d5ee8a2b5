use chrono::Duration;
use tempfile::TempDir;

use crate::harness::{engine_paused, next_due, node};

const EVERY_FIVE: &str = "*/5 * * * * *";

/// Puts `t1` into the requested (engine, registry) flag state.
async fn diverge(platform: &cronhold::Platform, engine: bool, registry: bool) {
    platform.service.create_task("t1", EVERY_FIVE).await.unwrap();
    platform
        .service
        .pause_or_resume("t1", engine, false)
        .await
        .unwrap();
    platform
        .service
        .pause_or_resume("t1", registry, true)
        .await
        .unwrap();

    assert_eq!(engine_paused(platform, "t1").await, engine);
    assert_eq!(platform.registry.is_paused("t1").await.unwrap(), registry);
}

#[tokio::test]
async fn every_flag_combination_converges_to_registry() {
    for (engine, registry) in [(true, true), (true, false), (false, true), (false, false)] {
        let tmp = TempDir::new().unwrap();
        let node = node(&tmp, "node-a").await;
        diverge(&node.platform, engine, registry).await;

        let due = next_due(&node.platform, "t1").await;
        let report = node.scheduler.poll_once(due).await.unwrap();

        assert_eq!(report.claimed, 1, "engine={engine} registry={registry}");
        assert_eq!(
            engine_paused(&node.platform, "t1").await,
            registry,
            "engine={engine} registry={registry}"
        );
        let ran = !node.runner.firings().is_empty();
        assert_eq!(ran, !engine && !registry, "engine={engine} registry={registry}");
        assert_eq!(
            next_due(&node.platform, "t1").await,
            due + Duration::seconds(5)
        );
    }
}

#[tokio::test]
async fn registry_only_pause_is_stale_for_one_period() {
    let tmp = TempDir::new().unwrap();
    let node = node(&tmp, "node-a").await;
    let platform = &node.platform;

    platform.service.create_task("t1", EVERY_FIVE).await.unwrap();
    platform
        .service
        .pause_or_resume("t1", true, true)
        .await
        .unwrap();

    assert!(!engine_paused(platform, "t1").await);

    let due = next_due(platform, "t1").await;
    let report = node.scheduler.poll_once(due).await.unwrap();

    assert_eq!(report.replaced, 1);
    assert!(engine_paused(platform, "t1").await);
    assert!(node.runner.firings().is_empty());

    let due = next_due(platform, "t1").await;
    let report = node.scheduler.poll_once(due).await.unwrap();
    assert_eq!(report.rescheduled, 1);
    assert!(node.runner.firings().is_empty());
}

#[tokio::test]
async fn registry_only_resume_skips_one_occurrence_then_runs() {
    let tmp = TempDir::new().unwrap();
    let node = node(&tmp, "node-a").await;
    let platform = &node.platform;

    platform.service.create_task("t1", EVERY_FIVE).await.unwrap();
    platform
        .service
        .pause_or_resume("t1", true, false)
        .await
        .unwrap();
    platform
        .service
        .pause_or_resume("t1", false, true)
        .await
        .unwrap();

    let first = next_due(platform, "t1").await;
    node.scheduler.poll_once(first).await.unwrap();
    assert!(!engine_paused(platform, "t1").await);
    assert!(node.runner.firings().is_empty());

    let second = next_due(platform, "t1").await;
    let report = node.scheduler.poll_once(second).await.unwrap();
    assert_eq!(report.executed, 1);

    let firings = node.runner.firings_for("t1");
    assert_eq!(firings.len(), 1);
    assert_eq!(firings[0].fired_at, second);
    assert_eq!(firings[0].instance_id, "node-a");
}

#[tokio::test]
async fn pause_during_claim_is_repaired_at_next_occurrence() {
    let tmp = TempDir::new().unwrap();
    let node = node(&tmp, "node-a").await;
    let platform = &node.platform;
    platform.service.create_task("t1", EVERY_FIVE).await.unwrap();

    // Another instance holds the occurrence while the pause arrives.
    let due = next_due(platform, "t1").await;
    let claimed = platform.engine.claim_due(due, "node-b", 1).await.unwrap();
    platform
        .service
        .pause_or_resume("t1", true, false)
        .await
        .unwrap();
    assert!(!engine_paused(platform, "t1").await);
    platform.engine.release(&claimed[0]).await.unwrap();

    let report = node.scheduler.poll_once(due).await.unwrap();

    assert_eq!(report.replaced, 1);
    assert!(engine_paused(platform, "t1").await);
    assert!(node.runner.firings().is_empty());
}
