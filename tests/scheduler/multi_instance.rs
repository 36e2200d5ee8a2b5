use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

use crate::harness::{RecordingRunner, next_due, node, node_with_runner};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_polls_fire_each_occurrence_once() {
    let tmp = TempDir::new().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let a = node_with_runner(&tmp, "node-a", runner.clone()).await;
    let b = node_with_runner(&tmp, "node-b", runner.clone()).await;

    a.platform
        .service
        .create_task("t1", "*/5 * * * * *")
        .await
        .unwrap();

    for _ in 0..4 {
        let due = next_due(&a.platform, "t1").await;
        let (left, right) = tokio::join!(a.scheduler.poll_once(due), b.scheduler.poll_once(due));
        let claimed = left.unwrap().claimed + right.unwrap().claimed;
        assert_eq!(claimed, 1);
    }

    let firings = runner.firings_for("t1");
    assert_eq!(firings.len(), 4);

    let unique: HashSet<_> = firings.iter().map(|firing| firing.fired_at).collect();
    assert_eq!(unique.len(), firings.len());

    let mut times: Vec<_> = firings.iter().map(|firing| firing.fired_at).collect();
    times.sort();
    for pair in times.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::seconds(5));
    }

    for firing in &firings {
        assert!(firing.instance_id == "node-a" || firing.instance_id == "node-b");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn instances_share_registry_pause_state() {
    let tmp = TempDir::new().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let a = node_with_runner(&tmp, "node-a", runner.clone()).await;
    let b = node_with_runner(&tmp, "node-b", runner.clone()).await;

    a.platform
        .service
        .create_task("t1", "*/5 * * * * *")
        .await
        .unwrap();
    // Paused through node-b's registry handle only.
    b.platform
        .service
        .pause_or_resume("t1", true, true)
        .await
        .unwrap();

    let due = next_due(&a.platform, "t1").await;
    let report = a.scheduler.poll_once(due).await.unwrap();

    assert_eq!(report.replaced, 1);
    assert!(runner.firings().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn running_schedulers_never_duplicate_a_firing() {
    let tmp = TempDir::new().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let a = node_with_runner(&tmp, "node-a", runner.clone()).await;
    let b = node_with_runner(&tmp, "node-b", runner.clone()).await;

    a.platform
        .service
        .create_task("every-second", "* * * * * *")
        .await
        .unwrap();

    let a_scheduler = Arc::new(
        a.platform
            .scheduler(runner.clone())
            .poll_interval(StdDuration::from_millis(100))
            .build(),
    );
    let b_scheduler = Arc::new(
        b.platform
            .scheduler(runner.clone())
            .poll_interval(StdDuration::from_millis(100))
            .build(),
    );

    let (stop, stopped) = watch::channel(false);
    let handles = [
        tokio::spawn({
            let scheduler = Arc::clone(&a_scheduler);
            let stopped = stopped.clone();
            async move { scheduler.run(stopped).await }
        }),
        tokio::spawn({
            let scheduler = Arc::clone(&b_scheduler);
            async move { scheduler.run(stopped).await }
        }),
    ];

    tokio::time::sleep(StdDuration::from_millis(3_500)).await;
    stop.send(true).unwrap();
    for handle in handles {
        tokio::time::timeout(StdDuration::from_secs(5), handle)
            .await
            .expect("scheduler should stop between polls")
            .unwrap()
            .unwrap();
    }

    let firings = runner.firings_for("every-second");
    assert!(!firings.is_empty());

    let unique: HashSet<_> = firings.iter().map(|firing| firing.fired_at).collect();
    assert_eq!(unique.len(), firings.len());

    // Stopping never strands a claim.
    let execution = a
        .platform
        .engine
        .get("every-second")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(execution.picked_by, None);

    // A node started afterwards picks the task straight up.
    let c = node(&tmp, "node-c").await;
    let due = next_due(&c.platform, "every-second").await;
    let report = c.scheduler.poll_once(due).await.unwrap();
    assert_eq!(report.executed, 1);
    assert_eq!(c.runner.firings_for("every-second").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_claim_is_recovered_by_another_instance() {
    let tmp = TempDir::new().unwrap();
    let a = node(&tmp, "node-a").await;
    let b = node(&tmp, "node-b").await;

    a.platform
        .service
        .create_task("t1", "*/5 * * * * *")
        .await
        .unwrap();

    // node-a claims the occurrence and dies before completing it.
    let due = next_due(&a.platform, "t1").await;
    let abandoned = a.platform.engine.claim_due(due, "node-a", 1).await.unwrap();
    assert_eq!(abandoned.len(), 1);

    // Within the claim timeout nobody may touch it.
    let early = b.scheduler.poll_once(due + Duration::seconds(30)).await.unwrap();
    assert_eq!(early.claimed, 0);

    let later = due + Duration::minutes(6);
    let report = b.scheduler.poll_once(later).await.unwrap();
    assert_eq!(report.executed, 1);
    assert_eq!(b.runner.firings_for("t1")[0].instance_id, "node-b");

    let execution = b.platform.engine.get("t1").await.unwrap().unwrap();
    assert_eq!(execution.picked_by, None);
    assert!(execution.next_due > later);
}
