#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use cronhold::Platform;
use cronhold::platform::engine::{RunFuture, Scheduler, TaskRunner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firing {
    pub instance_id: String,
    pub task_id: String,
    pub fired_at: DateTime<Utc>,
}

/// Job body that records every firing instead of logging it.
#[derive(Default)]
pub struct RecordingRunner {
    firings: Mutex<Vec<Firing>>,
}

impl RecordingRunner {
    pub fn firings(&self) -> Vec<Firing> {
        self.firings.lock().unwrap().clone()
    }

    pub fn firings_for(&self, task_id: &str) -> Vec<Firing> {
        self.firings()
            .into_iter()
            .filter(|firing| firing.task_id == task_id)
            .collect()
    }
}

impl TaskRunner for RecordingRunner {
    fn run<'a>(
        &'a self,
        instance_id: &'a str,
        task_id: &'a str,
        fired_at: DateTime<Utc>,
    ) -> RunFuture<'a> {
        Box::pin(async move {
            self.firings.lock().unwrap().push(Firing {
                instance_id: instance_id.to_string(),
                task_id: task_id.to_string(),
                fired_at,
            });
            Ok(())
        })
    }
}

/// One instance: its platform handle, scheduler and recorded firings.
pub struct Node {
    pub platform: Platform,
    pub scheduler: Scheduler,
    pub runner: Arc<RecordingRunner>,
}

pub async fn node(tmp: &TempDir, instance_id: &str) -> Node {
    node_with_runner(tmp, instance_id, Arc::new(RecordingRunner::default())).await
}

pub async fn node_with_runner(
    tmp: &TempDir,
    instance_id: &str,
    runner: Arc<RecordingRunner>,
) -> Node {
    let platform = Platform::open(&tmp.path().join("shared.db"), instance_id)
        .await
        .unwrap();
    let scheduler = platform.scheduler(runner.clone()).build();
    Node {
        platform,
        scheduler,
        runner,
    }
}

pub async fn next_due(platform: &Platform, task_id: &str) -> DateTime<Utc> {
    platform
        .engine
        .get(task_id)
        .await
        .unwrap()
        .expect("execution record")
        .next_due
}

pub async fn engine_paused(platform: &Platform, task_id: &str) -> bool {
    platform
        .engine
        .get(task_id)
        .await
        .unwrap()
        .expect("execution record")
        .payload
        .paused
}
