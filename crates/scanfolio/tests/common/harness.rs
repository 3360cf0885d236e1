//! Test harness wiring a session around scripted collaborators.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use scanfolio::analysis::AnalysisService;
use scanfolio::intake::{PageIntake, SourceFile};
use scanfolio::queue::{JsonQueueStore, QueueItem, QueueStatus, QueueStore, Scheduler};
use scanfolio::store::ResultStore;
use scanfolio::{ProcessingMode, Session};
use tempfile::TempDir;

use super::fakes::{FakeIntake, ScriptedAnalyzer};

/// Owns a session, its fakes, and a temporary directory for the durable queue.
pub struct TestHarness {
    pub analyzer: Arc<ScriptedAnalyzer>,
    pub intake: Arc<FakeIntake>,
    pub session: Session,
    pub temp_dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_fan_out(5)
    }

    pub fn with_fan_out(fan_out_limit: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let analyzer = Arc::new(ScriptedAnalyzer::new());
        let intake = Arc::new(FakeIntake::new());
        let queue_path = temp_dir.path().join("queue.json");
        let session = Session::new(Self::scheduler(
            &analyzer,
            &intake,
            Arc::new(JsonQueueStore::new(&queue_path)),
            fan_out_limit,
        ));

        Self {
            analyzer,
            intake,
            session,
            temp_dir,
        }
    }

    /// A second scheduler over the same fakes and queue file, as after a restart.
    pub fn restarted(&self) -> Scheduler {
        Self::scheduler(
            &self.analyzer,
            &self.intake,
            Arc::new(JsonQueueStore::new(self.queue_path())),
            5,
        )
    }

    fn scheduler(
        analyzer: &Arc<ScriptedAnalyzer>,
        intake: &Arc<FakeIntake>,
        queue_store: Arc<dyn QueueStore>,
        fan_out_limit: usize,
    ) -> Scheduler {
        let analyzer: Arc<dyn AnalysisService> = analyzer.clone();
        let intake: Arc<dyn PageIntake> = intake.clone();
        Scheduler::builder(Arc::new(ResultStore::new()), analyzer, intake)
        .queue_store(queue_store)
        .fan_out_limit(fan_out_limit)
        .build()
    }

    pub fn scheduler_handle(&self) -> &Scheduler {
        self.session.scheduler()
    }

    pub fn queue_path(&self) -> PathBuf {
        self.temp_dir.path().join("queue.json")
    }

    pub fn enqueue(&self, name: &str, mode: ProcessingMode) -> QueueItem {
        let item = QueueItem::new(SourceFile::new(format!("/scans/{}", name)), mode);
        self.session.enqueue(item.clone());
        item
    }

    /// Processes everything queued so far.
    pub async fn drain(&self) {
        self.session
            .run_until_idle()
            .await
            .expect("run loop failed");
    }

    /// Polls the queue status until `predicate` holds, panicking after five seconds.
    pub async fn wait_for_status<F>(&self, predicate: F) -> QueueStatus
    where
        F: Fn(&QueueStatus) -> bool,
    {
        wait_for_status(self.session.scheduler(), predicate).await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn wait_for_status<F>(scheduler: &Scheduler, predicate: F) -> QueueStatus
where
    F: Fn(&QueueStatus) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let status = scheduler.queue_status();
        if predicate(&status) {
            return status;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting for queue status, last seen: {:?}", status);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
