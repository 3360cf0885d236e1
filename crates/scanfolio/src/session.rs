//! Facade the UI talks to.
//!
//! Every mutating command goes through the result store, then refreshes the grouping projection
//! so observers see the new groups.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

use crate::analysis::{AnalysisService, HttpAnalysisService, OfflineAnalysisService};
use crate::config::Config;
use crate::dedup;
use crate::error::{ConfigError, ScanfolioError, StoreError};
use crate::grouping::{self, DocumentGroup};
use crate::hooks::{CommitHooks, ResultObserver};
use crate::intake::{IntakeNormalizer, IntakeOptions, SourceFile};
use crate::model::{Feedback, PageResult, ProcessingMode};
use crate::queue::{
    JsonQueueStore, QueueEvent, QueueItem, QueueStatus, RunOutcome, Scheduler,
};
use crate::secrets;
use crate::store::{ResultStore, Snapshot};

pub struct Session {
    scheduler: Scheduler,
    default_mode: ProcessingMode,
    extract_images: bool,
}

impl Session {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            default_mode: ProcessingMode::default(),
            extract_images: false,
        }
    }

    pub fn with_defaults(mut self, mode: ProcessingMode, extract_images: bool) -> Self {
        self.default_mode = mode;
        self.extract_images = extract_images;
        self
    }

    /// Wires the production collaborators described by `config` and restores any queue left
    /// behind by a previous run.
    pub fn from_config(config: &Config) -> Result<Self, ScanfolioError> {
        let analyzer: Arc<dyn AnalysisService> = if config.analysis.offline {
            Arc::new(OfflineAnalysisService::new())
        } else {
            let endpoint = config.analysis.endpoint.clone().ok_or_else(|| {
                ConfigError::Validation {
                    message: "analysis.endpoint is required unless analysis.offline is set"
                        .to_string(),
                }
            })?;
            let api_key = secrets::resolve_api_key(&config.analysis)?;
            let service = HttpAnalysisService::new(
                endpoint,
                api_key,
                Duration::from_secs(config.analysis.timeout_secs),
            )
            .map_err(|e| ScanfolioError::AnalysisClient(e.to_string()))?;
            Arc::new(service)
        };

        let intake = IntakeNormalizer::new(IntakeOptions::from_config(&config.intake));
        let queue_store = JsonQueueStore::new(config.resolved_queue_store_path());

        let scheduler = Scheduler::builder(Arc::new(ResultStore::new()), analyzer, Arc::new(intake))
            .queue_store(Arc::new(queue_store))
            .fan_out_limit(config.scheduler.fan_out_limit)
            .build();

        let restored = scheduler.restore();
        info!(
            restored,
            offline = config.analysis.offline,
            "Session ready"
        );

        Ok(Self::new(scheduler).with_defaults(
            config.scheduler.default_mode,
            config.scheduler.extract_images,
        ))
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn store(&self) -> &ResultStore {
        self.scheduler.store()
    }

    fn hooks(&self) -> &CommitHooks {
        self.scheduler.hooks()
    }

    // ─── Processing ────────────────────────────────────────────────────────

    /// Runs the queue on a background task.
    pub fn start(&self) -> JoinHandle<Result<RunOutcome, StoreError>> {
        let scheduler = self.scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    }

    /// Runs the queue on the current task until it drains or is cancelled.
    pub async fn run_until_idle(&self) -> Result<RunOutcome, StoreError> {
        self.scheduler.run().await
    }

    /// Queues a file with the session's default mode.
    pub fn enqueue_file(&self, path: impl Into<PathBuf>) -> QueueItem {
        let item = QueueItem::new(SourceFile::new(path), self.default_mode)
            .with_extract_images(self.extract_images);
        self.enqueue(item.clone());
        item
    }

    pub fn enqueue(&self, item: QueueItem) {
        self.scheduler.enqueue(item);
    }

    pub fn pause(&self) {
        self.scheduler.pause();
    }

    pub fn resume(&self) {
        self.scheduler.resume();
    }

    pub fn skip(&self) -> bool {
        self.scheduler.skip()
    }

    pub fn cancel_all(&self) {
        self.scheduler.cancel_all();
    }

    pub async fn retry_page(&self, page_number: u32) -> Result<Snapshot, StoreError> {
        let snapshot = self.scheduler.retry_page(page_number).await?;
        self.hooks().groups(&snapshot);
        Ok(snapshot)
    }

    // ─── Reads ─────────────────────────────────────────────────────────────

    pub fn current_snapshot(&self) -> Snapshot {
        self.store().current()
    }

    pub fn current_groups(&self) -> Arc<Vec<DocumentGroup>> {
        self.hooks().groups(&self.store().current())
    }

    pub fn queue_status(&self) -> QueueStatus {
        self.scheduler.queue_status()
    }

    pub fn can_undo(&self) -> bool {
        self.store().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.store().can_redo()
    }

    // ─── Edits ─────────────────────────────────────────────────────────────

    pub fn confirm_duplicate(&self, page_number: u32) -> Result<Snapshot, StoreError> {
        self.commit(|current| dedup::confirm_duplicate(current, page_number))
    }

    /// Clears a duplicate flag. The page rejoins grouping and observers receive it as a newly
    /// committed result.
    pub fn deny_duplicate(&self, page_number: u32) -> Result<Snapshot, StoreError> {
        let snapshot = self
            .store()
            .try_set_state(|current| dedup::deny_duplicate(current.results(), page_number))?;
        let denied: Vec<PageResult> = snapshot
            .find_by_page(page_number)
            .cloned()
            .into_iter()
            .collect();
        self.hooks().results_committed(&denied, &snapshot);
        Ok(snapshot)
    }

    pub fn merge_groups(&self, group_ids: &[String]) -> Result<Snapshot, StoreError> {
        self.commit(|current| grouping::merge_groups(current, group_ids))
    }

    /// Applies a free-form edit to one result. Its uuid, page number and duplicate link cannot
    /// change; duplicate decisions go through `confirm_duplicate` and `deny_duplicate`.
    pub fn update_result<F>(&self, uuid: &str, edit: F) -> Result<Snapshot, StoreError>
    where
        F: FnOnce(&mut PageResult),
    {
        self.commit(|current| {
            let mut next = current.to_vec();
            let target = next
                .iter_mut()
                .find(|r| r.uuid == uuid)
                .ok_or_else(|| StoreError::ResultNotFound(uuid.to_string()))?;

            let page_number = target.page_number;
            let duplicate_of = target.is_potential_duplicate_of.clone();
            edit(target);
            if target.uuid != uuid || target.page_number != page_number {
                return Err(StoreError::Invariant(format!(
                    "edit of result '{}' changed its identity",
                    uuid
                )));
            }
            if target.is_potential_duplicate_of != duplicate_of {
                return Err(StoreError::Invariant(format!(
                    "edit of result '{}' changed its duplicate link",
                    uuid
                )));
            }
            Ok(next)
        })
    }

    pub fn set_feedback(
        &self,
        page_number: u32,
        feedback: Option<Feedback>,
    ) -> Result<Snapshot, StoreError> {
        self.edit_page(page_number, |page| page.feedback = feedback)
    }

    pub fn set_tags(&self, page_number: u32, tags: BTreeSet<String>) -> Result<Snapshot, StoreError> {
        self.edit_page(page_number, |page| page.tags = tags)
    }

    pub fn undo(&self) -> bool {
        let moved = self.store().undo();
        if moved {
            self.current_groups();
        }
        moved
    }

    pub fn redo(&self) -> bool {
        let moved = self.store().redo();
        if moved {
            self.current_groups();
        }
        moved
    }

    // ─── Subscriptions ─────────────────────────────────────────────────────

    pub fn register_observer(&self, observer: Arc<dyn ResultObserver>) {
        self.hooks().register(observer);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<QueueEvent> {
        self.scheduler.events().subscribe()
    }

    fn edit_page<F>(&self, page_number: u32, edit: F) -> Result<Snapshot, StoreError>
    where
        F: FnOnce(&mut PageResult),
    {
        self.commit(|current| {
            let mut next = current.to_vec();
            let target = next
                .iter_mut()
                .find(|r| r.page_number == page_number)
                .ok_or(StoreError::PageNotFound(page_number))?;
            edit(target);
            Ok(next)
        })
    }

    fn commit<F>(&self, updater: F) -> Result<Snapshot, StoreError>
    where
        F: FnOnce(&[PageResult]) -> Result<Vec<PageResult>, StoreError>,
    {
        let snapshot = self.store().try_set_state(|current| updater(current.results()))?;
        self.hooks().groups(&snapshot);
        Ok(snapshot)
    }
}
