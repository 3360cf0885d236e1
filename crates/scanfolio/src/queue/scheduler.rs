//! Queue scheduler: drives queued files through intake, analysis, duplicate detection and the
//! result store.
//!
//! One `run` loop owns processing. Control commands (`pause`, `resume`, `skip`, `cancel_all`)
//! come from any other task through a watch channel and are honoured between page submissions.
//! Cancellation bumps a generation counter. Analyses in flight at that moment are dropped, and a
//! loop of an older generation neither commits results nor touches the queue again, so a new
//! `run` may start right away.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::analysis::{AnalysisRequest, AnalysisService};
use crate::dedup;
use crate::error::{IntakeError, StoreError};
use crate::hooks::CommitHooks;
use crate::intake::{IntakeBatch, NormalizedPage, PageIntake};
use crate::model::PageResult;
use crate::sanitize;
use crate::store::{ResultStore, Snapshot};

use super::events::{QueueEventBroadcaster, QueueEventKind};
use super::images::{CachedImage, ImageCache};
use super::item::QueueItem;
use super::status::{ItemProgress, QueueState, QueueStatus};
use super::store::{MemoryQueueStore, QueueStore};

pub const DEFAULT_FAN_OUT_LIMIT: usize = 5;

/// How a call to [`Scheduler::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The queue is empty.
    Drained,
    /// `cancel_all` was called while the loop was running.
    Cancelled,
    /// Another `run` call already owns the queue.
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Control {
    paused: bool,
    skip: bool,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Checkpoint {
    Proceed,
    Skip,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Finished,
    Skipped,
    Cancelled,
}

#[derive(Default)]
struct Runtime {
    queue: VecDeque<QueueItem>,
    state: QueueState,
    current: Option<ItemProgress>,
    processed_pages: usize,
    skipped_pages: usize,
    total_pages: usize,
    warnings: Vec<String>,
    persistence_degraded: bool,
}

struct Inner {
    store: Arc<ResultStore>,
    analyzer: Arc<dyn AnalysisService>,
    intake: Arc<dyn PageIntake>,
    queue_store: Arc<dyn QueueStore>,
    hooks: CommitHooks,
    events: QueueEventBroadcaster,
    images: ImageCache,
    fan_out_limit: usize,
    runtime: Mutex<Runtime>,
    control: watch::Sender<Control>,
    /// Generation of the run loop that owns the queue.
    running: Mutex<Option<u64>>,
}

pub struct SchedulerBuilder {
    store: Arc<ResultStore>,
    analyzer: Arc<dyn AnalysisService>,
    intake: Arc<dyn PageIntake>,
    queue_store: Option<Arc<dyn QueueStore>>,
    hooks: Option<CommitHooks>,
    events: Option<QueueEventBroadcaster>,
    images: Option<ImageCache>,
    fan_out_limit: usize,
}

impl SchedulerBuilder {
    pub fn queue_store(mut self, queue_store: Arc<dyn QueueStore>) -> Self {
        self.queue_store = Some(queue_store);
        self
    }

    pub fn hooks(mut self, hooks: CommitHooks) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn events(mut self, events: QueueEventBroadcaster) -> Self {
        self.events = Some(events);
        self
    }

    pub fn images(mut self, images: ImageCache) -> Self {
        self.images = Some(images);
        self
    }

    pub fn fan_out_limit(mut self, limit: usize) -> Self {
        self.fan_out_limit = limit.max(1);
        self
    }

    pub fn build(self) -> Scheduler {
        let (control, _) = watch::channel(Control::default());
        Scheduler {
            inner: Arc::new(Inner {
                store: self.store,
                analyzer: self.analyzer,
                intake: self.intake,
                queue_store: self
                    .queue_store
                    .unwrap_or_else(|| Arc::new(MemoryQueueStore::new())),
                hooks: self.hooks.unwrap_or_default(),
                events: self.events.unwrap_or_default(),
                images: self.images.unwrap_or_default(),
                fan_out_limit: self.fan_out_limit,
                runtime: Mutex::new(Runtime::default()),
                control,
                running: Mutex::new(None),
            }),
        }
    }
}

/// Handle to the queue. Cheap to clone; all clones drive the same queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

/// Releases queue ownership when the run loop exits, unless a newer loop has taken it over.
struct RunningGuard<'a> {
    owner: &'a Mutex<Option<u64>>,
    generation: u64,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        if *owner == Some(self.generation) {
            *owner = None;
        }
    }
}

impl Scheduler {
    pub fn builder(
        store: Arc<ResultStore>,
        analyzer: Arc<dyn AnalysisService>,
        intake: Arc<dyn PageIntake>,
    ) -> SchedulerBuilder {
        SchedulerBuilder {
            store,
            analyzer,
            intake,
            queue_store: None,
            hooks: None,
            events: None,
            images: None,
            fan_out_limit: DEFAULT_FAN_OUT_LIMIT,
        }
    }

    pub fn store(&self) -> &Arc<ResultStore> {
        &self.inner.store
    }

    pub fn hooks(&self) -> &CommitHooks {
        &self.inner.hooks
    }

    pub fn events(&self) -> &QueueEventBroadcaster {
        &self.inner.events
    }

    pub fn images(&self) -> &ImageCache {
        &self.inner.images
    }

    pub fn is_running(&self) -> bool {
        self.owner().is_some()
    }

    // ─── Queue management ──────────────────────────────────────────────────

    /// Appends `item` to the queue and persists the queue.
    pub fn enqueue(&self, item: QueueItem) {
        info!(
            item_id = %item.id,
            file = %item.file_name(),
            mode = %item.mode,
            "Enqueued file"
        );
        let (snapshot, was_cancelled) = {
            let mut runtime = self.runtime();
            runtime.total_pages += item.estimated_page_count;
            runtime.queue.push_back(item);
            (
                runtime.queue.iter().cloned().collect::<Vec<_>>(),
                runtime.state == QueueState::Cancelled,
            )
        };
        if was_cancelled {
            self.set_state(QueueState::Idle);
        }
        self.persist(&snapshot);
    }

    /// Reloads items persisted by an earlier process. Returns how many were added.
    pub fn restore(&self) -> usize {
        let persisted = match self.inner.queue_store.load_queue() {
            Ok(items) => items,
            Err(e) => {
                self.degrade(format!("Could not load persisted queue: {}", e));
                return 0;
            }
        };

        let mut runtime = self.runtime();
        let mut added = 0;
        for item in persisted {
            if runtime.queue.iter().any(|queued| queued.id == item.id) {
                continue;
            }
            runtime.total_pages += item.estimated_page_count;
            runtime.queue.push_back(item);
            added += 1;
        }
        if added > 0 {
            info!(restored = added, "Restored queue from durable store");
        }
        added
    }

    pub fn queue_status(&self) -> QueueStatus {
        let runtime = self.runtime();
        let in_progress = usize::from(runtime.current.is_some());
        QueueStatus {
            state: runtime.state,
            current: runtime.current.clone(),
            pending: runtime.queue.len().saturating_sub(in_progress),
            processed_pages: runtime.processed_pages,
            skipped_pages: runtime.skipped_pages,
            total_pages: runtime.total_pages,
            warnings: runtime.warnings.clone(),
            persistence_degraded: runtime.persistence_degraded,
        }
    }

    pub fn queued_items(&self) -> Vec<QueueItem> {
        self.runtime().queue.iter().cloned().collect()
    }

    // ─── Control ───────────────────────────────────────────────────────────

    /// Stops submitting pages after the ones already in flight.
    pub fn pause(&self) {
        self.inner.control.send_modify(|c| c.paused = true);
        self.set_state(QueueState::Paused);
        info!("Queue paused");
    }

    pub fn resume(&self) {
        self.inner.control.send_modify(|c| c.paused = false);
        let next = if self.is_running() {
            QueueState::Running
        } else {
            QueueState::Idle
        };
        self.set_state(next);
        info!("Queue resumed");
    }

    /// Abandons the remaining pages of the file being processed.
    /// Returns false when no file is in progress.
    pub fn skip(&self) -> bool {
        let runtime = self.runtime();
        if runtime.current.is_none() {
            return false;
        }
        self.inner.control.send_modify(|c| c.skip = true);
        info!("Skipping remaining pages of current file");
        true
    }

    /// Empties the queue and its durable copy. Committed results stay; analyses still in flight
    /// are abandoned and a new `run` is accepted immediately.
    pub fn cancel_all(&self) {
        self.inner.control.send_modify(|c| {
            c.generation += 1;
            c.paused = false;
            c.skip = false;
        });

        {
            let mut runtime = self.runtime();
            runtime.queue.clear();
            runtime.current = None;
            runtime.processed_pages = 0;
            runtime.skipped_pages = 0;
            runtime.total_pages = 0;
            runtime.warnings.clear();
        }
        self.set_state(QueueState::Cancelled);

        if let Err(e) = self.inner.queue_store.clear_queue() {
            self.degrade(format!("Could not clear persisted queue: {}", e));
        }
        info!("Queue cancelled");
    }

    // ─── Processing ────────────────────────────────────────────────────────

    /// Processes queued files until the queue is empty or cancelled.
    ///
    /// Returns [`RunOutcome::AlreadyRunning`] while a loop of the current generation is active.
    /// A loop left over from before `cancel_all` does not block a new one.
    pub async fn run(&self) -> Result<RunOutcome, StoreError> {
        let mut control = self.inner.control.subscribe();
        let generation = control.borrow_and_update().generation;
        {
            let mut owner = self.owner();
            match *owner {
                Some(active) if active == generation => return Ok(RunOutcome::AlreadyRunning),
                Some(stale) => debug!(stale, generation, "Taking over queue from cancelled run"),
                None => {}
            }
            *owner = Some(generation);
        }
        let _running = RunningGuard {
            owner: &self.inner.running,
            generation,
        };

        let initial = if control.borrow().paused {
            QueueState::Paused
        } else {
            QueueState::Running
        };
        self.set_state(initial);

        loop {
            if self.checkpoint(&mut control, generation, false).await == Checkpoint::Cancelled {
                return Ok(RunOutcome::Cancelled);
            }

            let next = self.runtime().queue.front().cloned();
            let item = match next {
                Some(item) => item,
                None => break,
            };

            let span = info_span!("queue.item", item_id = %item.id, file = %item.file_name());
            let outcome = self
                .process_item(&item, generation, &mut control)
                .instrument(span)
                .await?;

            if outcome == ItemOutcome::Cancelled {
                return Ok(RunOutcome::Cancelled);
            }
            self.finish_item(&item, outcome, generation);
        }

        if self.generation() == generation {
            let paused = self.inner.control.borrow().paused;
            self.set_state(if paused {
                QueueState::Paused
            } else {
                QueueState::Idle
            });
        }
        debug!("Queue drained");
        Ok(RunOutcome::Drained)
    }

    async fn process_item(
        &self,
        item: &QueueItem,
        generation: u64,
        control: &mut watch::Receiver<Control>,
    ) -> Result<ItemOutcome, StoreError> {
        {
            let Some(mut runtime) = self.runtime_for(generation) else {
                return Ok(ItemOutcome::Cancelled);
            };
            self.inner.control.send_modify(|c| c.skip = false);
            runtime.current = Some(ItemProgress {
                item_id: item.id.clone(),
                file_name: item.file_name().to_string(),
                pages_done: 0,
                pages_total: item.estimated_page_count,
                pages_skipped: 0,
            });
        }

        let batch = self.normalize(item).await;

        let source_file_id = batch.source_file_id.clone();
        let pages_total = batch.page_count();
        let mut pages: Vec<NormalizedPage> = Vec::with_capacity(pages_total);
        let mut failures = Vec::new();
        for (index, page) in batch.pages.into_iter().enumerate() {
            match page {
                Ok(page) => pages.push(page),
                Err(e) => failures.push(format!(
                    "Page {} of {} could not be read and was skipped: {}",
                    index + 1,
                    item.file_name(),
                    e
                )),
            }
        }

        {
            let Some(mut runtime) = self.runtime_for(generation) else {
                return Ok(ItemOutcome::Cancelled);
            };
            runtime.total_pages =
                (runtime.total_pages + pages_total).saturating_sub(item.estimated_page_count);
            runtime.skipped_pages += failures.len();
            if let Some(current) = runtime.current.as_mut() {
                current.pages_total = pages_total;
                current.pages_skipped = failures.len();
            }
        }
        for failure in failures {
            self.warn(failure);
        }
        self.inner.events.send(QueueEventKind::ItemStarted {
            item_id: item.id.clone(),
            file_name: item.file_name().to_string(),
            pages_total,
        });

        let fan_out = item.mode.fan_out(self.inner.fan_out_limit);
        let mut remaining = pages.len();
        for chunk in pages.chunks(fan_out) {
            match self.checkpoint(control, generation, true).await {
                Checkpoint::Proceed => {}
                Checkpoint::Cancelled => return Ok(ItemOutcome::Cancelled),
                Checkpoint::Skip => {
                    self.record_skip(item, remaining, generation);
                    return Ok(ItemOutcome::Skipped);
                }
            }

            let shared: Vec<Arc<Vec<u8>>> = chunk
                .iter()
                .map(|page| Arc::new(page.image_bytes.clone()))
                .collect();
            let analyses = join_all(chunk.iter().zip(&shared).map(|(page, bytes)| {
                self.inner.analyzer.analyze(AnalysisRequest {
                    image_bytes: Arc::clone(bytes),
                    mime_type: page.mime_type.clone(),
                    mode: item.mode,
                    extract_images: item.extract_images,
                    file_name: item.file_name().to_string(),
                })
            }));
            let responses = tokio::select! {
                responses = analyses => responses,
                () = wait_for_cancel(control, generation) => {
                    info!(pages = chunk.len(), "Dropping in-flight analysis after cancel");
                    return Ok(ItemOutcome::Cancelled);
                }
            };

            if self.generation() != generation {
                info!(pages = chunk.len(), "Discarding analysis results after cancel");
                return Ok(ItemOutcome::Cancelled);
            }

            let committed = self.inner.store.ingest(|snapshot, first_page_number| {
                if self.generation() != generation {
                    return Vec::new();
                }
                let batch: Vec<PageResult> = chunk
                    .iter()
                    .zip(responses)
                    .enumerate()
                    .map(|(offset, (page, response))| {
                        let cost_in_coins = response.cost(item.mode);
                        let processed_offline = response.processed_offline;
                        PageResult {
                            page_number: first_page_number + offset as u32,
                            uuid: uuid::Uuid::new_v4().to_string(),
                            content_hash: page.content_hash.clone(),
                            source_file_id: source_file_id.clone(),
                            source_file_name: item.file_name().to_string(),
                            analysis: response.into_payload(),
                            processing_mode: item.mode,
                            cost_in_coins,
                            timestamp: Utc::now(),
                            is_potential_duplicate_of: None,
                            tags: Default::default(),
                            feedback: None,
                            processed_offline,
                        }
                    })
                    .collect();
                dedup::flag_batch(batch, snapshot.results())
            })?;
            if committed.is_empty() {
                return Ok(ItemOutcome::Cancelled);
            }

            for (result, bytes) in committed.iter().zip(shared) {
                self.inner.images.insert(
                    result.uuid.clone(),
                    CachedImage {
                        bytes,
                        mime_type: crate::intake::CANONICAL_MIME_TYPE.to_string(),
                        extract_images: item.extract_images,
                    },
                );
            }
            remaining -= chunk.len();
            self.record_commit(item, &committed, generation);
        }

        Ok(ItemOutcome::Finished)
    }

    async fn normalize(&self, item: &QueueItem) -> IntakeBatch {
        let intake = Arc::clone(&self.inner.intake);
        let file = item.file.clone();
        let source_file_id = item.source_file_id.clone();

        tokio::task::spawn_blocking(move || intake.normalize(&file, source_file_id.as_deref()))
            .await
            .unwrap_or_else(|e| {
                IntakeBatch::failed(
                    &item.file,
                    item.source_file_id.as_deref(),
                    IntakeError::Worker(e.to_string()),
                )
            })
    }

    /// Waits out a pause. Skip requests only end the wait when `honor_skip` is set.
    async fn checkpoint(
        &self,
        control: &mut watch::Receiver<Control>,
        generation: u64,
        honor_skip: bool,
    ) -> Checkpoint {
        loop {
            let current = *control.borrow_and_update();
            if current.generation != generation {
                return Checkpoint::Cancelled;
            }
            if honor_skip && current.skip {
                return Checkpoint::Skip;
            }
            if !current.paused {
                return Checkpoint::Proceed;
            }
            if control.changed().await.is_err() {
                return Checkpoint::Cancelled;
            }
        }
    }

    fn record_commit(&self, item: &QueueItem, committed: &[PageResult], generation: u64) {
        if let Some(mut runtime) = self.runtime_for(generation) {
            runtime.processed_pages += committed.len();
            if let Some(current) = runtime.current.as_mut() {
                current.pages_done += committed.len();
            }
        }

        for result in committed {
            debug!(
                page_number = result.page_number,
                hash = %sanitize::short_hash(&result.content_hash),
                category = %result.analysis.category,
                "Committed page"
            );
            self.inner.events.send(QueueEventKind::PageCommitted {
                item_id: item.id.clone(),
                page_number: result.page_number,
                is_error: result.is_error(),
                is_potential_duplicate: result.is_potential_duplicate_of.is_some(),
            });
        }

        let snapshot = self.inner.store.current();
        self.inner.hooks.results_committed(committed, &snapshot);
    }

    fn record_skip(&self, item: &QueueItem, pages_skipped: usize, generation: u64) {
        if let Some(mut runtime) = self.runtime_for(generation) {
            runtime.skipped_pages += pages_skipped;
            if let Some(current) = runtime.current.as_mut() {
                current.pages_skipped += pages_skipped;
            }
        }
        info!(pages_skipped, "Skipped remaining pages");
        self.inner.events.send(QueueEventKind::ItemSkipped {
            item_id: item.id.clone(),
            pages_skipped,
        });
    }

    fn finish_item(&self, item: &QueueItem, outcome: ItemOutcome, generation: u64) {
        let (snapshot, pages_done) = {
            let Some(mut runtime) = self.runtime_for(generation) else {
                return;
            };
            if runtime.queue.front().is_some_and(|front| front.id == item.id) {
                runtime.queue.pop_front();
            }
            let pages_done = runtime.current.take().map(|c| c.pages_done).unwrap_or(0);
            (runtime.queue.iter().cloned().collect::<Vec<_>>(), pages_done)
        };
        self.inner.control.send_modify(|c| c.skip = false);
        self.persist(&snapshot);

        if outcome == ItemOutcome::Finished {
            info!(pages_done, "Finished file");
            self.inner.events.send(QueueEventKind::ItemFinished {
                item_id: item.id.clone(),
                pages_done,
            });
        }
    }

    // ─── Retry ─────────────────────────────────────────────────────────────

    /// Sends a page's canonical image through analysis again and replaces its analysis in a new
    /// undoable snapshot. Page number, uuid and duplicate link are kept.
    pub async fn retry_page(&self, page_number: u32) -> Result<Snapshot, StoreError> {
        let snapshot = self.inner.store.current();
        let page = snapshot
            .find_by_page(page_number)
            .ok_or(StoreError::PageNotFound(page_number))?;
        let image = self
            .inner
            .images
            .get(&page.uuid)
            .ok_or(StoreError::ImageUnavailable(page_number))?;

        let uuid = page.uuid.clone();
        let mode = page.processing_mode;
        let span = info_span!("queue.retry", page_number);
        let response = self
            .inner
            .analyzer
            .analyze(AnalysisRequest {
                image_bytes: image.bytes,
                mime_type: image.mime_type,
                mode,
                extract_images: image.extract_images,
                file_name: page.source_file_name.clone(),
            })
            .instrument(span)
            .await;

        let cost_in_coins = response.cost(mode);
        let processed_offline = response.processed_offline;
        let mut analysis = response.into_payload();

        self.inner.store.try_set_state(|current| {
            let mut next = current.to_vec();
            let target = next
                .iter_mut()
                .find(|r| r.uuid == uuid)
                .ok_or_else(|| StoreError::ResultNotFound(uuid.clone()))?;
            if target.is_confirmed_duplicate() {
                analysis.category = target.analysis.category.clone();
            }
            target.analysis = analysis;
            target.cost_in_coins = cost_in_coins;
            target.processed_offline = processed_offline;
            target.timestamp = Utc::now();
            Ok(next)
        })
    }

    // ─── Internals ─────────────────────────────────────────────────────────

    fn runtime(&self) -> MutexGuard<'_, Runtime> {
        self.inner
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The runtime, or `None` once `generation` has been cancelled.
    fn runtime_for(&self, generation: u64) -> Option<MutexGuard<'_, Runtime>> {
        let runtime = self.runtime();
        (self.generation() == generation).then_some(runtime)
    }

    fn owner(&self) -> MutexGuard<'_, Option<u64>> {
        self.inner
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn generation(&self) -> u64 {
        self.inner.control.borrow().generation
    }

    fn set_state(&self, state: QueueState) {
        let changed = {
            let mut runtime = self.runtime();
            let changed = runtime.state != state;
            runtime.state = state;
            changed
        };
        if changed {
            self.inner.events.send(QueueEventKind::StateChanged { state });
        }
    }

    fn persist(&self, items: &[QueueItem]) {
        if let Err(e) = self.inner.queue_store.save_queue(items) {
            self.degrade(format!("Could not persist queue: {}", e));
        }
    }

    fn degrade(&self, message: String) {
        self.runtime().persistence_degraded = true;
        self.warn(message);
    }

    fn warn(&self, message: String) {
        warn!("{}", message);
        self.runtime().warnings.push(message.clone());
        self.inner.events.send(QueueEventKind::Warning { message });
    }
}

/// Resolves once `generation` has been cancelled.
async fn wait_for_cancel(control: &mut watch::Receiver<Control>, generation: u64) {
    loop {
        if control.borrow_and_update().generation != generation {
            return;
        }
        if control.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::OfflineAnalysisService;
    use crate::intake::{NormalizedPage, SourceFile};
    use crate::model::ProcessingMode;

    /// Every file yields one page whose hash is the file name.
    struct OnePageIntake;

    impl PageIntake for OnePageIntake {
        fn normalize(&self, file: &SourceFile, source_file_id: Option<&str>) -> IntakeBatch {
            IntakeBatch {
                source_file_id: source_file_id.map(str::to_string),
                file_name: file.name.clone(),
                pages: vec![Ok(NormalizedPage {
                    page_index: 0,
                    image_bytes: file.name.as_bytes().to_vec(),
                    mime_type: crate::intake::CANONICAL_MIME_TYPE.to_string(),
                    content_hash: file.name.clone(),
                    width: 1,
                    height: 1,
                })],
            }
        }
    }

    fn scheduler() -> Scheduler {
        Scheduler::builder(
            Arc::new(ResultStore::new()),
            Arc::new(OfflineAnalysisService::new()),
            Arc::new(OnePageIntake),
        )
        .build()
    }

    fn item(name: &str) -> QueueItem {
        QueueItem::new(SourceFile::new(name), ProcessingMode::Standard)
    }

    #[tokio::test]
    async fn test_run_drains_queue() {
        let scheduler = scheduler();
        scheduler.enqueue(item("a.jpg"));
        scheduler.enqueue(item("b.jpg"));
        assert_eq!(scheduler.queue_status().pending, 2);

        assert_eq!(scheduler.run().await.unwrap(), RunOutcome::Drained);

        let status = scheduler.queue_status();
        assert_eq!(status.state, QueueState::Idle);
        assert_eq!(status.processed_pages, 2);
        assert_eq!(status.pending, 0);
        assert!(status.current.is_none());

        let snapshot = scheduler.store().current();
        let numbers: Vec<u32> = snapshot.iter().map(|r| r.page_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert!(snapshot.iter().all(|r| r.processed_offline && r.cost_in_coins == 0.0));
        assert!(scheduler.images().contains(&snapshot[0].uuid));
    }

    #[tokio::test]
    async fn test_ingest_does_not_create_undo_steps() {
        let scheduler = scheduler();
        scheduler.enqueue(item("a.jpg"));
        scheduler.run().await.unwrap();

        assert_eq!(scheduler.store().history_len(), 1);
        assert!(!scheduler.store().can_undo());
    }

    #[test]
    fn test_skip_without_current_item_is_rejected() {
        assert!(!scheduler().skip());
    }

    #[test]
    fn test_pause_and_resume_while_idle() {
        let scheduler = scheduler();
        scheduler.pause();
        assert_eq!(scheduler.queue_status().state, QueueState::Paused);
        scheduler.resume();
        assert_eq!(scheduler.queue_status().state, QueueState::Idle);
    }

    #[test]
    fn test_cancel_all_clears_queue_and_counters() {
        let scheduler = scheduler();
        scheduler.enqueue(item("a.jpg").with_estimated_pages(4));
        assert_eq!(scheduler.queue_status().total_pages, 4);

        scheduler.cancel_all();
        let status = scheduler.queue_status();
        assert_eq!(status.state, QueueState::Cancelled);
        assert_eq!(status.pending, 0);
        assert_eq!(status.total_pages, 0);

        scheduler.enqueue(item("b.jpg"));
        assert_eq!(scheduler.queue_status().state, QueueState::Idle);
    }

    #[tokio::test]
    async fn test_retry_unknown_page() {
        let err = scheduler().retry_page(42).await.unwrap_err();
        assert_eq!(err, StoreError::PageNotFound(42));
    }

    #[tokio::test]
    async fn test_second_run_reports_already_running() {
        let scheduler = scheduler();
        scheduler.pause();
        scheduler.enqueue(item("a.jpg"));

        let background = scheduler.clone();
        let handle = tokio::spawn(async move { background.run().await });
        while !scheduler.is_running() {
            tokio::task::yield_now().await;
        }

        assert_eq!(scheduler.run().await.unwrap(), RunOutcome::AlreadyRunning);
        scheduler.resume();
        assert_eq!(handle.await.unwrap().unwrap(), RunOutcome::Drained);
    }
}
