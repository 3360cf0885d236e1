//! Scripted collaborators for driving the scheduler deterministically.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use scanfolio::analysis::{AnalysisRequest, AnalysisResponse, AnalysisService, TokenUsage};
use scanfolio::intake::{IntakeBatch, NormalizedPage, PageIntake, SourceFile, CANONICAL_MIME_TYPE};
use scanfolio::model::{AnalysisPayload, PageResult};
use scanfolio::{IntakeError, ResultObserver, Scheduler};
use tokio::sync::{Notify, Semaphore};

/// Behaviour of the analyzer for one page key.
#[derive(Debug, Clone, Default)]
pub struct PageScript {
    pub subject: Option<String>,
    pub identifier: Option<String>,
    pub page_estimate: Option<String>,
    pub delay: Duration,
    /// Number of calls that fail before the page starts succeeding.
    pub failures: usize,
    pub unsafe_content: bool,
}

/// Analysis service answering from a per-page script.
///
/// The page key is the image bytes produced by [`FakeIntake`], e.g. `"a.pdf#2"`. Unscripted pages
/// get their file name as subject, so all pages of one file share an AI group key.
#[derive(Default)]
pub struct ScriptedAnalyzer {
    scripts: Mutex<HashMap<String, PageScript>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    gate: Mutex<Option<Arc<Semaphore>>>,
    entered: Arc<Notify>,
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, key: &str, script: PageScript) {
        self.scripts.lock().unwrap().insert(key.to_string(), script);
    }

    /// Blocks every call until a permit is added to the returned semaphore.
    pub fn hold(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Resolves once a call has started.
    pub async fn wait_for_call(&self) {
        self.entered.notified().await;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisService for ScriptedAnalyzer {
    async fn analyze(&self, request: AnalysisRequest) -> AnalysisResponse {
        let key = String::from_utf8_lossy(&request.image_bytes).to_string();
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(key.clone());
        self.entered.notify_one();

        let (script, attempt_fails) = {
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts.entry(key.clone()).or_default();
            let fails = script.failures > 0;
            if fails {
                script.failures -= 1;
            }
            (script.clone(), fails)
        };

        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if attempt_fails {
            return AnalysisResponse::failure(format!("scripted failure for {}", key));
        }

        let file = key.split('#').next().unwrap_or_default().to_string();
        let mut analysis = AnalysisPayload::new("Document");
        analysis.subject = Some(script.subject.clone().unwrap_or(file));
        analysis.grouping_subject = analysis.subject.clone();
        analysis.grouping_identifier = script.identifier.clone();
        analysis.page_estimate = script.page_estimate.clone();
        analysis.is_safe = !script.unsafe_content;

        AnalysisResponse {
            analysis,
            safety: Default::default(),
            token_usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 20,
            },
            processed_offline: false,
        }
    }
}

/// One page a [`FakeIntake`] file yields.
#[derive(Debug, Clone)]
pub struct FakePage {
    pub hash: String,
    pub readable: bool,
}

/// Intake that fabricates pages from a table keyed by file name.
///
/// Each page's image bytes are its key `"<file>#<index>"`. Multi-page files get a
/// `src-<file>` source file id when the queue item carries none.
#[derive(Default)]
pub struct FakeIntake {
    files: Mutex<HashMap<String, Vec<FakePage>>>,
}

impl FakeIntake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a file whose pages all have distinct hashes.
    pub fn file(&self, name: &str, pages: usize) -> &Self {
        let pages = (0..pages)
            .map(|i| FakePage {
                hash: format!("{}#{}", name, i),
                readable: true,
            })
            .collect();
        self.files.lock().unwrap().insert(name.to_string(), pages);
        self
    }

    /// Registers a file with explicit page hashes.
    pub fn file_with_hashes(&self, name: &str, hashes: &[&str]) -> &Self {
        let pages = hashes
            .iter()
            .map(|h| FakePage {
                hash: h.to_string(),
                readable: true,
            })
            .collect();
        self.files.lock().unwrap().insert(name.to_string(), pages);
        self
    }

    pub fn file_with_pages(&self, name: &str, pages: Vec<FakePage>) -> &Self {
        self.files.lock().unwrap().insert(name.to_string(), pages);
        self
    }
}

impl PageIntake for FakeIntake {
    fn normalize(&self, file: &SourceFile, source_file_id: Option<&str>) -> IntakeBatch {
        let pages = match self.files.lock().unwrap().get(&file.name) {
            Some(pages) => pages.clone(),
            None => {
                return IntakeBatch::failed(
                    file,
                    source_file_id,
                    IntakeError::UnsupportedFormat("unknown".to_string()),
                )
            }
        };

        let source_file_id = match source_file_id {
            Some(id) => Some(id.to_string()),
            None if pages.len() > 1 => Some(format!("src-{}", file.name)),
            None => None,
        };

        IntakeBatch {
            source_file_id,
            file_name: file.name.clone(),
            pages: pages
                .into_iter()
                .enumerate()
                .map(|(index, page)| {
                    if !page.readable {
                        return Err(IntakeError::Decode(format!(
                            "page {} is an unreadable scan",
                            index
                        )));
                    }
                    Ok(NormalizedPage {
                        page_index: index,
                        image_bytes: format!("{}#{}", file.name, index).into_bytes(),
                        mime_type: CANONICAL_MIME_TYPE.to_string(),
                        content_hash: page.hash,
                        width: 100,
                        height: 140,
                    })
                })
                .collect(),
        }
    }
}

/// Control command an observer issues against the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Skip,
    CancelAll,
}

/// Issues `command` once, right after the first result is committed.
pub struct CommandOnFirstCommit {
    command: Command,
    scheduler: OnceLock<Scheduler>,
    fired: AtomicBool,
    committed: Mutex<Vec<PageResult>>,
}

impl CommandOnFirstCommit {
    pub fn new(command: Command) -> Arc<Self> {
        Arc::new(Self {
            command,
            scheduler: OnceLock::new(),
            fired: AtomicBool::new(false),
            committed: Mutex::new(Vec::new()),
        })
    }

    pub fn attach(&self, scheduler: &Scheduler) {
        let _ = self.scheduler.set(scheduler.clone());
    }

    pub fn committed(&self) -> Vec<PageResult> {
        self.committed.lock().unwrap().clone()
    }
}

impl ResultObserver for CommandOnFirstCommit {
    fn on_result_committed(&self, result: &PageResult) {
        self.committed.lock().unwrap().push(result.clone());
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(scheduler) = self.scheduler.get() {
            match self.command {
                Command::Pause => scheduler.pause(),
                Command::Skip => {
                    scheduler.skip();
                }
                Command::CancelAll => scheduler.cancel_all(),
            }
        }
    }
}
