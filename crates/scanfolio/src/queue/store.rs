//! Durable queue store: the pending queue written out on every enqueue and dequeue so a restart
//! can resume where it stopped.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::QueueStoreError;

use super::item::QueueItem;

pub trait QueueStore: Send + Sync {
    fn load_queue(&self) -> Result<Vec<QueueItem>, QueueStoreError>;
    fn save_queue(&self, items: &[QueueItem]) -> Result<(), QueueStoreError>;
    fn clear_queue(&self) -> Result<(), QueueStoreError>;
}

const QUEUE_FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct QueueFile {
    version: u32,
    items: Vec<QueueItem>,
}

/// Queue persisted as one JSON document, replaced atomically through a temp file.
pub struct JsonQueueStore {
    path: PathBuf,
}

impl JsonQueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "queue.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl QueueStore for JsonQueueStore {
    fn load_queue(&self) -> Result<Vec<QueueItem>, QueueStoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(QueueStoreError::ReadFile {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let file: QueueFile = serde_json::from_str(&content)?;
        if file.version != QUEUE_FILE_VERSION {
            log::warn!(
                "Queue file {} has version {}, expected {}; loading anyway",
                self.path.display(),
                file.version,
                QUEUE_FILE_VERSION
            );
        }
        log::debug!("Loaded {} queued items", file.items.len());
        Ok(file.items)
    }

    fn save_queue(&self, items: &[QueueItem]) -> Result<(), QueueStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| QueueStoreError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(&QueueFile {
            version: QUEUE_FILE_VERSION,
            items: items.to_vec(),
        })?;

        let temp = self.temp_path();
        std::fs::write(&temp, json).map_err(|e| QueueStoreError::WriteFile {
            path: temp.clone(),
            source: e,
        })?;
        std::fs::rename(&temp, &self.path).map_err(|e| QueueStoreError::WriteFile {
            path: self.path.clone(),
            source: e,
        })
    }

    fn clear_queue(&self) -> Result<(), QueueStoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(QueueStoreError::WriteFile {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}

/// Queue store that only lives as long as the process.
#[derive(Default)]
pub struct MemoryQueueStore {
    items: Mutex<Vec<QueueItem>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<QueueItem>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }
}

impl QueueStore for MemoryQueueStore {
    fn load_queue(&self) -> Result<Vec<QueueItem>, QueueStoreError> {
        Ok(self
            .items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone())
    }

    fn save_queue(&self, items: &[QueueItem]) -> Result<(), QueueStoreError> {
        *self
            .items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = items.to_vec();
        Ok(())
    }

    fn clear_queue(&self) -> Result<(), QueueStoreError> {
        self.items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
        Ok(())
    }
}
