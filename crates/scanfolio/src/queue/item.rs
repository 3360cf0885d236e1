use serde::{Deserialize, Serialize};

use crate::intake::SourceFile;
use crate::model::ProcessingMode;

/// One uploaded file waiting to be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: String,
    pub file: SourceFile,
    /// Page count known at enqueue time; intake reports the real count.
    pub estimated_page_count: usize,
    pub mode: ProcessingMode,
    #[serde(default)]
    pub extract_images: bool,
    /// Shared by every page of this file when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file_id: Option<String>,
}

impl QueueItem {
    pub fn new(file: SourceFile, mode: ProcessingMode) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file,
            estimated_page_count: 1,
            mode,
            extract_images: false,
            source_file_id: None,
        }
    }

    pub fn with_estimated_pages(mut self, pages: usize) -> Self {
        self.estimated_page_count = pages.max(1);
        self
    }

    pub fn with_extract_images(mut self, extract_images: bool) -> Self {
        self.extract_images = extract_images;
        self
    }

    pub fn with_source_file_id(mut self, id: impl Into<String>) -> Self {
        self.source_file_id = Some(id.into());
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file.name
    }
}
