//! Builders for page results and config documents.

#![allow(dead_code)]

use chrono::Utc;
use scanfolio::model::{AnalysisPayload, DuplicateRef, Feedback, PageResult, ProcessingMode};

/// Builder for `PageResult` instances with predictable defaults.
pub struct PageResultBuilder {
    result: PageResult,
}

impl PageResultBuilder {
    pub fn new(page_number: u32) -> Self {
        let mut analysis = AnalysisPayload::new("Document");
        analysis.subject = Some(format!("Subject {}", page_number));
        Self {
            result: PageResult {
                page_number,
                uuid: format!("uuid-{}", page_number),
                content_hash: format!("hash-{}", page_number),
                source_file_id: None,
                source_file_name: format!("page-{}.jpg", page_number),
                analysis,
                processing_mode: ProcessingMode::Standard,
                cost_in_coins: 1.0,
                timestamp: Utc::now(),
                is_potential_duplicate_of: None,
                tags: Default::default(),
                feedback: None,
                processed_offline: false,
            },
        }
    }

    pub fn hash(mut self, hash: &str) -> Self {
        self.result.content_hash = hash.to_string();
        self
    }

    pub fn file(mut self, source_file_id: &str) -> Self {
        self.result.source_file_id = Some(source_file_id.to_string());
        self
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.result.analysis.subject = Some(subject.to_string());
        self.result.analysis.grouping_subject = Some(subject.to_string());
        self
    }

    pub fn identifier(mut self, identifier: &str) -> Self {
        self.result.analysis.grouping_identifier = Some(identifier.to_string());
        self
    }

    pub fn folder_title(mut self, title: &str) -> Self {
        self.result.analysis.folder_title = Some(title.to_string());
        self
    }

    pub fn page_estimate(mut self, estimate: &str) -> Self {
        self.result.analysis.page_estimate = Some(estimate.to_string());
        self
    }

    pub fn unsafe_content(mut self) -> Self {
        self.result.analysis.is_safe = false;
        self
    }

    pub fn error(mut self, message: &str) -> Self {
        self.result.analysis = AnalysisPayload::error(message);
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.result.tags.insert(tag.to_string());
        self
    }

    pub fn feedback(mut self, feedback: Feedback) -> Self {
        self.result.feedback = Some(feedback);
        self
    }

    pub fn duplicate_of(mut self, original: &PageResult) -> Self {
        self.result.is_potential_duplicate_of = Some(DuplicateRef {
            page_number: original.page_number,
            source_file_name: original.source_file_name.clone(),
            image_ref: original.uuid.clone(),
        });
        self
    }

    pub fn build(self) -> PageResult {
        self.result
    }
}

/// Minimal valid config document, optionally extended with raw JSON members.
pub fn config_json(extra_members: &str) -> String {
    if extra_members.trim().is_empty() {
        r#"{"version": "1.0", "analysis": {"offline": true}}"#.to_string()
    } else {
        format!(r#"{{"version": "1.0", {}}}"#, extra_members)
    }
}
