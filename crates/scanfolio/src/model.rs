//! Core result types shared by the scheduler, the result store and the grouping engine.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category the analysis layer assigns to a page whose analysis failed.
pub const ERROR_CATEGORY: &str = "ERROR";

/// Category assigned to a page the user confirmed as a duplicate.
pub const CONFIRMED_DUPLICATE_CATEGORY: &str = "DUPLICATE_CONFIRMED";

/// Cost/quality tier a file is processed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    Economy,
    #[default]
    Standard,
    Premium,
    /// Standard quality, but several pages of the same file are analyzed concurrently.
    Parallel,
}

impl ProcessingMode {
    /// Coins charged for one successfully analyzed page.
    pub fn cost_per_page(&self) -> f64 {
        match self {
            ProcessingMode::Economy => 0.5,
            ProcessingMode::Standard => 1.0,
            ProcessingMode::Premium => 3.0,
            ProcessingMode::Parallel => 1.5,
        }
    }

    /// Number of pages of one file that may be in flight at once.
    pub fn fan_out(&self, limit: usize) -> usize {
        match self {
            ProcessingMode::Parallel => limit.max(1),
            _ => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::Economy => "economy",
            ProcessingMode::Standard => "standard",
            ProcessingMode::Premium => "premium",
            ProcessingMode::Parallel => "parallel",
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// Structured result returned by the analysis service for one page.
///
/// Fields the core does not interpret are kept in `extra` so edits round-trip them untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_title: Option<String>,
    /// Subject key the model proposes for grouping pages into one document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping_subject: Option<String>,
    /// Identifier key (invoice number, contract year, ...) paired with `grouping_subject`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping_identifier: Option<String>,
    /// Free-form "page N of M" estimate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_estimate: Option<String>,
    #[serde(default = "default_true")]
    pub is_safe: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AnalysisPayload {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            subject: None,
            folder_title: None,
            grouping_subject: None,
            grouping_identifier: None,
            page_estimate: None,
            is_safe: true,
            error_message: None,
            extra: serde_json::Map::new(),
        }
    }

    /// In-band failure payload. Errors never escape the analysis layer as `Err`.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::new(ERROR_CATEGORY)
        }
    }

    pub fn is_error(&self) -> bool {
        self.category == ERROR_CATEGORY
    }

    pub fn is_confirmed_duplicate(&self) -> bool {
        self.category == CONFIRMED_DUPLICATE_CATEGORY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Good,
    Bad,
}

/// Link from a flagged page to the earlier page it appears to repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateRef {
    pub page_number: u32,
    pub source_file_name: String,
    /// Key of the original's canonical image in the image cache (its uuid).
    pub image_ref: String,
}

/// One analyzed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub page_number: u32,
    pub uuid: String,
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file_id: Option<String>,
    pub source_file_name: String,
    pub analysis: AnalysisPayload,
    pub processing_mode: ProcessingMode,
    pub cost_in_coins: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_potential_duplicate_of: Option<DuplicateRef>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    #[serde(default)]
    pub processed_offline: bool,
}

impl PageResult {
    pub fn is_error(&self) -> bool {
        self.analysis.is_error()
    }

    pub fn is_confirmed_duplicate(&self) -> bool {
        self.analysis.is_confirmed_duplicate()
    }

    /// Flagged against an earlier page and still waiting for the user's decision.
    pub fn is_pending_duplicate(&self) -> bool {
        self.is_potential_duplicate_of.is_some() && !self.is_confirmed_duplicate()
    }

    /// Eligible to be the original that later uploads are compared against.
    pub fn is_accepted(&self) -> bool {
        self.is_potential_duplicate_of.is_none() && !self.is_confirmed_duplicate()
    }

    /// Takes part in the grouping projection.
    pub fn is_groupable(&self) -> bool {
        !self.is_confirmed_duplicate() && !self.is_pending_duplicate()
    }
}
