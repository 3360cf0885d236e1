//! Contract with the external page analysis service.
//!
//! The model is a black box: one request per page image, one structured payload back. Failures
//! never surface as `Err`; every implementation folds them into an `ERROR` payload so the
//! scheduler can commit exactly one result per page.

pub mod http;
pub mod offline;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{AnalysisPayload, ProcessingMode};

pub use http::HttpAnalysisService;
pub use offline::OfflineAnalysisService;

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub image_bytes: Arc<Vec<u8>>,
    pub mime_type: String,
    pub mode: ProcessingMode,
    /// Ask the service to also extract embedded photos/figures.
    pub extract_images: bool,
    /// Redacted file name, for the service's own logs.
    pub file_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyVerdict {
    pub is_safe: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Default for SafetyVerdict {
    fn default() -> Self {
        Self {
            is_safe: true,
            reason: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResponse {
    pub analysis: AnalysisPayload,
    pub safety: SafetyVerdict,
    pub token_usage: TokenUsage,
    pub processed_offline: bool,
}

impl AnalysisResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            analysis: AnalysisPayload::error(message),
            safety: SafetyVerdict::default(),
            token_usage: TokenUsage::default(),
            processed_offline: false,
        }
    }

    /// Payload with the safety verdict folded in; a page is only safe if both sides agree.
    pub fn into_payload(self) -> AnalysisPayload {
        let mut analysis = self.analysis;
        analysis.is_safe = analysis.is_safe && self.safety.is_safe;
        analysis
    }

    /// Coins charged for this response in `mode`.
    pub fn cost(&self, mode: ProcessingMode) -> f64 {
        if self.processed_offline || self.analysis.is_error() {
            0.0
        } else {
            mode.cost_per_page()
        }
    }
}

#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest) -> AnalysisResponse;
}
