use async_trait::async_trait;

use crate::model::AnalysisPayload;

use super::{AnalysisRequest, AnalysisResponse, AnalysisService, SafetyVerdict, TokenUsage};

pub const OFFLINE_CATEGORY: &str = "UNCLASSIFIED";

/// Fallback used when the remote service is disabled or unreachable by configuration.
///
/// Pages are accepted unclassified and free of charge; their grouping falls back to the source
/// file (or the placeholder key for loose images).
#[derive(Debug, Default, Clone)]
pub struct OfflineAnalysisService;

impl OfflineAnalysisService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AnalysisService for OfflineAnalysisService {
    async fn analyze(&self, request: AnalysisRequest) -> AnalysisResponse {
        tracing::debug!(file = %request.file_name, "Offline analysis");

        let mut analysis = AnalysisPayload::new(OFFLINE_CATEGORY);
        analysis.folder_title = std::path::Path::new(&request.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string);

        AnalysisResponse {
            analysis,
            safety: SafetyVerdict::default(),
            token_usage: TokenUsage::default(),
            processed_offline: true,
        }
    }
}
