use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn, Instrument};

use crate::model::AnalysisPayload;

use super::{AnalysisRequest, AnalysisResponse, AnalysisService, SafetyVerdict, TokenUsage};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum length of an error body quoted into a failure payload.
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
        Some((cut, _)) => format!("{}... (truncated)", &body[..cut]),
        None => body.to_string(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequestBody<'a> {
    image: String,
    mime_type: &'a str,
    mode: &'a str,
    extract_images: bool,
    file_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponseBody {
    analysis: AnalysisPayload,
    #[serde(default)]
    safety: SafetyVerdict,
    #[serde(default)]
    token_usage: TokenUsage,
}

/// Analysis service reached over a JSON HTTP endpoint.
pub struct HttpAnalysisService {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
}

impl HttpAnalysisService {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    async fn call(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, String> {
        let body = AnalyzeRequestBody {
            image: BASE64.encode(request.image_bytes.as_slice()),
            mime_type: &request.mime_type,
            mode: request.mode.as_str(),
            extract_images: request.extract_images,
            file_name: &request.file_name,
        };

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| format!("Analysis request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!(
                "Analysis service returned {}: {}",
                status,
                truncate_body(&text)
            ));
        }

        let parsed: AnalyzeResponseBody = response
            .json()
            .await
            .map_err(|e| format!("Invalid analysis response: {}", e))?;

        Ok(AnalysisResponse {
            analysis: parsed.analysis,
            safety: parsed.safety,
            token_usage: parsed.token_usage,
            processed_offline: false,
        })
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn analyze(&self, request: AnalysisRequest) -> AnalysisResponse {
        let span = tracing::info_span!("analysis.http", file = %request.file_name, mode = %request.mode);

        match self.call(&request).instrument(span).await {
            Ok(response) => {
                debug!(
                    category = %response.analysis.category,
                    tokens = response.token_usage.total(),
                    "Page analyzed"
                );
                response
            }
            Err(message) => {
                warn!("{}", message);
                AnalysisResponse::failure(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProcessingMode;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            image_bytes: Arc::new(vec![0xFF, 0xD8, 0xFF]),
            mime_type: "image/jpeg".to_string(),
            mode: ProcessingMode::Standard,
            extract_images: false,
            file_name: "scan.jpg".to_string(),
        }
    }

    fn service(server: &MockServer, api_key: Option<&str>) -> HttpAnalysisService {
        HttpAnalysisService::new(
            format!("{}/v1/analyze", server.uri()),
            api_key.map(|k| SecretString::from(k.to_string())),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_successful_analysis() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/analyze"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "image": BASE64.encode([0xFFu8, 0xD8, 0xFF]),
                "mimeType": "image/jpeg",
                "mode": "standard",
                "fileName": "scan.jpg"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "analysis": {
                    "category": "Invoice",
                    "subject": "ACME",
                    "groupingIdentifier": "INV-7",
                    "vendorVat": "CH-1"
                },
                "safety": {"isSafe": false},
                "tokenUsage": {"inputTokens": 10, "outputTokens": 5}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = service(&server, Some("sk-test")).analyze(request()).await;

        assert_eq!(response.analysis.category, "Invoice");
        assert_eq!(response.analysis.grouping_identifier.as_deref(), Some("INV-7"));
        assert!(response.analysis.extra.contains_key("vendorVat"));
        assert!(!response.safety.is_safe);
        assert_eq!(response.token_usage.total(), 15);
        assert!(!response.processed_offline);
    }

    #[tokio::test]
    async fn test_client_is_reusable_across_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/analyze"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"analysis": {"category": "Letter"}})),
            )
            .expect(3)
            .mount(&server)
            .await;

        let service = service(&server, None);
        for _ in 0..3 {
            let response = service.analyze(request()).await;
            assert_eq!(response.analysis.category, "Letter");
            assert!(response.safety.is_safe);
        }
    }

    #[tokio::test]
    async fn test_server_error_becomes_error_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({"error": "overloaded"})))
            .mount(&server)
            .await;

        let response = service(&server, None).analyze(request()).await;

        assert!(response.analysis.is_error());
        let message = response.analysis.error_message.as_deref().unwrap();
        assert!(message.contains("503"));
        assert!(message.contains("overloaded"));
    }

    #[tokio::test]
    async fn test_malformed_body_becomes_error_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
            .mount(&server)
            .await;

        let response = service(&server, None).analyze(request()).await;
        assert!(response.analysis.is_error());
        assert_eq!(response.cost(ProcessingMode::Standard), 0.0);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_becomes_error_payload() {
        // Bind then drop to get a port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let service = HttpAnalysisService::new(
            format!("http://127.0.0.1:{}/v1/analyze", port),
            None,
            Duration::from_secs(2),
        )
        .unwrap();

        let response = service.analyze(request()).await;
        assert!(response.analysis.is_error());
        assert_eq!(response.cost(ProcessingMode::Standard), 0.0);
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short"), "short");
        let long = "x".repeat(300);
        let truncated = truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(200)));
        assert!(truncated.ends_with("... (truncated)"));
    }
}
