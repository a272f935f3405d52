use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use std::time::Duration;

use super::{Document, ExtractedInvoice, ExtractionError, Extractor};

#[derive(Debug, Clone)]
pub struct RemoteExtractorConfig {
    /// Full URL of the extraction endpoint.
    pub endpoint: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    filename: &'a str,
    content_type: &'a str,
    content_base64: String,
}

/// Extraction over HTTP: the document is posted as base64 JSON and the
/// endpoint answers with an [`ExtractedInvoice`].
pub struct RemoteExtractor {
    client: reqwest::Client,
    config: RemoteExtractorConfig,
}

impl RemoteExtractor {
    pub fn new(config: RemoteExtractorConfig) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Extractor for RemoteExtractor {
    async fn extract(&self, document: &Document) -> Result<ExtractedInvoice, ExtractionError> {
        if document.bytes.is_empty() {
            return Err(ExtractionError::InvalidDocument(
                "document is empty".to_string(),
            ));
        }

        let request = ExtractRequest {
            filename: &document.filename,
            content_type: &document.content_type,
            content_base64: general_purpose::STANDARD.encode(&document.bytes),
        };

        tracing::debug!(
            endpoint = %self.config.endpoint,
            filename = %document.filename,
            size_bytes = document.bytes.len(),
            "Requesting extraction"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractionError::Backend(format!(
                        "timed out after {}s",
                        self.config.timeout.as_secs()
                    ))
                } else {
                    ExtractionError::Backend(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Extraction backend rejected document");
            return Err(ExtractionError::Backend(format!(
                "endpoint returned {}",
                status
            )));
        }

        response
            .json::<ExtractedInvoice>()
            .await
            .map_err(|e| ExtractionError::InvalidResponse(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
