//! Document extraction seam.
//!
//! An [`Extractor`] turns an uploaded document into a structured draft. It is
//! an external collaborator: the lifecycle decides what to do with a failed
//! or untrusted draft (fall back to manual entry), never the extractor.

pub mod remote;
pub mod simulated;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use remote::{RemoteExtractor, RemoteExtractorConfig};
pub use simulated::SimulatedExtractor;

/// An uploaded invoice document.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Structured draft returned by an extractor. Fields the extractor could not
/// read are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedInvoice {
    #[serde(default)]
    pub buyer: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    /// Overall confidence in `[0, 1]`.
    pub confidence: f64,
}

impl ExtractedInvoice {
    /// Names of required fields the draft lacks.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.buyer.as_deref().map_or(true, |b| b.trim().is_empty()) {
            missing.push("buyer");
        }
        if self.amount.is_none() {
            missing.push("amount");
        }
        if self.due_date.is_none() {
            missing.push("due_date");
        }
        missing
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("document rejected: {0}")]
    InvalidDocument(String),

    #[error("extraction backend error: {0}")]
    Backend(String),

    #[error("extraction backend returned an unreadable response: {0}")]
    InvalidResponse(String),

    #[error("confidence {confidence:.2} is below the minimum {minimum:.2}")]
    LowConfidence { confidence: f64, minimum: f64 },

    #[error("draft is missing {}", .0.join(", "))]
    Incomplete(Vec<&'static str>),

    #[error("draft is not a valid invoice: {0}")]
    InvalidDraft(String),
}

impl ExtractionError {
    /// Stable machine-readable reason for API responses.
    pub fn reason(&self) -> &'static str {
        match self {
            ExtractionError::InvalidDocument(_) => "invalid_document",
            ExtractionError::Backend(_) => "backend_error",
            ExtractionError::InvalidResponse(_) => "invalid_response",
            ExtractionError::LowConfidence { .. } => "low_confidence",
            ExtractionError::Incomplete(_) => "incomplete",
            ExtractionError::InvalidDraft(_) => "invalid_draft",
        }
    }
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, document: &Document) -> Result<ExtractedInvoice, ExtractionError>;

    /// Backend name for logs and metrics.
    fn name(&self) -> &'static str;
}
