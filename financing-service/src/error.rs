//! Error taxonomy of the financing engine and its mapping onto HTTP.

use service_core::error::AppError;
use thiserror::Error;

use crate::services::extractor::{ExtractedInvoice, ExtractionError};
use crate::services::store::StoreError;

/// Seconds a client should wait before retrying after a store outage.
const STORE_RETRY_AFTER_SECS: u64 = 1;

#[derive(Debug, Error)]
pub enum FinancingError {
    /// Missing or malformed input. Not retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown id, or an id owned by somebody else.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Invoice {0} has already been advanced")]
    AlreadyAdvanced(String),

    #[error("Advance {0} has already been settled")]
    AlreadySettled(String),

    /// Transient persistence failure. Retryable, never "absent".
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// Extraction failed or was not trusted. The caller falls back to
    /// manual entry, optionally pre-filled from `draft`.
    #[error("Extraction failed: {source}")]
    ExtractionFailed {
        #[source]
        source: ExtractionError,
        draft: Option<Box<ExtractedInvoice>>,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl FinancingError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        FinancingError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        FinancingError::Validation(msg.into())
    }
}

impl From<StoreError> for FinancingError {
    fn from(err: StoreError) -> Self {
        FinancingError::StoreUnavailable(err)
    }
}

impl From<FinancingError> for AppError {
    fn from(err: FinancingError) -> Self {
        match err {
            FinancingError::Validation(msg) => AppError::Unprocessable {
                message: msg,
                details: None,
            },
            e @ FinancingError::NotFound { .. } => AppError::NotFound(anyhow::anyhow!(e)),
            e @ (FinancingError::AlreadyAdvanced(_) | FinancingError::AlreadySettled(_)) => {
                AppError::Conflict(anyhow::anyhow!(e))
            }
            FinancingError::StoreUnavailable(e) => {
                tracing::warn!(error = %e, "Store unavailable");
                AppError::ServiceUnavailable(
                    "Store temporarily unavailable".to_string(),
                    Some(STORE_RETRY_AFTER_SECS),
                )
            }
            FinancingError::ExtractionFailed { source, draft } => AppError::Unprocessable {
                message: format!("Extraction failed: {}", source),
                details: Some(serde_json::json!({
                    "fallback": "manual_entry",
                    "reason": source.reason(),
                    "draft": draft,
                })),
            },
            FinancingError::Internal(e) => AppError::InternalError(e),
        }
    }
}
