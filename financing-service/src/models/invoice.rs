//! Invoice model for financing-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{RiskBand, RiskSignals};

/// Persisted invoice status.
///
/// Acceptance writes `Advanced` directly. `Offered` and `Settled` are
/// recognised when reading stored records but never written by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Uploaded,
    Offered,
    Advanced,
    Settled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Uploaded => "uploaded",
            InvoiceStatus::Offered => "offered",
            InvoiceStatus::Advanced => "advanced",
            InvoiceStatus::Settled => "settled",
        }
    }
}

/// How an invoice entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceSource {
    Extraction,
    Manual,
}

impl InvoiceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceSource::Extraction => "extraction",
            InvoiceSource::Manual => "manual",
        }
    }
}

/// Status as shown to a reader. An uploaded invoice has an offer waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceDisplayStatus {
    Offered,
    Advanced,
    Settled,
}

/// Invoice record, stored at `invoice:<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub owner_id: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    /// Minor currency units.
    pub amount: i64,
    pub buyer: String,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub risk_band: RiskBand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<InvoiceSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advance_percent: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_percent: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advance_amount: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn display_status(&self) -> InvoiceDisplayStatus {
        match self.status {
            InvoiceStatus::Uploaded | InvoiceStatus::Offered => InvoiceDisplayStatus::Offered,
            InvoiceStatus::Advanced => InvoiceDisplayStatus::Advanced,
            InvoiceStatus::Settled => InvoiceDisplayStatus::Settled,
        }
    }
}

/// Input for manual invoice entry. Every field is optional here so that
/// missing values surface as validation errors, not decode failures.
#[derive(Debug, Clone, Default)]
pub struct CreateInvoice {
    pub filename: Option<String>,
    pub invoice_number: Option<String>,
    pub amount: Option<i64>,
    pub buyer: Option<String>,
    pub due_date: Option<NaiveDate>,
    /// Band chosen by the caller; scored from the other fields when absent.
    pub risk_band: Option<RiskBand>,
    pub signals: RiskSignals,
}
