use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{
    Advance, AdvanceDisplayStatus, CreateInvoice, Invoice, InvoiceDisplayStatus, OfferTerms,
    RiskBand, RiskSignals, Settlement,
};

/// Auxiliary ratios for scored risk mode. Any one present switches it on.
#[derive(Debug, Default, Clone, Copy, Deserialize, Validate)]
pub struct SignalsRequest {
    #[validate(range(exclusive_min = 0.0, max = 1.0, message = "buyer_profile must be in (0, 1]"))]
    pub buyer_profile: Option<f64>,
    #[validate(range(exclusive_min = 0.0, max = 1.0, message = "payment_history must be in (0, 1]"))]
    pub payment_history: Option<f64>,
    #[validate(range(exclusive_min = 0.0, max = 1.0, message = "industry_factor must be in (0, 1]"))]
    pub industry_factor: Option<f64>,
}

impl From<SignalsRequest> for RiskSignals {
    fn from(req: SignalsRequest) -> Self {
        RiskSignals {
            buyer_profile: req.buyer_profile,
            payment_history: req.payment_history,
            industry_factor: req.industry_factor,
        }
    }
}

/// Manual entry. Required fields are optional here so that absence is
/// reported with the same error shape as any other invalid invoice.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ManualInvoiceRequest {
    #[validate(length(max = 255, message = "filename is too long"))]
    pub filename: Option<String>,
    #[validate(length(max = 64, message = "invoice_number is too long"))]
    pub invoice_number: Option<String>,
    pub amount: Option<i64>,
    #[validate(length(max = 255, message = "buyer is too long"))]
    pub buyer: Option<String>,
    pub due_date: Option<NaiveDate>,
    /// Overrides scoring. Unknown names are read as `medium`.
    pub risk_band: Option<String>,
    #[serde(flatten)]
    #[validate(nested)]
    pub signals: SignalsRequest,
}

impl From<ManualInvoiceRequest> for CreateInvoice {
    fn from(req: ManualInvoiceRequest) -> Self {
        CreateInvoice {
            filename: req.filename,
            invoice_number: req.invoice_number,
            amount: req.amount,
            buyer: req.buyer,
            due_date: req.due_date,
            risk_band: req.risk_band.as_deref().map(RiskBand::from_string),
            signals: req.signals.into(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExtractInvoiceRequest {
    #[validate(length(min = 1, max = 255, message = "filename is required"))]
    pub filename: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[validate(length(min = 1, message = "content_base64 is required"))]
    pub content_base64: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub signals: SignalsRequest,
}

fn default_content_type() -> String {
    "application/pdf".to_string()
}

#[derive(Debug, Deserialize, Validate)]
pub struct AcceptOfferRequest {
    pub advance_percent: Decimal,
    pub fee_percent: Decimal,
    #[validate(range(min = 1, message = "advance_amount must be positive"))]
    pub advance_amount: i64,
}

impl From<AcceptOfferRequest> for OfferTerms {
    fn from(req: AcceptOfferRequest) -> Self {
        OfferTerms {
            advance_percent: req.advance_percent,
            fee_percent: req.fee_percent,
            advance_amount: req.advance_amount,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub display_status: InvoiceDisplayStatus,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            display_status: invoice.display_status(),
            invoice,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    #[serde(flatten)]
    pub advance: Advance,
    pub display_status: AdvanceDisplayStatus,
    pub days_to_due: i64,
}

impl AdvanceResponse {
    pub fn at(advance: Advance, now: DateTime<Utc>) -> Self {
        Self {
            display_status: advance.display_status(now),
            days_to_due: advance.days_to_due(now),
            advance,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MarkPaidResponse {
    pub success: bool,
    pub settlement: Settlement,
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub count: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}
