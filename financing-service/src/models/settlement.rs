//! Settlement model for financing-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::RiskBand;

/// Reconciliation of a paid advance, stored at `settlement:<id>`. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advance_id: Option<String>,
    pub invoice_id: String,
    pub owner_id: String,
    pub filename: String,
    pub buyer: String,
    pub invoice_amount: i64,
    pub advance_amount: i64,
    pub fee_amount: i64,
    pub fee_percent: Decimal,
    pub remaining_amount: i64,
    /// Amount remitted to the supplier; equals `remaining_amount`.
    pub settlement_amount: i64,
    pub paid_date: DateTime<Utc>,
    /// Creation time of the advance this settles.
    pub created_at: DateTime<Utc>,
    pub risk_band: RiskBand,
    pub days_to_pay: i64,
}
