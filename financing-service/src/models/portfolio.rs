//! Per-owner portfolio roll-up.

use serde::{Deserialize, Serialize};

/// Totals across one owner's invoices, advances and settlements, computed at
/// read time. Amounts are minor units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub invoice_count: usize,
    /// Uploaded invoices whose offer has not been accepted.
    pub awaiting_acceptance: usize,
    pub active_advances: usize,
    pub overdue_advances: usize,
    /// Advanced amount still waiting on buyer payment.
    pub outstanding_amount: i64,
    pub total_advanced: i64,
    pub settled_count: usize,
    pub total_fees: i64,
    pub total_remitted: i64,
    pub average_days_to_pay: Option<f64>,
}
