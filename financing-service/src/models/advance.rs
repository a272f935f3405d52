//! Advance model for financing-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::RiskBand;
use crate::clock::days_until;

/// Days before the due date at which an active advance is flagged.
pub const DUE_SOON_DAYS: i64 = 7;

/// Persisted advance status. Overdue is never stored, see [`Advance::display_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceStatus {
    Active,
    Paid,
}

impl AdvanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdvanceStatus::Active => "active",
            AdvanceStatus::Paid => "paid",
        }
    }
}

/// Read-time label of an advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceDisplayStatus {
    Active,
    DueSoon,
    Overdue,
    Paid,
}

/// Funds disbursed against an accepted invoice, stored at `advance:<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advance {
    pub id: String,
    pub invoice_id: String,
    pub owner_id: String,
    pub filename: String,
    pub buyer: String,
    pub invoice_amount: i64,
    pub advance_amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advance_percent: Option<Decimal>,
    pub fee_percent: Decimal,
    pub due_date: NaiveDate,
    pub status: AdvanceStatus,
    pub risk_band: RiskBand,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl Advance {
    pub fn days_to_due(&self, now: DateTime<Utc>) -> i64 {
        days_until(self.due_date, now)
    }

    /// Label derived from the stored fields and `now`. Never written back.
    pub fn display_status(&self, now: DateTime<Utc>) -> AdvanceDisplayStatus {
        if self.status == AdvanceStatus::Paid {
            return AdvanceDisplayStatus::Paid;
        }
        match self.days_to_due(now) {
            d if d < 0 => AdvanceDisplayStatus::Overdue,
            d if d <= DUE_SOON_DAYS => AdvanceDisplayStatus::DueSoon,
            _ => AdvanceDisplayStatus::Active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn advance(due_date: NaiveDate, status: AdvanceStatus) -> Advance {
        Advance {
            id: "adv-1".to_string(),
            invoice_id: "inv-1".to_string(),
            owner_id: "owner-1".to_string(),
            filename: "a.pdf".to_string(),
            buyer: "Acme".to_string(),
            invoice_amount: 10_000,
            advance_amount: 9_000,
            advance_percent: Some(Decimal::from(90)),
            fee_percent: Decimal::new(25, 1),
            due_date,
            status,
            risk_band: RiskBand::Low,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            paid_at: None,
        }
    }

    #[test]
    fn test_display_status_windows() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let today = now.date_naive();

        let far = advance(today + Duration::days(30), AdvanceStatus::Active);
        assert_eq!(far.display_status(now), AdvanceDisplayStatus::Active);

        let edge = advance(today + Duration::days(7), AdvanceStatus::Active);
        assert_eq!(edge.display_status(now), AdvanceDisplayStatus::DueSoon);

        let beyond = advance(today + Duration::days(8), AdvanceStatus::Active);
        assert_eq!(beyond.display_status(now), AdvanceDisplayStatus::Active);

        let due_today = advance(today, AdvanceStatus::Active);
        assert_eq!(due_today.display_status(now), AdvanceDisplayStatus::DueSoon);

        let late = advance(today - Duration::days(1), AdvanceStatus::Active);
        assert_eq!(late.display_status(now), AdvanceDisplayStatus::Overdue);
    }

    #[test]
    fn test_paid_is_always_paid() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let late = advance(now.date_naive() - Duration::days(40), AdvanceStatus::Paid);
        assert_eq!(late.display_status(now), AdvanceDisplayStatus::Paid);
    }
}
