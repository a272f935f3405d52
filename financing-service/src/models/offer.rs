//! Offer terms.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::RiskBand;

/// Terms computed for an invoice amount and band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub risk_band: RiskBand,
    pub advance_percent: Decimal,
    pub fee_percent: Decimal,
    pub advance_amount: i64,
    pub fee_amount: i64,
    /// What the supplier receives now; equals `advance_amount`.
    pub net_received: i64,
    pub remaining_amount: i64,
}

/// Terms submitted by the supplier when accepting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferTerms {
    pub advance_percent: Decimal,
    pub fee_percent: Decimal,
    pub advance_amount: i64,
}

impl From<&Offer> for OfferTerms {
    fn from(offer: &Offer) -> Self {
        Self {
            advance_percent: offer.advance_percent,
            fee_percent: offer.fee_percent,
            advance_amount: offer.advance_amount,
        }
    }
}
