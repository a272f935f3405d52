//! Banded advance terms.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::FinancingError;
use crate::models::{Offer, OfferTerms, RiskBand};

#[derive(Debug, Clone, Copy, Default)]
pub struct OfferCalculator;

impl OfferCalculator {
    pub fn new() -> Self {
        Self
    }

    /// `(advance %, fee %)` for a band.
    pub fn rates(&self, band: RiskBand) -> (Decimal, Decimal) {
        match band {
            RiskBand::Low => (Decimal::from(90), Decimal::new(25, 1)),
            RiskBand::Medium => (Decimal::from(85), Decimal::new(30, 1)),
            RiskBand::High => (Decimal::from(80), Decimal::new(35, 1)),
        }
    }

    pub fn calculate(&self, amount: i64, band: RiskBand) -> Offer {
        let (advance_percent, fee_percent) = self.rates(band);
        let advance_amount = percent_of(amount, advance_percent);
        let fee_amount = percent_of(amount, fee_percent);

        Offer {
            risk_band: band,
            advance_percent,
            fee_percent,
            advance_amount,
            fee_amount,
            net_received: advance_amount,
            remaining_amount: amount - advance_amount - fee_amount,
        }
    }
}

/// `floor(amount × percent / 100)` in exact decimal arithmetic.
pub fn percent_of(amount: i64, percent: Decimal) -> i64 {
    (Decimal::from(amount) * percent / Decimal::ONE_HUNDRED)
        .floor()
        .to_i64()
        .unwrap_or(0)
}

/// Check supplied terms against the invariants for an invoice of `amount`.
pub fn validate_terms(amount: i64, terms: &OfferTerms) -> Result<(), FinancingError> {
    if terms.advance_percent <= Decimal::ZERO || terms.advance_percent > Decimal::ONE_HUNDRED {
        return Err(FinancingError::validation(
            "advance_percent must be in (0, 100]",
        ));
    }
    if terms.fee_percent <= Decimal::ZERO || terms.fee_percent >= Decimal::ONE_HUNDRED {
        return Err(FinancingError::validation("fee_percent must be in (0, 100)"));
    }

    let expected = percent_of(amount, terms.advance_percent);
    if terms.advance_amount != expected {
        return Err(FinancingError::validation(format!(
            "advance_amount {} does not match {}% of {} (expected {})",
            terms.advance_amount, terms.advance_percent, amount, expected
        )));
    }

    let fee_amount = percent_of(amount, terms.fee_percent);
    let drawn = terms
        .advance_amount
        .checked_add(fee_amount)
        .ok_or_else(|| FinancingError::validation("advance plus fee overflows"))?;
    if drawn > amount {
        return Err(FinancingError::validation(
            "advance plus fee exceeds the invoice amount",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_band_offer() {
        let offer = OfferCalculator::new().calculate(25_000, RiskBand::Low);
        assert_eq!(offer.advance_percent, Decimal::from(90));
        assert_eq!(offer.advance_amount, 22_500);
        assert_eq!(offer.fee_percent, Decimal::new(25, 1));
        assert_eq!(offer.fee_amount, 625);
        assert_eq!(offer.net_received, 22_500);
        assert_eq!(offer.remaining_amount, 1_875);
    }

    #[test]
    fn test_high_band_offer() {
        let offer = OfferCalculator::new().calculate(42_000, RiskBand::High);
        assert_eq!(offer.advance_percent, Decimal::from(80));
        assert_eq!(offer.advance_amount, 33_600);
        assert_eq!(offer.fee_percent, Decimal::new(35, 1));
        assert_eq!(offer.fee_amount, 1_470);
        assert_eq!(offer.remaining_amount, 6_930);
    }

    #[test]
    fn test_medium_band_offer_floors() {
        let offer = OfferCalculator::new().calculate(10_001, RiskBand::Medium);
        // 85% of 10001 = 8500.85, 3% = 300.03
        assert_eq!(offer.advance_amount, 8_500);
        assert_eq!(offer.fee_amount, 300);
        assert_eq!(offer.remaining_amount, 1_201);
    }

    #[test]
    fn test_advance_plus_fee_never_exceeds_amount() {
        let calc = OfferCalculator::new();
        for band in [RiskBand::Low, RiskBand::Medium, RiskBand::High] {
            for amount in (1..=5_000).chain([99_999, 1_000_000, 123_456_789]) {
                let offer = calc.calculate(amount, band);
                assert!(
                    offer.advance_amount + offer.fee_amount <= amount,
                    "{} {}",
                    band,
                    amount
                );
                assert!(offer.remaining_amount >= 0);
            }
        }
    }

    #[test]
    fn test_validate_terms_accepts_computed_offer() {
        let offer = OfferCalculator::new().calculate(42_000, RiskBand::High);
        assert!(validate_terms(42_000, &OfferTerms::from(&offer)).is_ok());
    }

    #[test]
    fn test_validate_terms_rejects_bad_terms() {
        let ok = OfferTerms {
            advance_percent: Decimal::from(90),
            fee_percent: Decimal::new(25, 1),
            advance_amount: 22_500,
        };

        let zero_fee = OfferTerms {
            fee_percent: Decimal::ZERO,
            ..ok.clone()
        };
        assert!(validate_terms(25_000, &zero_fee).is_err());

        let over_advance = OfferTerms {
            advance_percent: Decimal::from(101),
            ..ok.clone()
        };
        assert!(validate_terms(25_000, &over_advance).is_err());

        let wrong_amount = OfferTerms {
            advance_amount: 23_000,
            ..ok.clone()
        };
        assert!(validate_terms(25_000, &wrong_amount).is_err());

        let overdrawn = OfferTerms {
            advance_percent: Decimal::from(100),
            fee_percent: Decimal::from(5),
            advance_amount: 25_000,
        };
        assert!(validate_terms(25_000, &overdrawn).is_err());
    }

    #[test]
    fn test_validate_terms_rejects_overflowing_terms() {
        let terms = OfferTerms {
            advance_percent: Decimal::from(100),
            fee_percent: Decimal::new(5, 1),
            advance_amount: i64::MAX,
        };
        let err = validate_terms(i64::MAX, &terms).unwrap_err();
        assert!(matches!(err, FinancingError::Validation(_)));
    }
}
