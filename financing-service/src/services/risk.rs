//! Deterministic risk scoring.
//!
//! Two modes share one band vocabulary: a threshold table on amount and days
//! to due, and a score built from deductions and auxiliary ratios. Scoring
//! never fails.

use chrono::{DateTime, NaiveDate, Utc};

use crate::clock::days_until;
use crate::models::{RiskAssessment, RiskBand, RiskSignals, ScoringMode};

const BASE_SCORE: f64 = 0.8;
const MIN_SCORE: f64 = 0.1;
const MAX_SCORE: f64 = 1.0;

const LOW_BAND_MIN_SCORE: f64 = 0.8;
const MEDIUM_BAND_MIN_SCORE: f64 = 0.6;

/// Inputs to one assessment. Amount and due date are optional so that a
/// malformed draft still gets a band.
#[derive(Debug, Clone, Default)]
pub struct RiskInput {
    pub amount: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub signals: RiskSignals,
    /// Extractor confidence; only applied in scored mode.
    pub extraction_confidence: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RiskScoringEngine;

impl RiskScoringEngine {
    pub fn new() -> Self {
        Self
    }

    /// Pick a mode and score. Scored mode applies when at least one
    /// auxiliary signal is present; missing amount or due date yields medium.
    pub fn assess(&self, input: &RiskInput, now: DateTime<Utc>) -> RiskAssessment {
        let (amount, due_date) = match (input.amount, input.due_date) {
            (Some(amount), Some(due_date)) => (amount, due_date),
            _ => {
                tracing::warn!("Risk input incomplete, defaulting to medium band");
                return simple_assessment(RiskBand::Medium);
            }
        };
        let days_to_due = days_until(due_date, now);

        if input.signals.is_empty() {
            return simple_assessment(self.simple_band(amount, days_to_due));
        }

        let ratios = [
            input.signals.buyer_profile,
            input.signals.payment_history,
            input.signals.industry_factor,
            input.extraction_confidence,
        ];
        let score = self.score(amount, days_to_due, ratios.into_iter().flatten());
        RiskAssessment {
            band: band_for_score(score),
            score,
            mode: ScoringMode::Scored,
        }
    }

    /// Threshold table on structural fields only. The low-band amount bound
    /// is inclusive: a 25 000 invoice due within 60 days is low risk.
    pub fn simple_band(&self, amount: i64, days_to_due: i64) -> RiskBand {
        if amount <= 25_000 && days_to_due < 60 {
            RiskBand::Low
        } else if amount < 40_000 && days_to_due < 45 {
            RiskBand::Medium
        } else {
            RiskBand::High
        }
    }

    /// Base score minus size and tenor deductions, scaled by each ratio in
    /// `(0, 1]` and clamped to `[0.1, 1.0]`. Out-of-range ratios are ignored.
    pub fn score<I>(&self, amount: i64, days_to_due: i64, ratios: I) -> f64
    where
        I: IntoIterator<Item = f64>,
    {
        let mut score = BASE_SCORE;

        if amount > 50_000 {
            score -= 0.10;
        } else if amount > 30_000 {
            score -= 0.05;
        }

        if days_to_due > 60 {
            score -= 0.10;
        } else if days_to_due > 45 {
            score -= 0.05;
        }

        for ratio in ratios {
            if ratio > 0.0 && ratio <= 1.0 {
                score *= ratio;
            } else {
                tracing::warn!(ratio, "Ignoring risk ratio outside (0, 1]");
            }
        }

        score.clamp(MIN_SCORE, MAX_SCORE)
    }
}

pub fn band_for_score(score: f64) -> RiskBand {
    if score >= LOW_BAND_MIN_SCORE {
        RiskBand::Low
    } else if score >= MEDIUM_BAND_MIN_SCORE {
        RiskBand::Medium
    } else {
        RiskBand::High
    }
}

/// Representative score reported for a band chosen without scoring.
pub fn nominal_score(band: RiskBand) -> f64 {
    match band {
        RiskBand::Low => 0.9,
        RiskBand::Medium => 0.7,
        RiskBand::High => 0.5,
    }
}

fn simple_assessment(band: RiskBand) -> RiskAssessment {
    RiskAssessment {
        band,
        score: nominal_score(band),
        mode: ScoringMode::Simple,
    }
}
