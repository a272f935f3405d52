//! Risk classification shared by scoring, offers and the stored entities.

use serde::{Deserialize, Serialize};

/// Coarse risk classification driving offer terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskBand::Low => "low",
            RiskBand::Medium => "medium",
            RiskBand::High => "high",
        }
    }

    /// Parse a band name. Anything unrecognised is treated as `Medium`.
    pub fn from_string(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => RiskBand::Low,
            "high" => RiskBand::High,
            "medium" => RiskBand::Medium,
            other => {
                tracing::warn!(band = %other, "Unknown risk band, using medium terms");
                RiskBand::Medium
            }
        }
    }
}

impl std::fmt::Display for RiskBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which scoring path produced an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// Thresholds on amount and days to due only.
    Simple,
    /// Deductions from a base score, scaled by auxiliary ratios.
    Scored,
}

/// Auxiliary ratios in `(0, 1]` feeding the scored mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskSignals {
    pub buyer_profile: Option<f64>,
    pub payment_history: Option<f64>,
    pub industry_factor: Option<f64>,
}

impl RiskSignals {
    pub fn is_empty(&self) -> bool {
        self.buyer_profile.is_none()
            && self.payment_history.is_none()
            && self.industry_factor.is_none()
    }
}

/// Outcome of scoring one invoice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub band: RiskBand,
    /// Score in `[0.1, 1.0]`; higher is safer.
    pub score: f64,
    pub mode: ScoringMode,
}
