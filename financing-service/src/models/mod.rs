//! Domain models for financing-service.

mod advance;
mod invoice;
mod offer;
mod portfolio;
mod risk;
mod settlement;

pub use advance::{Advance, AdvanceDisplayStatus, AdvanceStatus, DUE_SOON_DAYS};
pub use invoice::{CreateInvoice, Invoice, InvoiceDisplayStatus, InvoiceSource, InvoiceStatus};
pub use offer::{Offer, OfferTerms};
pub use portfolio::PortfolioSummary;
pub use risk::{RiskAssessment, RiskBand, RiskSignals, ScoringMode};
pub use settlement::Settlement;
