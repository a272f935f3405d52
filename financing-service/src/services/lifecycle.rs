//! Invoice → advance → settlement state machine.
//!
//! The only component that writes across entity kinds. Each mutating
//! transition takes a create-only claim key before writing, so concurrent
//! or retried calls converge on a single downstream record:
//!
//! - acceptance claims `claim:advance:<invoice_id>` with the advance id,
//! - settlement claims `claim:settlement:<advance_id>` with the settlement id.
//!
//! Downstream records are written create-only before the upstream status
//! flips. A retry after a partial failure adopts the record already written
//! and only finishes the upstream update.

use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::{ceil_days, Clock};
use crate::error::FinancingError;
use crate::models::{
    Advance, AdvanceDisplayStatus, AdvanceStatus, CreateInvoice, Invoice, InvoiceSource,
    InvoiceStatus, Offer, OfferTerms, PortfolioSummary, RiskSignals, Settlement,
};
use crate::services::extractor::{Document, ExtractedInvoice, ExtractionError, Extractor};
use crate::services::metrics;
use crate::services::offer::{percent_of, validate_terms, OfferCalculator};
use crate::services::repository::Repository;
use crate::services::risk::{RiskInput, RiskScoringEngine};
use crate::services::store::KeyValueStore;

/// Default floor below which an extracted draft is not trusted.
pub const DEFAULT_MIN_EXTRACTION_CONFIDENCE: f64 = 0.6;

/// Largest accepted invoice amount, in minor units.
pub const MAX_INVOICE_AMOUNT: i64 = 1_000_000_000_000_000;

#[derive(Debug, Clone, Copy)]
pub struct LifecycleConfig {
    pub min_extraction_confidence: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            min_extraction_confidence: DEFAULT_MIN_EXTRACTION_CONFIDENCE,
        }
    }
}

fn claim_key(kind: &str, upstream_id: &str) -> String {
    format!("claim:{}:{}", kind, upstream_id)
}

#[derive(Clone)]
pub struct LifecycleService {
    store: Arc<dyn KeyValueStore>,
    invoices: Repository<Invoice>,
    advances: Repository<Advance>,
    settlements: Repository<Settlement>,
    extractor: Arc<dyn Extractor>,
    clock: Arc<dyn Clock>,
    risk: RiskScoringEngine,
    offers: OfferCalculator,
    config: LifecycleConfig,
}

impl LifecycleService {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        extractor: Arc<dyn Extractor>,
        clock: Arc<dyn Clock>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            invoices: Repository::new(store.clone()),
            advances: Repository::new(store.clone()),
            settlements: Repository::new(store.clone()),
            store,
            extractor,
            clock,
            risk: RiskScoringEngine::new(),
            offers: OfferCalculator::new(),
            config,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn health_check(&self) -> Result<(), FinancingError> {
        Ok(self.store.health_check().await?)
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    /// Run the extractor and ingest its draft.
    ///
    /// Extractor errors, drafts below the confidence floor and drafts that
    /// fail invoice validation all become `ExtractionFailed`, carrying the
    /// draft (when there is one) for a manual-entry fallback.
    #[tracing::instrument(skip(self, document, signals), fields(filename = %document.filename, extractor = self.extractor.name()))]
    pub async fn create_invoice_from_extraction(
        &self,
        owner_id: &str,
        document: Document,
        signals: RiskSignals,
    ) -> Result<Invoice, FinancingError> {
        require_owner(owner_id)?;
        if document.filename.trim().is_empty() {
            return Err(FinancingError::validation("filename is required"));
        }

        let draft = match self.extractor.extract(&document).await {
            Ok(draft) => draft,
            Err(source) => return Err(extraction_failed(source, None)),
        };

        let minimum = self.config.min_extraction_confidence;
        if draft.confidence < minimum {
            let source = ExtractionError::LowConfidence {
                confidence: draft.confidence,
                minimum,
            };
            return Err(extraction_failed(source, Some(draft)));
        }

        let missing = draft.missing_fields();
        if !missing.is_empty() {
            return Err(extraction_failed(
                ExtractionError::Incomplete(missing),
                Some(draft),
            ));
        }

        let input = CreateInvoice {
            filename: Some(document.filename.clone()),
            invoice_number: draft.invoice_number.clone(),
            amount: draft.amount,
            buyer: draft.buyer.clone(),
            due_date: draft.due_date,
            risk_band: None,
            signals,
        };

        match self
            .ingest(owner_id, input, InvoiceSource::Extraction, Some(draft.confidence))
            .await
        {
            Err(FinancingError::Validation(msg)) => Err(extraction_failed(
                ExtractionError::InvalidDraft(msg),
                Some(draft),
            )),
            other => other,
        }
    }

    /// Ingest a manually entered invoice.
    #[tracing::instrument(skip(self, input))]
    pub async fn create_invoice_manual(
        &self,
        owner_id: &str,
        input: CreateInvoice,
    ) -> Result<Invoice, FinancingError> {
        require_owner(owner_id)?;
        self.ingest(owner_id, input, InvoiceSource::Manual, None)
            .await
    }

    async fn ingest(
        &self,
        owner_id: &str,
        input: CreateInvoice,
        source: InvoiceSource,
        extraction_confidence: Option<f64>,
    ) -> Result<Invoice, FinancingError> {
        let now = self.now();

        let filename = required_text(input.filename, "filename")?;
        let buyer = required_text(input.buyer, "buyer")?;
        let amount = input
            .amount
            .ok_or_else(|| FinancingError::validation("amount is required"))?;
        if amount <= 0 {
            return Err(FinancingError::validation("amount must be positive"));
        }
        if amount > MAX_INVOICE_AMOUNT {
            return Err(FinancingError::validation(format!(
                "amount must not exceed {}",
                MAX_INVOICE_AMOUNT
            )));
        }
        let due_date = input
            .due_date
            .ok_or_else(|| FinancingError::validation("due_date is required"))?;
        if due_date < now.date_naive() {
            return Err(FinancingError::validation(format!(
                "due_date {} is before the creation date {}",
                due_date,
                now.date_naive()
            )));
        }

        let (risk_band, risk_score) = match input.risk_band {
            Some(band) => (band, None),
            None => {
                let assessment = self.risk.assess(
                    &RiskInput {
                        amount: Some(amount),
                        due_date: Some(due_date),
                        signals: input.signals,
                        extraction_confidence,
                    },
                    now,
                );
                (assessment.band, Some(assessment.score))
            }
        };

        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            filename,
            invoice_number: input.invoice_number.filter(|n| !n.trim().is_empty()),
            amount,
            buyer,
            due_date,
            status: InvoiceStatus::Uploaded,
            risk_band,
            risk_score,
            extraction_confidence,
            source: Some(source),
            advance_percent: None,
            fee_percent: None,
            advance_amount: None,
            created_at: now,
        };

        self.invoices.create(&invoice).await?;

        tracing::info!(
            invoice_id = %invoice.id,
            owner_id,
            amount,
            risk_band = %risk_band,
            source = source.as_str(),
            "Invoice ingested"
        );
        metrics::record_ingested(source.as_str(), risk_band.as_str());

        Ok(invoice)
    }

    // ------------------------------------------------------------------
    // Invoices and offers
    // ------------------------------------------------------------------

    pub async fn get_invoice(&self, owner_id: &str, invoice_id: &str) -> Result<Invoice, FinancingError> {
        self.invoices.require_owned(owner_id, invoice_id).await
    }

    /// Owner's invoices, newest first.
    pub async fn list_invoices(&self, owner_id: &str) -> Result<Vec<Invoice>, FinancingError> {
        let mut invoices = self.invoices.list_by_owner(owner_id).await?;
        invoices.sort_by(|a, b| (Reverse(a.created_at), &a.id).cmp(&(Reverse(b.created_at), &b.id)));
        Ok(invoices)
    }

    /// Terms the invoice qualifies for. Read-only: this is the "offered"
    /// state, which is never persisted.
    pub async fn preview_offer(&self, owner_id: &str, invoice_id: &str) -> Result<Offer, FinancingError> {
        let invoice = self.invoices.require_owned(owner_id, invoice_id).await?;
        Ok(self.offers.calculate(invoice.amount, invoice.risk_band))
    }

    /// Accept an offer: record the terms on the invoice and open one advance.
    ///
    /// Rejects invoices that are no longer `uploaded` with `AlreadyAdvanced`.
    #[tracing::instrument(skip(self, terms))]
    pub async fn accept_offer(
        &self,
        owner_id: &str,
        invoice_id: &str,
        terms: OfferTerms,
    ) -> Result<Invoice, FinancingError> {
        let invoice = self.invoices.require_owned(owner_id, invoice_id).await?;
        if invoice.status != InvoiceStatus::Uploaded {
            tracing::warn!(status = invoice.status.as_str(), "Offer already accepted");
            return Err(FinancingError::AlreadyAdvanced(invoice.id));
        }
        validate_terms(invoice.amount, &terms)?;

        let advance_id = self
            .claim(&claim_key("advance", &invoice.id), Uuid::new_v4().to_string())
            .await?;

        let (advance, created) = self
            .advances
            .insert_or_get(Advance {
                id: advance_id,
                invoice_id: invoice.id.clone(),
                owner_id: invoice.owner_id.clone(),
                filename: invoice.filename.clone(),
                buyer: invoice.buyer.clone(),
                invoice_amount: invoice.amount,
                advance_amount: terms.advance_amount,
                advance_percent: Some(terms.advance_percent),
                fee_percent: terms.fee_percent,
                due_date: invoice.due_date,
                status: AdvanceStatus::Active,
                risk_band: invoice.risk_band,
                created_at: self.now(),
                paid_at: None,
            })
            .await?;
        if !created {
            tracing::info!(
                advance_id = %advance.id,
                status = advance.status.as_str(),
                "Advance already written, finishing acceptance"
            );
        }

        let updated = self
            .invoices
            .update(&invoice.id, |inv| {
                inv.status = InvoiceStatus::Advanced;
                inv.advance_percent = advance.advance_percent.or(Some(terms.advance_percent));
                inv.fee_percent = Some(advance.fee_percent);
                inv.advance_amount = Some(advance.advance_amount);
            })
            .await?;

        tracing::info!(
            invoice_id = %updated.id,
            advance_id = %advance.id,
            advance_amount = advance.advance_amount,
            fee_percent = %advance.fee_percent,
            "Offer accepted"
        );
        metrics::record_offer_accepted(advance.risk_band.as_str(), advance.advance_amount);

        Ok(updated)
    }

    // ------------------------------------------------------------------
    // Advances and settlements
    // ------------------------------------------------------------------

    /// Owner's advances, newest first.
    pub async fn list_advances(&self, owner_id: &str) -> Result<Vec<Advance>, FinancingError> {
        let mut advances = self.advances.list_by_owner(owner_id).await?;
        advances.sort_by(|a, b| (Reverse(a.created_at), &a.id).cmp(&(Reverse(b.created_at), &b.id)));
        Ok(advances)
    }

    pub async fn get_advance(&self, owner_id: &str, advance_id: &str) -> Result<Advance, FinancingError> {
        self.advances.require_owned(owner_id, advance_id).await
    }

    /// Settle an advance once the buyer has paid.
    ///
    /// Amounts come from the advance itself, not from the invoice. A second
    /// call on a paid advance is rejected with `AlreadySettled`.
    #[tracing::instrument(skip(self))]
    pub async fn mark_advance_paid(
        &self,
        owner_id: &str,
        advance_id: &str,
    ) -> Result<Settlement, FinancingError> {
        let advance = self.advances.require_owned(owner_id, advance_id).await?;
        if advance.status == AdvanceStatus::Paid {
            tracing::warn!("Advance already settled");
            return Err(FinancingError::AlreadySettled(advance.id));
        }

        let now = self.now();
        let fee_amount = percent_of(advance.invoice_amount, advance.fee_percent);
        let remaining_amount = advance.invoice_amount - advance.advance_amount - fee_amount;

        let settlement_id = self
            .claim(&claim_key("settlement", &advance.id), Uuid::new_v4().to_string())
            .await?;

        let (settlement, created) = self
            .settlements
            .insert_or_get(Settlement {
                id: settlement_id,
                advance_id: Some(advance.id.clone()),
                invoice_id: advance.invoice_id.clone(),
                owner_id: advance.owner_id.clone(),
                filename: advance.filename.clone(),
                buyer: advance.buyer.clone(),
                invoice_amount: advance.invoice_amount,
                advance_amount: advance.advance_amount,
                fee_amount,
                fee_percent: advance.fee_percent,
                remaining_amount,
                settlement_amount: remaining_amount,
                paid_date: now,
                created_at: advance.created_at,
                risk_band: advance.risk_band,
                days_to_pay: ceil_days(now - advance.created_at),
            })
            .await?;
        if !created {
            tracing::info!(
                settlement_id = %settlement.id,
                "Settlement already written, finishing"
            );
        }

        self.advances
            .update(&advance.id, |adv| {
                adv.status = AdvanceStatus::Paid;
                adv.paid_at = Some(settlement.paid_date);
            })
            .await?;

        tracing::info!(
            advance_id = %advance.id,
            settlement_id = %settlement.id,
            fee_amount = settlement.fee_amount,
            remaining_amount = settlement.remaining_amount,
            days_to_pay = settlement.days_to_pay,
            "Advance settled"
        );
        metrics::record_settlement(settlement.risk_band.as_str());

        Ok(settlement)
    }

    /// Owner's settlements, most recently paid first.
    pub async fn list_settlements(&self, owner_id: &str) -> Result<Vec<Settlement>, FinancingError> {
        let mut settlements = self.settlements.list_by_owner(owner_id).await?;
        settlements
            .sort_by(|a, b| (Reverse(a.paid_date), &a.id).cmp(&(Reverse(b.paid_date), &b.id)));
        Ok(settlements)
    }

    pub async fn portfolio_summary(&self, owner_id: &str) -> Result<PortfolioSummary, FinancingError> {
        let now = self.now();
        let invoices = self.invoices.list_by_owner(owner_id).await?;
        let advances = self.advances.list_by_owner(owner_id).await?;
        let settlements = self.settlements.list_by_owner(owner_id).await?;

        let mut summary = PortfolioSummary {
            invoice_count: invoices.len(),
            awaiting_acceptance: invoices
                .iter()
                .filter(|i| i.status == InvoiceStatus::Uploaded)
                .count(),
            settled_count: settlements.len(),
            ..Default::default()
        };

        for advance in &advances {
            summary.total_advanced =
                summary.total_advanced.saturating_add(advance.advance_amount);
            match advance.display_status(now) {
                AdvanceDisplayStatus::Paid => {}
                AdvanceDisplayStatus::Overdue => {
                    summary.active_advances += 1;
                    summary.overdue_advances += 1;
                    summary.outstanding_amount =
                        summary.outstanding_amount.saturating_add(advance.advance_amount);
                }
                AdvanceDisplayStatus::Active | AdvanceDisplayStatus::DueSoon => {
                    summary.active_advances += 1;
                    summary.outstanding_amount =
                        summary.outstanding_amount.saturating_add(advance.advance_amount);
                }
            }
        }

        for settlement in &settlements {
            summary.total_fees = summary.total_fees.saturating_add(settlement.fee_amount);
            summary.total_remitted =
                summary.total_remitted.saturating_add(settlement.settlement_amount);
        }
        if !settlements.is_empty() {
            let days = settlements
                .iter()
                .fold(0i64, |acc, s| acc.saturating_add(s.days_to_pay));
            summary.average_days_to_pay = Some(days as f64 / settlements.len() as f64);
        }

        Ok(summary)
    }

    /// Take `key` for `candidate`, or adopt the id of whoever holds it.
    async fn claim(&self, key: &str, candidate: String) -> Result<String, FinancingError> {
        if self.store.set_if_absent(key, &candidate).await? {
            return Ok(candidate);
        }
        match self.store.get(key).await? {
            Some(holder) => {
                tracing::info!(claim = key, id = %holder, "Resuming claimed transition");
                Ok(holder)
            }
            None => Err(FinancingError::Internal(anyhow::anyhow!(
                "claim {} reported taken but has no value",
                key
            ))),
        }
    }
}

fn require_owner(owner_id: &str) -> Result<(), FinancingError> {
    if owner_id.trim().is_empty() {
        return Err(FinancingError::validation("owner id is required"));
    }
    Ok(())
}

fn required_text(value: Option<String>, field: &str) -> Result<String, FinancingError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| FinancingError::validation(format!("{} is required", field)))
}

fn extraction_failed(source: ExtractionError, draft: Option<ExtractedInvoice>) -> FinancingError {
    tracing::warn!(reason = source.reason(), error = %source, "Extraction failed, manual entry required");
    metrics::record_extraction_failure(source.reason());
    FinancingError::ExtractionFailed {
        source,
        draft: draft.map(Box::new),
    }
}
