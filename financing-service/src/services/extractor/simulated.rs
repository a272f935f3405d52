use async_trait::async_trait;
use chrono::Duration;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::{Document, ExtractedInvoice, ExtractionError, Extractor};
use crate::clock::Clock;

const BUYERS: [&str; 8] = [
    "Northwind Traders",
    "Contoso Ltd",
    "Globex Corporation",
    "Initech",
    "Umbrella Supplies",
    "Stark Industrial",
    "Wayne Logistics",
    "Acme Wholesale",
];

/// Deterministic stand-in for an AI extraction backend.
///
/// The draft is derived from a SHA-256 digest of the filename and bytes, so
/// the same document always yields the same buyer, amount and due date.
pub struct SimulatedExtractor {
    clock: Arc<dyn Clock>,
}

impl SimulatedExtractor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl Extractor for SimulatedExtractor {
    async fn extract(&self, document: &Document) -> Result<ExtractedInvoice, ExtractionError> {
        if document.bytes.is_empty() {
            return Err(ExtractionError::InvalidDocument(
                "document is empty".to_string(),
            ));
        }

        let mut hasher = Sha256::new();
        hasher.update(document.filename.as_bytes());
        hasher.update(&document.bytes);
        let digest = hasher.finalize();

        let word = |i: usize| u16::from_be_bytes([digest[i], digest[i + 1]]) as i64;

        let buyer = BUYERS[digest[0] as usize % BUYERS.len()];
        // 5 000 .. 60 000 in steps of 100.
        let amount = 5_000 + (word(2) % 551) * 100;
        let due_in_days = 15 + word(4) % 76;
        let confidence = 0.75 + (word(6) % 25) as f64 / 100.0;
        let invoice_number = format!(
            "INV-{:02X}{:02X}{:02X}{:02X}",
            digest[8], digest[9], digest[10], digest[11]
        );

        Ok(ExtractedInvoice {
            buyer: Some(buyer.to_string()),
            amount: Some(amount),
            due_date: Some(self.clock.now().date_naive() + Duration::days(due_in_days)),
            invoice_number: Some(invoice_number),
            confidence,
        })
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}
