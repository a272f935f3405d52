#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use financing_service::clock::{Clock, FixedClock};
use financing_service::config::FinancingConfig;
use financing_service::services::extractor::{
    Document, ExtractedInvoice, ExtractionError, Extractor,
};
use financing_service::services::lifecycle::{LifecycleConfig, LifecycleService};
use financing_service::services::store::{KeyValueStore, MemoryStore, StoreError, StoreResult};
use financing_service::startup::Application;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const OWNER: &str = "seller-1";
pub const OTHER_OWNER: &str = "seller-2";
pub const OWNER_HEADER: &str = "X-Owner-ID";

/// 2026-03-02T10:00:00Z. Mid-morning, so "+N days" due dates are N-1 days
/// and 14 hours away and round up to N.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()
}

pub fn due_in(days: i64) -> NaiveDate {
    test_now().date_naive() + Duration::days(days)
}

pub fn pdf(name: &str) -> Document {
    Document {
        filename: name.to_string(),
        content_type: "application/pdf".to_string(),
        bytes: format!("%PDF-1.7 {}", name).into_bytes(),
    }
}

/// Returns a fixed draft, or a backend failure when none is set.
pub struct ScriptedExtractor {
    draft: Option<ExtractedInvoice>,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn returning(draft: ExtractedInvoice) -> Self {
        Self {
            draft: Some(draft),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            draft: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn extract(&self, _document: &Document) -> Result<ExtractedInvoice, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.draft
            .clone()
            .ok_or_else(|| ExtractionError::Backend("scripted outage".to_string()))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub fn draft(amount: i64, due_days: i64, confidence: f64) -> ExtractedInvoice {
    ExtractedInvoice {
        buyer: Some("Northwind Traders".to_string()),
        amount: Some(amount),
        due_date: Some(due_in(due_days)),
        invoice_number: Some("INV-1001".to_string()),
        confidence,
    }
}

/// In-memory store that can be switched off, or told to fail one write.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    down: Arc<AtomicBool>,
    failing_writes: Arc<Mutex<Vec<String>>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.down.store(false, Ordering::SeqCst);
    }

    /// Fail the next write to a key starting with `prefix`.
    pub fn fail_next_write(&self, prefix: &str) {
        self.failing_writes.lock().unwrap().push(prefix.to_string());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.inner.remove(key)
    }

    fn check(&self, key: &str) -> StoreResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(anyhow::anyhow!(
                "connection refused at {}",
                key
            )));
        }
        Ok(())
    }

    fn check_write(&self, key: &str) -> StoreResult<()> {
        self.check(key)?;
        let mut failing = self.failing_writes.lock().unwrap();
        if let Some(pos) = failing.iter().position(|prefix| key.starts_with(prefix.as_str())) {
            failing.remove(pos);
            return Err(StoreError::Unavailable(anyhow::anyhow!(
                "write to {} timed out",
                key
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.check_write(key)?;
        self.inner.set(key, value).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check(key)?;
        self.inner.get(key).await
    }

    async fn get_by_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.check(prefix)?;
        self.inner.get_by_prefix(prefix).await
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> StoreResult<bool> {
        self.check_write(key)?;
        self.inner.set_if_absent(key, value).await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.check("ping")
    }
}

/// Lifecycle service over a fresh in-memory store and a pinned clock.
pub struct TestLifecycle {
    pub service: LifecycleService,
    pub store: FlakyStore,
    pub clock: Arc<FixedClock>,
}

impl TestLifecycle {
    pub fn new() -> Self {
        Self::with_extractor(Arc::new(ScriptedExtractor::returning(draft(12_000, 30, 0.95))))
    }

    pub fn with_extractor(extractor: Arc<dyn Extractor>) -> Self {
        let store = FlakyStore::new();
        let clock = Arc::new(FixedClock::new(test_now()));
        let service = LifecycleService::new(
            Arc::new(store.clone()) as Arc<dyn KeyValueStore>,
            extractor,
            clock.clone() as Arc<dyn Clock>,
            LifecycleConfig::default(),
        );
        Self {
            service,
            store,
            clock,
        }
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub store: FlakyStore,
    pub clock: Arc<FixedClock>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(Arc::new(ScriptedExtractor::returning(draft(12_000, 30, 0.95)))).await
    }

    pub async fn spawn_with(extractor: Arc<dyn Extractor>) -> Self {
        let store = FlakyStore::new();
        let clock = Arc::new(FixedClock::new(test_now()));

        let app = Application::build_with(
            FinancingConfig::local(),
            Arc::new(store.clone()),
            extractor,
            clock.clone(),
        )
        .await
        .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            store,
            clock,
            client,
        }
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.address, path))
            .header(OWNER_HEADER, OWNER)
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.address, path))
            .header(OWNER_HEADER, OWNER)
    }

    /// Create a manual invoice and return its JSON.
    pub async fn create_invoice(&self, amount: i64, due_days: i64) -> serde_json::Value {
        let response = self
            .post("/invoices")
            .json(&serde_json::json!({
                "filename": "invoice.pdf",
                "amount": amount,
                "buyer": "Northwind Traders",
                "due_date": due_in(due_days),
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.expect("Failed to parse JSON")
    }
}
