//! Owner-indexed repositories over the key-value store.
//!
//! Each entity kind `E` keeps its primary record at `E:<id>` and one index
//! pointer per record at `owner:<owner>:E:<id>` whose value is `<id>`.
//! Ids and owners never change, so index entries are written once.

use anyhow::Context;
use futures::future::join_all;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::FinancingError;
use crate::models::{Advance, Invoice, Settlement};
use crate::services::store::KeyValueStore;

/// A record that can live in a [`Repository`].
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    /// Key namespace, e.g. `invoice`.
    const KIND: &'static str;
    /// Human name used in errors, e.g. `Invoice`.
    const LABEL: &'static str;

    fn id(&self) -> &str;
    fn owner_id(&self) -> &str;
}

impl Entity for Invoice {
    const KIND: &'static str = "invoice";
    const LABEL: &'static str = "Invoice";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

impl Entity for Advance {
    const KIND: &'static str = "advance";
    const LABEL: &'static str = "Advance";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

impl Entity for Settlement {
    const KIND: &'static str = "settlement";
    const LABEL: &'static str = "Settlement";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

pub fn primary_key<E: Entity>(id: &str) -> String {
    format!("{}:{}", E::KIND, id)
}

pub fn index_key<E: Entity>(owner_id: &str, id: &str) -> String {
    format!("owner:{}:{}:{}", owner_id, E::KIND, id)
}

fn index_prefix<E: Entity>(owner_id: &str) -> String {
    format!("owner:{}:{}:", owner_id, E::KIND)
}

pub struct Repository<E: Entity> {
    store: Arc<dyn KeyValueStore>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    /// Write the primary record, then the owner index pointer.
    ///
    /// The two writes are independent. Writing the primary first means an
    /// interrupted create leaves an unlisted record rather than a dangling
    /// pointer; `list_by_owner` tolerates dangling pointers either way.
    pub async fn create(&self, record: &E) -> Result<(), FinancingError> {
        self.put(record).await?;
        self.store
            .set(&index_key::<E>(record.owner_id(), record.id()), record.id())
            .await?;
        Ok(())
    }

    /// Create-only variant of [`Self::create`].
    ///
    /// When a record with the same id already exists it is left untouched
    /// and returned instead, and its index pointer is rewritten. Returns the
    /// stored record and whether this call created it.
    pub async fn insert_or_get(&self, record: E) -> Result<(E, bool), FinancingError> {
        let key = primary_key::<E>(record.id());
        let created = self.store.set_if_absent(&key, &encode(&record)?).await?;
        let stored = if created {
            record
        } else {
            let raw = self.store.get(&key).await?.ok_or_else(|| {
                FinancingError::Internal(anyhow::anyhow!(
                    "{} reported present but has no value",
                    key
                ))
            })?;
            decode(&key, &raw)?
        };
        self.store
            .set(&index_key::<E>(stored.owner_id(), stored.id()), stored.id())
            .await?;
        Ok((stored, created))
    }

    pub async fn get(&self, id: &str) -> Result<Option<E>, FinancingError> {
        let key = primary_key::<E>(id);
        match self.store.get(&key).await? {
            Some(raw) => Ok(Some(decode(&key, &raw)?)),
            None => Ok(None),
        }
    }

    /// Lookup scoped to one owner: another owner's record reads as absent.
    pub async fn get_owned(&self, owner_id: &str, id: &str) -> Result<Option<E>, FinancingError> {
        Ok(self.get(id).await?.filter(|r| r.owner_id() == owner_id))
    }

    /// Like [`Self::get_owned`] but absence is a `NotFound` error.
    pub async fn require_owned(&self, owner_id: &str, id: &str) -> Result<E, FinancingError> {
        self.get_owned(owner_id, id)
            .await?
            .ok_or_else(|| FinancingError::not_found(E::LABEL, id))
    }

    /// Read-modify-write of the primary record. Index entries are untouched.
    pub async fn update<F>(&self, id: &str, patch: F) -> Result<E, FinancingError>
    where
        F: FnOnce(&mut E),
    {
        let mut record = self
            .get(id)
            .await?
            .ok_or_else(|| FinancingError::not_found(E::LABEL, id))?;
        patch(&mut record);
        self.put(&record).await?;
        Ok(record)
    }

    /// Every record indexed under `owner_id`, in no particular order.
    ///
    /// Pointers whose primary record is missing or unreadable are skipped
    /// and logged; they never fail the listing.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<E>, FinancingError> {
        let ids = self.store.get_by_prefix(&index_prefix::<E>(owner_id)).await?;

        let lookups = ids.iter().map(|id| {
            let key = primary_key::<E>(id);
            async move {
                let raw = self.store.get(&key).await;
                (id, key, raw)
            }
        });

        let mut records = Vec::with_capacity(ids.len());
        for (id, key, raw) in join_all(lookups).await {
            match raw? {
                Some(raw) => match decode::<E>(&key, &raw) {
                    Ok(record) if record.owner_id() == owner_id => records.push(record),
                    Ok(_) => {
                        tracing::warn!(
                            kind = E::KIND,
                            id = %id,
                            owner_id,
                            "Index entry points at another owner's record, skipping"
                        );
                    }
                    Err(e) => {
                        tracing::error!(kind = E::KIND, id = %id, error = %e, "Skipping unreadable record");
                    }
                },
                None => {
                    tracing::warn!(
                        kind = E::KIND,
                        id = %id,
                        owner_id,
                        "Dangling index entry, primary record missing"
                    );
                }
            }
        }

        Ok(records)
    }

    async fn put(&self, record: &E) -> Result<(), FinancingError> {
        self.store
            .set(&primary_key::<E>(record.id()), &encode(record)?)
            .await?;
        Ok(())
    }
}

fn encode<E: Entity>(record: &E) -> Result<String, FinancingError> {
    serde_json::to_string(record)
        .with_context(|| format!("failed to encode {} {}", E::KIND, record.id()))
        .map_err(FinancingError::Internal)
}

fn decode<E: Entity>(key: &str, raw: &str) -> Result<E, FinancingError> {
    serde_json::from_str(raw)
        .with_context(|| format!("corrupt record at {}", key))
        .map_err(FinancingError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InvoiceStatus, RiskBand};
    use crate::services::store::MemoryStore;
    use chrono::{NaiveDate, Utc};

    fn invoice(id: &str, owner: &str) -> Invoice {
        Invoice {
            id: id.to_string(),
            owner_id: owner.to_string(),
            filename: format!("{}.pdf", id),
            invoice_number: None,
            amount: 10_000,
            buyer: "Acme".to_string(),
            due_date: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            status: InvoiceStatus::Uploaded,
            risk_band: RiskBand::Low,
            risk_score: None,
            extraction_confidence: None,
            source: None,
            advance_percent: None,
            fee_percent: None,
            advance_amount: None,
            created_at: Utc::now(),
        }
    }

    fn repo() -> (MemoryStore, Repository<Invoice>) {
        let store = MemoryStore::new();
        let repo = Repository::new(Arc::new(store.clone()));
        (store, repo)
    }

    #[tokio::test]
    async fn test_create_writes_primary_and_index() {
        let (store, repo) = repo();
        repo.create(&invoice("i1", "alice")).await.unwrap();

        assert!(store.get("invoice:i1").await.unwrap().is_some());
        assert_eq!(
            store.get("owner:alice:invoice:i1").await.unwrap().as_deref(),
            Some("i1")
        );
        assert_eq!(repo.get("i1").await.unwrap().unwrap().owner_id, "alice");
    }

    #[tokio::test]
    async fn test_insert_or_get_keeps_existing_record() {
        let (store, repo) = repo();
        let mut original = invoice("i1", "alice");
        original.status = InvoiceStatus::Advanced;
        let (stored, created) = repo.insert_or_get(original).await.unwrap();
        assert!(created);
        assert_eq!(stored.status, InvoiceStatus::Advanced);

        // Index pointer lost after the primary write.
        store.remove("owner:alice:invoice:i1");

        let (stored, created) = repo.insert_or_get(invoice("i1", "alice")).await.unwrap();
        assert!(!created);
        assert_eq!(stored.status, InvoiceStatus::Advanced);
        assert_eq!(
            repo.get("i1").await.unwrap().unwrap().status,
            InvoiceStatus::Advanced
        );
        assert_eq!(repo.list_by_owner("alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_owned_hides_other_owners() {
        let (_, repo) = repo();
        repo.create(&invoice("i1", "alice")).await.unwrap();

        assert!(repo.get_owned("alice", "i1").await.unwrap().is_some());
        assert!(repo.get_owned("bob", "i1").await.unwrap().is_none());
        assert!(matches!(
            repo.require_owned("bob", "i1").await,
            Err(FinancingError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_rewrites_primary_only() {
        let (store, repo) = repo();
        repo.create(&invoice("i1", "alice")).await.unwrap();

        let updated = repo
            .update("i1", |inv| inv.status = InvoiceStatus::Advanced)
            .await
            .unwrap();
        assert_eq!(updated.status, InvoiceStatus::Advanced);
        assert_eq!(
            repo.get("i1").await.unwrap().unwrap().status,
            InvoiceStatus::Advanced
        );
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (_, repo) = repo();
        let err = repo.update("ghost", |_| {}).await.unwrap_err();
        assert!(matches!(err, FinancingError::NotFound { kind: "Invoice", .. }));
    }

    #[tokio::test]
    async fn test_list_by_owner_is_scoped() {
        let (_, repo) = repo();
        repo.create(&invoice("i1", "alice")).await.unwrap();
        repo.create(&invoice("i2", "alice")).await.unwrap();
        repo.create(&invoice("i3", "bob")).await.unwrap();

        let mut ids: Vec<String> = repo
            .list_by_owner("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["i1", "i2"]);
    }

    #[tokio::test]
    async fn test_list_skips_dangling_index_entries() {
        let (store, repo) = repo();
        repo.create(&invoice("i1", "alice")).await.unwrap();
        repo.create(&invoice("i2", "alice")).await.unwrap();
        store.remove("invoice:i1");

        let listed = repo.list_by_owner("alice").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "i2");
    }

    #[tokio::test]
    async fn test_list_with_only_dangling_entries_is_empty() {
        let (store, repo) = repo();
        repo.create(&invoice("i1", "carol")).await.unwrap();
        repo.create(&invoice("i2", "carol")).await.unwrap();
        store.remove("invoice:i1");
        store.remove("invoice:i2");

        assert!(repo.list_by_owner("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_records() {
        let (store, repo) = repo();
        repo.create(&invoice("i1", "alice")).await.unwrap();
        store.set("invoice:i2", "{not json").await.unwrap();
        store.set("owner:alice:invoice:i2", "i2").await.unwrap();

        let listed = repo.list_by_owner("alice").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(matches!(
            repo.get("i2").await,
            Err(FinancingError::Internal(_))
        ));
    }
}
