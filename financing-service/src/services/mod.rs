pub mod extractor;
pub mod lifecycle;
pub mod metrics;
pub mod offer;
pub mod repository;
pub mod risk;
pub mod store;

pub use extractor::{Document, ExtractedInvoice, ExtractionError, Extractor};
pub use lifecycle::{LifecycleConfig, LifecycleService};
pub use metrics::{get_metrics, init_metrics};
pub use offer::OfferCalculator;
pub use repository::Repository;
pub use risk::{RiskInput, RiskScoringEngine};
pub use store::{KeyValueStore, MemoryStore, RedisStore, RetryPolicy, RetryingStore, StoreError};
