//! FxRates Engine
//!
//! Ingests periodic exchange-rate snapshots and answers queries over them.
//!
//! # Features
//!
//! - Lazy currency identity allocation, safe under concurrent resolution
//! - Keyed snapshot upsert with point, range and latest lookups
//! - Best-effort batch ingestion with up-front payload validation
//! - Cross-rate conversion and rebasing on exact decimals
//!
//! # Example
//!
//! ```rust,ignore
//! use fxrates_engine::{EngineConfig, RatesEngine};
//! use fxrates_common::IngestRequest;
//! use fxrates_store::MemoryStore;
//!
//! let engine = RatesEngine::new(Arc::new(MemoryStore::new()), EngineConfig::default());
//!
//! engine.ingest(IngestRequest::new(1_700_000_000, "USD").with_rate("EUR", dec!(0.92))).await?;
//! let conversion = engine.convert("EUR", "USD", dec!(100)).await?;
//! ```

pub mod conversion;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod metrics;
pub mod rate_store;
pub mod registry;
pub mod source;

pub use conversion::{cross_convert, Conversion, ConversionEngine};
pub use engine::{EngineConfig, RatesEngine, RatesSheet};
pub use error::{ErrorKind, FxError, FxResult};
pub use ingestion::{IngestReport, IngestionPipeline};
pub use metrics::{EngineMetrics, MetricsSnapshot, SharedMetrics};
pub use rate_store::RateStore;
pub use registry::CurrencyRegistry;
pub use source::RatesSource;

#[cfg(any(test, feature = "test-utils"))]
pub use source::StaticSource;
