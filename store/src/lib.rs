//! FxRates Store
//!
//! The persistence boundary of the engine. Currency identity allocation and
//! snapshot state live behind two narrow traits so the engine can run on a
//! transactional database or on an in-process map with the same semantics:
//!
//! - currency codes are unique; creating an existing code returns the
//!   existing record
//! - snapshots are upserted by `(currency, base currency, timestamp)`
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fxrates_store::{MemoryStore, PgStore, PgStoreConfig};
//!
//! let memory = Arc::new(MemoryStore::new());
//!
//! let pg = PgStore::connect(&PgStoreConfig::new("postgres://localhost/fxrates")).await?;
//! pg.migrate().await?;
//! ```

pub mod repository;
pub mod memory;
pub mod postgres;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use repository::{CurrencyRepository, SnapshotFilter, SnapshotRepository, TimeWindow};
pub use memory::MemoryStore;
pub use postgres::{PgStore, PgStoreConfig};
#[cfg(any(test, feature = "test-utils"))]
pub use testing::FaultyStore;
