//! FxRates Node
//!
//! Runs the rates engine as a service: loads configuration, wires the
//! configured store, and keeps snapshots current by polling an upstream
//! rates endpoint.

pub mod config;
pub mod source;
pub mod sync;

pub use config::{NodeConfig, StoreConfig, SyncConfig};
pub use source::HttpSource;
pub use sync::SyncService;
