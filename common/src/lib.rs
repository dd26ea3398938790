//! FxRates Common Types
//!
//! This crate contains the types shared across the FxRates workspace:
//! store-allocated identifiers, validated currency codes, rate snapshots,
//! the raw ingestion payload and the persistence-boundary error type.

pub mod identifiers;
pub mod monetary;
pub mod rates;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use rates::*;
pub use error::*;
pub use time::*;
