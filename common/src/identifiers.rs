//! Identifier types for persisted FxRates entities.
//!
//! Identities are allocated by the store. A value built with `new()` is only
//! a proposal until the store hands it back from a write.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a currency record.
/// Uses UUID v7 so identities sort roughly by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyId(Uuid);

impl CurrencyId {
    /// Propose a new currency ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CurrencyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CurrencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a persisted rate snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(Uuid);

impl SnapshotId {
    /// Propose a new snapshot ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_id_creation() {
        let id1 = CurrencyId::new();
        let id2 = CurrencyId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_currency_id_displays_uuid() {
        let uuid = Uuid::now_v7();
        assert_eq!(CurrencyId::from_uuid(uuid).to_string(), uuid.to_string());
    }

    #[test]
    fn test_snapshot_id_roundtrips_uuid() {
        let uuid = Uuid::now_v7();
        let id = SnapshotId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), &uuid);
    }
}
