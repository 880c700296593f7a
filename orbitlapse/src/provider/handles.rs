//! Session-scoped table of provider-local references.
//!
//! Adapters keep whatever they need to fetch pixels later (a catalog item,
//! an asset name) in a `HandleTable` keyed by record id. The table lives
//! inside the adapter, so dropping the adapter on a provider switch drops
//! every reference it issued.

use std::collections::HashMap;

use super::types::{ImageRecord, ImageryProvider, ProviderError};

/// Provider-local references keyed by record id.
#[derive(Debug)]
pub struct HandleTable<T> {
    entries: HashMap<String, T>,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the reference behind a record id, replacing any older one.
    pub fn insert(&mut self, id: impl Into<String>, handle: T) {
        self.entries.insert(id.into(), handle);
    }

    /// Resolves a record to its reference.
    ///
    /// Fails if the record was not issued by `provider`'s current session
    /// or if its reference is unknown.
    pub fn resolve<P>(&self, provider: &P, record: &ImageRecord) -> Result<&T, ProviderError>
    where
        P: ImageryProvider + ?Sized,
    {
        provider.check_issued(record)?;
        self.entries
            .get(&record.id)
            .ok_or_else(|| ProviderError::UnknownRecord(record.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Stretch;
    use crate::provider::{ProviderKind, SyntheticProvider};
    use crate::storage::{DiskStorage, ImageStore};
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn provider(temp: &TempDir) -> SyntheticProvider {
        SyntheticProvider::new(
            Stretch::default(),
            ImageStore::new(
                ProviderKind::Synthetic,
                temp.path().to_path_buf(),
                Arc::new(DiskStorage),
            ),
        )
    }

    fn record(id: &str) -> ImageRecord {
        ImageRecord::new(
            id,
            NaiveDate::from_ymd_opt(2021, 6, 5).unwrap(),
            3.0,
            ProviderKind::Synthetic,
            "synthetic",
        )
    }

    #[test]
    fn test_resolve_issued_record() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp);
        let mut table = HandleTable::new();
        table.insert("scene", 1);
        table.insert("scene", 2);

        let issued = record("scene").issued_by(provider.session());
        assert_eq!(*table.resolve(&provider, &issued).unwrap(), 2);
    }

    #[test]
    fn test_resolve_unknown_id() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp);
        let table: HandleTable<u8> = HandleTable::new();

        let issued = record("missing").issued_by(provider.session());
        assert!(matches!(
            table.resolve(&provider, &issued),
            Err(ProviderError::UnknownRecord(id)) if id == "missing"
        ));
    }

    #[test]
    fn test_resolve_rejects_other_session() {
        let temp = TempDir::new().unwrap();
        let issuer = provider(&temp);
        let current = provider(&temp);
        let mut table = HandleTable::new();
        table.insert("scene", 1);

        let foreign = record("scene").issued_by(issuer.session());
        assert!(matches!(
            table.resolve(&current, &foreign),
            Err(ProviderError::StaleRecord { .. })
        ));
        assert!(matches!(
            table.resolve(&current, &record("scene")),
            Err(ProviderError::StaleRecord { .. })
        ));
    }
}
