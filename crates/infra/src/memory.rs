//! In-memory record store for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use dossier_analysis::{RecordKind, RecordStore, StoreError, StoredRecord};
use dossier_core::OwnerKey;

/// Map-backed [`RecordStore`].
///
/// Singleton kinds hold at most one record per owner key; collection kinds
/// hold the latest batch. Both writes are replacements, so the idempotence
/// contract holds trivially.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<(OwnerKey, RecordKind), Vec<StoredRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of records stored for an owner and kind.
    pub fn count(&self, owner: OwnerKey, kind: RecordKind) -> usize {
        self.records
            .read()
            .unwrap()
            .get(&(owner, kind))
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(
        &self,
        owner: OwnerKey,
        kind: RecordKind,
    ) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .unwrap()
            .get(&(owner, kind))
            .and_then(|records| records.first().cloned()))
    }

    async fn upsert(&self, record: StoredRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .unwrap()
            .insert((record.owner, record.kind), vec![record]);
        Ok(())
    }

    async fn collection(
        &self,
        owner: OwnerKey,
        kind: RecordKind,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .unwrap()
            .get(&(owner, kind))
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_collection(
        &self,
        owner: OwnerKey,
        kind: RecordKind,
        records: Vec<StoredRecord>,
    ) -> Result<(), StoreError> {
        self.records
            .write()
            .unwrap()
            .insert((owner, kind), records);
        Ok(())
    }
}
