//! The persistence collaborator boundary.
//!
//! Processors never append: singleton kinds are written with an upsert on the
//! owner key and collection kinds with a wholesale replacement, so a retried
//! job converges to the same stored state instead of accumulating duplicates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dossier_core::OwnerKey;

use crate::provider::Citation;

/// What kind of record a processor persists.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Singleton per owner.
    CompanyProfile,
    /// Singleton per owner.
    IndustryAnalysis,
    /// Owner-scoped collection; one record per competitor.
    Competitor,
}

impl RecordKind {
    pub fn is_collection(&self) -> bool {
        matches!(self, RecordKind::Competitor)
    }
}

/// A persistence-ready analysis record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub owner: OwnerKey,
    pub kind: RecordKind,
    /// Recovered fields, with absent optional fields defaulted to null.
    pub fields: serde_json::Value,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    pub fn new(
        owner: OwnerKey,
        kind: RecordKind,
        fields: serde_json::Value,
        citations: Vec<Citation>,
    ) -> Self {
        Self {
            owner,
            kind,
            fields,
            citations,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),
}

/// Async boundary to record persistence.
///
/// Implementations must keep both write operations idempotent under
/// at-least-once retry.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the singleton record of `kind` for an owner, if any.
    async fn get(
        &self,
        owner: OwnerKey,
        kind: RecordKind,
    ) -> Result<Option<StoredRecord>, StoreError>;

    /// Write a singleton record, replacing any previous one for the owner key.
    async fn upsert(&self, record: StoredRecord) -> Result<(), StoreError>;

    /// Fetch every record of a collection `kind` for an owner.
    async fn collection(
        &self,
        owner: OwnerKey,
        kind: RecordKind,
    ) -> Result<Vec<StoredRecord>, StoreError>;

    /// Replace the owner's whole collection of `kind` (delete-then-insert).
    async fn replace_collection(
        &self,
        owner: OwnerKey,
        kind: RecordKind,
        records: Vec<StoredRecord>,
    ) -> Result<(), StoreError>;
}
