//! `dossier-analysis`
//!
//! **Responsibility:** the analysis subsystem boundary.
//!
//! This crate owns everything between a claimed job and its persisted record:
//! - the resilient response parser ([`recovery`]),
//! - the collaborator traits for the enrichment provider and record store,
//! - the per-type processor strategies and their dispatch registry.
//!
//! It stays storage- and transport-agnostic: concrete providers and stores
//! are supplied by callers (infra/api).

pub mod error;
pub mod processors;
pub mod provider;
pub mod recovery;
pub mod store;

pub use error::ProcessorError;
pub use processors::{
    build_registry, AnalysisProcessor, CompetitorsProcessor, IndustryProcessor,
    ProcessorRegistry, ProfileProcessor, ProgressFn,
};
pub use provider::{Citation, EnrichmentProvider, ProviderError, ProviderResponse, ResponseBudget};
pub use recovery::{recover_fields, RecoveredFields};
pub use store::{RecordKind, RecordStore, StoreError, StoredRecord};
