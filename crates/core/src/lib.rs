//! `dossier-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the closed analysis-type enumeration with its static per-type
//! configuration, and the request value object.

pub mod error;
pub mod id;
pub mod job_type;
pub mod request;

pub use error::{DomainError, DomainResult};
pub use id::{AccountId, JobId, OwnerKey, ProfileId};
pub use job_type::{Checkpoint, JobType, JobTypeConfig};
pub use request::AnalysisRequest;
