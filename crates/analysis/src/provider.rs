//! The enrichment-provider collaborator boundary.
//!
//! The provider is an external service (an AI/search backend) that answers a
//! free-form instruction with text plus optional source citations. It may fail
//! outright (that propagates to the processor) or truncate its text at the
//! response budget, which the recovery parser is built to absorb.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A source reference attached to a provider response.
///
/// Purely additive metadata; no processor requires citations for correctness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub source_domain: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub index: u32,
}

/// What the provider returned for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub text: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl ProviderResponse {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            citations: Vec::new(),
        }
    }
}

/// Response size budget passed to the provider, in tokens.
///
/// The extended tier exists for "deep" mode requests; the standard tier is
/// deliberately small enough that truncation is a normal occurrence.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseBudget(pub u32);

impl ResponseBudget {
    pub const STANDARD: ResponseBudget = ResponseBudget(4_096);
    pub const EXTENDED: ResponseBudget = ResponseBudget(16_384);

    pub fn for_request(extended: bool) -> Self {
        if extended {
            Self::EXTENDED
        } else {
            Self::STANDARD
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The request never produced a usable response (network, 5xx, timeout).
    #[error("provider request failed: {0}")]
    Request(String),

    /// The provider answered with something that is not a provider response.
    #[error("provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Async boundary to the enrichment provider.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    async fn query(
        &self,
        instruction: &str,
        budget: ResponseBudget,
    ) -> Result<ProviderResponse, ProviderError>;
}
