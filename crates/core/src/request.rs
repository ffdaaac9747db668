//! The analysis request value object.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{AccountId, OwnerKey, ProfileId};

/// Upper bound on the free-form description, to keep provider instructions
/// within a sane size.
const MAX_DESCRIPTION_LEN: usize = 4000;

/// What a caller asks an analysis to do.
///
/// A value object: it has no identity beyond the job that carries it, and is
/// echoed back verbatim in status responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub account_id: AccountId,
    pub profile_id: ProfileId,
    /// Free-form descriptive parameters (who/what to analyze).
    pub description: String,
    /// Extended ("deep") mode: larger response budget, longer timeout tier.
    #[serde(default)]
    pub extended: bool,
    /// Re-query the provider even when a stored record already exists.
    #[serde(default)]
    pub force_regenerate: bool,
}

impl AnalysisRequest {
    pub fn new(
        account_id: AccountId,
        profile_id: ProfileId,
        description: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            profile_id,
            description: description.into(),
            extended: false,
            force_regenerate: false,
        }
    }

    pub fn extended(mut self) -> Self {
        self.extended = true;
        self
    }

    pub fn force_regenerate(mut self) -> Self {
        self.force_regenerate = true;
        self
    }

    pub fn owner_key(&self) -> OwnerKey {
        OwnerKey::new(self.account_id, self.profile_id)
    }

    /// Validate the request at the submission boundary.
    ///
    /// Rejections here are synchronous; no job is ever created for an
    /// invalid request.
    pub fn validate(&self) -> DomainResult<()> {
        if self.description.trim().is_empty() {
            return Err(DomainError::validation("description must not be empty"));
        }
        if self.description.len() > MAX_DESCRIPTION_LEN {
            return Err(DomainError::validation(format!(
                "description exceeds {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        Ok(())
    }
}
