//! The closed set of analysis types and their static per-type configuration.
//!
//! Every job carries exactly one [`JobType`]; the matching [`JobTypeConfig`]
//! drives progress checkpoints and the timeout tier selected at dispatch time.

use core::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The kind of analysis a job performs.
///
/// This enumeration is closed: adding a type means adding a processor for it
/// and a config entry below.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Company profile record for the owner.
    Profile,
    /// Industry analysis record for the owner.
    Industry,
    /// Competitor landscape (owner-scoped collection).
    Competitors,
}

impl JobType {
    pub const ALL: [JobType; 3] = [JobType::Profile, JobType::Industry, JobType::Competitors];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Profile => "profile",
            JobType::Industry => "industry",
            JobType::Competitors => "competitors",
        }
    }

    /// Static configuration for this type.
    pub fn config(&self) -> &'static JobTypeConfig {
        match self {
            JobType::Profile => &PROFILE_CONFIG,
            JobType::Industry => &INDUSTRY_CONFIG,
            JobType::Competitors => &COMPETITORS_CONFIG,
        }
    }
}

impl core::fmt::Display for JobType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profile" => Ok(JobType::Profile),
            "industry" => Ok(JobType::Industry),
            "competitors" => Ok(JobType::Competitors),
            other => Err(DomainError::validation(format!(
                "unknown analysis type: {other}"
            ))),
        }
    }
}

/// Canonical checkpoint stage names, shared by every type's checkpoint table.
pub const STAGE_STARTED: &str = "started";
pub const STAGE_QUERYING: &str = "querying provider";
pub const STAGE_STRUCTURING: &str = "structuring response";
pub const STAGE_PERSISTING: &str = "persisting record";
pub const STAGE_COMPLETE: &str = "complete";

/// A named processing milestone with its target progress percentage.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub name: &'static str,
    pub percent: u8,
}

/// Static per-type descriptor: display name, duration estimate, the two
/// timeout tiers, and the ordered checkpoint table.
///
/// Loaded once (these are `static`s); never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTypeConfig {
    pub display_name: &'static str,
    pub estimated_duration: Duration,
    /// Timeout for a standard run.
    pub standard_timeout: Duration,
    /// Timeout when extended ("deep") mode was requested.
    pub extended_timeout: Duration,
    /// Ordered checkpoints with strictly increasing percentages, ending at 100.
    pub checkpoints: &'static [Checkpoint],
}

impl JobTypeConfig {
    /// Select the timeout tier for a request.
    pub fn timeout_for(&self, extended: bool) -> Duration {
        if extended {
            self.extended_timeout
        } else {
            self.standard_timeout
        }
    }

    /// Look up a checkpoint by stage name.
    pub fn checkpoint(&self, stage: &str) -> Option<Checkpoint> {
        self.checkpoints.iter().copied().find(|c| c.name == stage)
    }
}

static PROFILE_CONFIG: JobTypeConfig = JobTypeConfig {
    display_name: "Company profile",
    estimated_duration: Duration::from_secs(45),
    standard_timeout: Duration::from_secs(120),
    extended_timeout: Duration::from_secs(300),
    checkpoints: &[
        Checkpoint { name: STAGE_STARTED, percent: 5 },
        Checkpoint { name: STAGE_QUERYING, percent: 20 },
        Checkpoint { name: STAGE_STRUCTURING, percent: 60 },
        Checkpoint { name: STAGE_PERSISTING, percent: 85 },
        Checkpoint { name: STAGE_COMPLETE, percent: 100 },
    ],
};

static INDUSTRY_CONFIG: JobTypeConfig = JobTypeConfig {
    display_name: "Industry analysis",
    estimated_duration: Duration::from_secs(60),
    standard_timeout: Duration::from_secs(180),
    extended_timeout: Duration::from_secs(420),
    checkpoints: &[
        Checkpoint { name: STAGE_STARTED, percent: 5 },
        Checkpoint { name: STAGE_QUERYING, percent: 25 },
        Checkpoint { name: STAGE_STRUCTURING, percent: 65 },
        Checkpoint { name: STAGE_PERSISTING, percent: 90 },
        Checkpoint { name: STAGE_COMPLETE, percent: 100 },
    ],
};

static COMPETITORS_CONFIG: JobTypeConfig = JobTypeConfig {
    display_name: "Competitor landscape",
    estimated_duration: Duration::from_secs(75),
    standard_timeout: Duration::from_secs(180),
    extended_timeout: Duration::from_secs(420),
    checkpoints: &[
        Checkpoint { name: STAGE_STARTED, percent: 5 },
        Checkpoint { name: STAGE_QUERYING, percent: 25 },
        Checkpoint { name: STAGE_STRUCTURING, percent: 60 },
        Checkpoint { name: STAGE_PERSISTING, percent: 85 },
        Checkpoint { name: STAGE_COMPLETE, percent: 100 },
    ],
};
