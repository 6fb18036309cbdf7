use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage identifier of a candidate (profile or predefined subject)
pub type CandidateId = i64;

/// Storage identifier of a cohort row
pub type CohortId = i64;

/// Persisted sentinel for "no winner" (the vote was skipped)
pub const SKIPPED_WINNER_ID: CandidateId = -1;

/// Persisted sentinel for an anonymous voter
pub const ANONYMOUS_VOTER: &str = "-1";

/// Gender partition of a cohort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Single-letter code used by cohort rows and cohort keys
    pub fn code(self) -> &'static str {
        match self {
            Gender::Male => "m",
            Gender::Female => "f",
        }
    }

    /// Map a profile's gender ("male" / "female") to a cohort gender.
    /// Anything else has no cohort.
    pub fn from_profile(gender: &str) -> Option<Self> {
        match gender {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            _ => None,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidGender(pub String);

impl fmt::Display for InvalidGender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid gender code '{}'", self.0)
    }
}

impl std::error::Error for InvalidGender {}

impl FromStr for Gender {
    type Err = InvalidGender;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "m" => Ok(Gender::Male),
            "f" => Ok(Gender::Female),
            other => Err(InvalidGender(other.to_string())),
        }
    }
}

/// A cohort row as persisted in storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortRow {
    pub id: CohortId,
    pub category: String,
    #[serde(rename = "countryDisplayName")]
    pub country: String,
    pub gender: String,
    pub active: bool,
    pub predefined: bool,
}

/// A candidate as fetched from a cohort
///
/// Predefined cohorts carry the presentation fields (`picture`,
/// `known_for`, ...); open cohorts carry `external_id` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub id: CandidateId,
    pub name: String,
    #[serde(rename = "externalId", default)]
    pub external_id: Option<String>,
    pub rating: i32,
    #[serde(rename = "winCount")]
    pub wins: i32,
    #[serde(rename = "lossCount")]
    pub losses: i32,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(rename = "pictureAuthor", default)]
    pub picture_author: Option<String>,
    #[serde(rename = "pictureLicense", default)]
    pub picture_license: Option<String>,
    #[serde(rename = "knownFor", default)]
    pub known_for: Option<String>,
    #[serde(rename = "descUrl", default)]
    pub desc_url: Option<String>,
}

/// Kind of a queued membership change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Add,
    Remove,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::Add => "add",
            MutationKind::Remove => "remove",
        }
    }
}

impl FromStr for MutationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(MutationKind::Add),
            "remove" => Ok(MutationKind::Remove),
            other => Err(format!("unknown mutation kind '{}'", other)),
        }
    }
}

/// A pending add/remove of a candidate, drained by reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMutation {
    pub id: i64,
    pub candidate_id: CandidateId,
    pub kind: MutationKind,
    /// Target cohorts for `Add`; empty for `Remove` (removal leaves every cohort)
    #[serde(default)]
    pub cohort_ids: Vec<CohortId>,
}

/// Rating and win/loss adjustment for one participant of a resolved match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingChange {
    pub candidate_id: CandidateId,
    pub delta: i32,
    pub won: bool,
}

/// One vote, persisted for statistics regardless of outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub cohort_id: CohortId,
    pub first_id: CandidateId,
    pub second_id: CandidateId,
    pub winner_id: Option<CandidateId>,
    pub voter: Option<String>,
}

impl VoteRecord {
    /// Winner id with the skip sentinel substituted
    pub fn winner_or_sentinel(&self) -> CandidateId {
        self.winner_id.unwrap_or(SKIPPED_WINNER_ID)
    }

    /// Voter id with the anonymous sentinel substituted
    pub fn voter_or_sentinel(&self) -> &str {
        self.voter.as_deref().unwrap_or(ANONYMOUS_VOTER)
    }
}

/// Public description of a registered cohort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortSummary {
    pub id: CohortId,
    pub category: String,
    pub country: String,
    pub gender: Gender,
    #[serde(rename = "isActive")]
    pub active: bool,
    pub predefined: bool,
    #[serde(rename = "candidateCount")]
    pub candidate_count: u64,
}
