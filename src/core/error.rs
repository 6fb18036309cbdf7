use crate::models::{CohortId, Gender};
use crate::services::StoreError;
use thiserror::Error;

/// Failures surfaced to the caller of match generation and resolution
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("no cohort registered for '{category}-{gender}'")]
    UnknownCohort { category: String, gender: Gender },

    #[error("cohort '{cohort}' has too few candidates ({count})")]
    TooFewCandidates { cohort: String, count: u64 },

    #[error("database error: {0}")]
    Database(#[from] StoreError),

    #[error("match session is unknown, expired or already resolved")]
    UnresolvableSession,
}

/// Copyable discriminant of [`MatchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchErrorKind {
    UnknownCohort,
    TooFewCandidates,
    Database,
    UnresolvableSession,
}

impl MatchError {
    pub fn kind(&self) -> MatchErrorKind {
        match self {
            MatchError::UnknownCohort { .. } => MatchErrorKind::UnknownCohort,
            MatchError::TooFewCandidates { .. } => MatchErrorKind::TooFewCandidates,
            MatchError::Database(_) => MatchErrorKind::Database,
            MatchError::UnresolvableSession => MatchErrorKind::UnresolvableSession,
        }
    }

    /// Whether the same request may succeed later
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            MatchErrorKind::TooFewCandidates | MatchErrorKind::Database
        )
    }
}

/// Failures that abort one reconciliation run
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to fetch pending mutations: {0}")]
    Fetch(#[source] StoreError),

    #[error("pending mutation {mutation_id} failed: {source}")]
    Mutation {
        mutation_id: i64,
        #[source]
        source: StoreError,
    },

    #[error("failed to update ranks of cohort {cohort}: {source}")]
    Ranks {
        cohort: CohortId,
        #[source]
        source: StoreError,
    },

    #[error("failed to count candidates of cohort {cohort}: {source}")]
    Count {
        cohort: CohortId,
        #[source]
        source: StoreError,
    },
}
