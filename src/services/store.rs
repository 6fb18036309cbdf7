use crate::core::Cohort;
use crate::models::{
    CandidateId, CandidateRecord, CohortId, CohortRow, MutationKind, PendingMutation,
    RatingChange, VoteRecord,
};
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by the storage collaborator
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Row store the engine reads candidates from and writes results to.
///
/// The engine decides; implementations only fetch and persist.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// All persisted cohort rows, active or not
    async fn fetch_cohort_rows(&self) -> Result<Vec<CohortRow>, StoreError>;

    /// Candidates at the given 1-based ranks, in the order requested
    async fn fetch_candidates_at_positions(
        &self,
        cohort: &Cohort,
        positions: &[u64],
    ) -> Result<Vec<CandidateRecord>, StoreError>;

    /// Apply every change of one resolved match in a single batch
    async fn apply_rating_changes(
        &self,
        cohort: &Cohort,
        changes: &[RatingChange],
    ) -> Result<(), StoreError>;

    async fn record_vote(&self, vote: &VoteRecord) -> Result<(), StoreError>;

    /// Pending membership mutations, oldest first
    async fn pending_mutations(&self) -> Result<Vec<PendingMutation>, StoreError>;

    /// Consume and apply one pending mutation.
    ///
    /// Returns the cohorts whose membership changed.
    async fn apply_mutation(&self, mutation: &PendingMutation)
        -> Result<Vec<CohortId>, StoreError>;

    /// Queue a mutation unless an identical one is already pending.
    ///
    /// Returns `false` when nothing was queued.
    async fn enqueue_mutation(
        &self,
        candidate_id: CandidateId,
        kind: MutationKind,
        cohort_ids: &[CohortId],
    ) -> Result<bool, StoreError>;

    /// Recompute 1-based ranks by rating, highest first
    async fn update_ranks(&self, cohort: &Cohort) -> Result<(), StoreError>;

    async fn count_candidates(&self, cohort: &Cohort) -> Result<u64, StoreError>;

    /// Top `limit` candidates by rank
    async fn fetch_leaderboard(
        &self,
        cohort: &Cohort,
        limit: u32,
    ) -> Result<Vec<CandidateRecord>, StoreError>;

    async fn fetch_candidate(
        &self,
        cohort: &Cohort,
        candidate_id: CandidateId,
    ) -> Result<Option<CandidateRecord>, StoreError>;

    async fn health_check(&self) -> Result<bool, StoreError>;
}
