use crate::core::error::MatchError;
use crate::core::rating::Outcome;
use crate::core::reconcile::Reconciler;
use crate::core::registry::{Cohort, CohortRegistry, MatchOffer, ResolvedMatch};
use crate::core::session::SessionToken;
use crate::models::{
    CandidateId, CandidateRecord, CohortId, CohortSummary, Gender, MutationKind,
};
use crate::services::{CandidateStore, LeaderboardCache, StoreError};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Entry point the web layer calls into.
///
/// Ties the cohort registry to the storage collaborator and the
/// leaderboard cache. Cloning is cheap; every clone shares the same state.
#[derive(Clone)]
pub struct Matchmaker {
    registry: Arc<CohortRegistry>,
    store: Arc<dyn CandidateStore>,
    leaderboards: LeaderboardCache,
    leaderboard_size: u32,
}

impl Matchmaker {
    pub fn new(
        registry: Arc<CohortRegistry>,
        store: Arc<dyn CandidateStore>,
        leaderboards: LeaderboardCache,
        leaderboard_size: u32,
    ) -> Self {
        Self {
            registry,
            store,
            leaderboards,
            leaderboard_size,
        }
    }

    pub fn registry(&self) -> &Arc<CohortRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn CandidateStore> {
        &self.store
    }

    pub fn leaderboards(&self) -> &LeaderboardCache {
        &self.leaderboards
    }

    /// A reconciler over the same registry, store and cache
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(Arc::clone(&self.registry), Arc::clone(&self.store))
            .with_cache(self.leaderboards.clone())
    }

    fn cohort(&self, category: &str, gender: Gender) -> Result<&Cohort, MatchError> {
        self.registry
            .get(category, gender)
            .ok_or_else(|| MatchError::UnknownCohort {
                category: category.to_string(),
                gender,
            })
    }

    pub async fn generate_match(
        &self,
        category: &str,
        gender: Gender,
        voter: Option<String>,
    ) -> Result<MatchOffer, MatchError> {
        self.registry
            .generate_match(self.store.as_ref(), category, gender, voter)
            .await
    }

    /// Consume a session without persisting anything
    pub fn resolve_match(
        &self,
        category: &str,
        gender: Gender,
        token: &SessionToken,
        outcome: Outcome,
    ) -> Result<ResolvedMatch, MatchError> {
        self.registry.resolve_match(category, gender, token, outcome)
    }

    /// Resolve a session and persist its result.
    ///
    /// Both rating changes go to storage in one batch, then the vote is
    /// recorded. Skips record a vote with no rating change. The session is
    /// consumed before anything is written, so a storage failure here loses
    /// the result rather than allowing a second resolution.
    pub async fn finish_match(
        &self,
        category: &str,
        gender: Gender,
        token: &SessionToken,
        outcome: Outcome,
    ) -> Result<ResolvedMatch, MatchError> {
        let cohort = self.cohort(category, gender)?;
        let resolved = self.registry.resolve_match(category, gender, token, outcome)?;

        let changes = resolved.rating_changes();
        if !changes.is_empty() {
            self.store
                .apply_rating_changes(cohort, &changes)
                .await
                .map_err(|e| {
                    error!(
                        cohort = cohort.key(),
                        token = %token,
                        "Failed to persist rating changes: {}",
                        e
                    );
                    MatchError::Database(e)
                })?;
        }

        let vote = resolved.vote();
        self.store.record_vote(&vote).await.map_err(|e| {
            error!(cohort = cohort.key(), token = %token, "Failed to record vote: {}", e);
            MatchError::Database(e)
        })?;

        debug!(
            cohort = cohort.key(),
            outcome = resolved.outcome.to_wire(),
            first_delta = resolved.deltas.first,
            second_delta = resolved.deltas.second,
            "Match finished"
        );
        Ok(resolved)
    }

    /// Top candidates of a cohort by rank, cached until the next reconciliation
    pub async fn leaderboard(
        &self,
        category: &str,
        gender: Gender,
    ) -> Result<Arc<Vec<CandidateRecord>>, MatchError> {
        let cohort = self.cohort(category, gender)?;

        self.leaderboards
            .get_or_load(cohort.id(), || {
                self.store.fetch_leaderboard(cohort, self.leaderboard_size)
            })
            .await
            .map_err(|e| {
                error!(cohort = cohort.key(), "Failed to load leaderboard: {}", e);
                // Coalesced loads share the error
                let e = Arc::try_unwrap(e)
                    .unwrap_or_else(|shared| StoreError::Unavailable(shared.to_string()));
                MatchError::Database(e)
            })
    }

    pub async fn candidate(
        &self,
        category: &str,
        gender: Gender,
        candidate_id: CandidateId,
    ) -> Result<Option<CandidateRecord>, MatchError> {
        let cohort = self.cohort(category, gender)?;
        Ok(self.store.fetch_candidate(cohort, candidate_id).await?)
    }

    /// See [`CohortRegistry::cohorts_for_profile`]
    pub fn cohorts_for_profile(&self, gender: &str, country: Option<&str>) -> Option<Vec<&Cohort>> {
        self.registry.cohorts_for_profile(gender, country)
    }

    /// Queue a new profile for insertion into `cohort_ids`.
    ///
    /// Returns `false` if the same addition is already pending.
    pub async fn queue_profile_addition(
        &self,
        candidate_id: CandidateId,
        cohort_ids: &[CohortId],
    ) -> Result<bool, StoreError> {
        let queued = self
            .store
            .enqueue_mutation(candidate_id, MutationKind::Add, cohort_ids)
            .await?;
        if queued {
            info!(candidate_id, cohorts = ?cohort_ids, "Queued profile addition");
        }
        Ok(queued)
    }

    /// Queue a profile for removal from every cohort it belongs to
    pub async fn queue_profile_removal(&self, candidate_id: CandidateId) -> Result<bool, StoreError> {
        let queued = self
            .store
            .enqueue_mutation(candidate_id, MutationKind::Remove, &[])
            .await?;
        if queued {
            info!(candidate_id, "Queued profile removal");
        }
        Ok(queued)
    }

    pub fn summaries(&self) -> Vec<CohortSummary> {
        self.registry.summaries()
    }

    pub async fn health_check(&self) -> Result<bool, StoreError> {
        self.store.health_check().await
    }
}
