//! In-memory `CandidateStore` shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use matchup::core::{Cohort, CohortRegistry, Matchmaker, PairingSelector};
use matchup::models::{
    CandidateId, CandidateRecord, CohortId, CohortRow, MutationKind, PendingMutation,
    RatingChange, VoteRecord,
};
use matchup::services::{CandidateStore, LeaderboardCache, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub const DECAY: Duration = Duration::from_secs(60);

pub fn cohort_rows() -> Vec<CohortRow> {
    vec![
        row(1, "dk", "Denmark", "f"),
        row(2, "dk", "Denmark", "m"),
        row(3, "int", "International", "f"),
        row(4, "int", "International", "m"),
    ]
}

pub fn row(id: CohortId, category: &str, country: &str, gender: &str) -> CohortRow {
    CohortRow {
        id,
        category: category.to_string(),
        country: country.to_string(),
        gender: gender.to_string(),
        active: true,
        predefined: false,
    }
}

pub fn candidate(id: CandidateId, rating: i32) -> CandidateRecord {
    CandidateRecord {
        id,
        name: format!("Candidate {}", id),
        external_id: None,
        rating,
        wins: 0,
        losses: 0,
        rank: None,
        picture: None,
        picture_author: None,
        picture_license: None,
        known_for: None,
        desc_url: None,
    }
}

#[derive(Default)]
struct State {
    rows: Vec<CohortRow>,
    members: HashMap<CohortId, Vec<CandidateRecord>>,
    pending: Vec<PendingMutation>,
    next_mutation_id: i64,
    votes: Vec<VoteRecord>,
    rating_batches: Vec<(CohortId, Vec<RatingChange>)>,
    attempted_mutations: Vec<i64>,
    rank_updates: Vec<CohortId>,
    counted: Vec<CohortId>,
    leaderboard_fetches: usize,
    fail_mutation: Option<i64>,
    fail_fetch: bool,
    short_fetch: bool,
    fail_count: Option<CohortId>,
}

impl State {
    fn rerank(&mut self, cohort: CohortId) {
        if let Some(members) = self.members.get_mut(&cohort) {
            members.sort_by(|a, b| b.rating.cmp(&a.rating).then(a.id.cmp(&b.id)));
            for (index, member) in members.iter_mut().enumerate() {
                member.rank = Some(index as i64 + 1);
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new(rows: Vec<CohortRow>) -> Self {
        let store = Self::default();
        {
            let mut state = store.lock();
            state.rows = rows;
            state.next_mutation_id = 1;
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Add `count` ranked candidates to a cohort, ids `cohort * 1000 + n`,
    /// ratings descending from 1000 + count
    pub fn seed(&self, cohort: CohortId, count: u64) {
        let mut state = self.lock();
        let members = state.members.entry(cohort).or_default();
        for n in 1..=count as i64 {
            members.push(candidate(cohort * 1000 + n, 1000 + count as i32 - n as i32));
        }
        state.rerank(cohort);
    }

    pub fn insert(&self, cohort: CohortId, record: CandidateRecord) {
        let mut state = self.lock();
        state.members.entry(cohort).or_default().push(record);
        state.rerank(cohort);
    }

    pub fn fail_mutation(&self, id: i64) {
        self.lock().fail_mutation = Some(id);
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.lock().fail_fetch = fail;
    }

    /// Return only the first requested candidate
    pub fn short_fetch(&self, short: bool) {
        self.lock().short_fetch = short;
    }

    pub fn fail_count(&self, cohort: CohortId) {
        self.lock().fail_count = Some(cohort);
    }

    pub fn member(&self, cohort: CohortId, id: CandidateId) -> Option<CandidateRecord> {
        self.lock()
            .members
            .get(&cohort)
            .and_then(|members| members.iter().find(|m| m.id == id).cloned())
    }

    pub fn member_count(&self, cohort: CohortId) -> usize {
        self.lock().members.get(&cohort).map_or(0, Vec::len)
    }

    pub fn votes(&self) -> Vec<VoteRecord> {
        self.lock().votes.clone()
    }

    pub fn rating_batches(&self) -> Vec<(CohortId, Vec<RatingChange>)> {
        self.lock().rating_batches.clone()
    }

    pub fn pending(&self) -> Vec<PendingMutation> {
        self.lock().pending.clone()
    }

    pub fn attempted_mutations(&self) -> Vec<i64> {
        self.lock().attempted_mutations.clone()
    }

    pub fn rank_updates(&self) -> Vec<CohortId> {
        self.lock().rank_updates.clone()
    }

    pub fn counted(&self) -> Vec<CohortId> {
        self.lock().counted.clone()
    }

    pub fn leaderboard_fetches(&self) -> usize {
        self.lock().leaderboard_fetches
    }
}

#[async_trait]
impl CandidateStore for MemoryStore {
    async fn fetch_cohort_rows(&self) -> Result<Vec<CohortRow>, StoreError> {
        Ok(self.lock().rows.clone())
    }

    async fn fetch_candidates_at_positions(
        &self,
        cohort: &Cohort,
        positions: &[u64],
    ) -> Result<Vec<CandidateRecord>, StoreError> {
        let state = self.lock();
        if state.fail_fetch {
            return Err(StoreError::Unavailable("fetch disabled".to_string()));
        }

        let members = state.members.get(&cohort.id()).cloned().unwrap_or_default();
        let mut records: Vec<CandidateRecord> = positions
            .iter()
            .filter_map(|&p| members.iter().find(|m| m.rank == Some(p as i64)).cloned())
            .collect();

        if state.short_fetch {
            records.truncate(1);
        }
        Ok(records)
    }

    async fn apply_rating_changes(
        &self,
        cohort: &Cohort,
        changes: &[RatingChange],
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        if let Some(members) = state.members.get_mut(&cohort.id()) {
            for change in changes {
                if let Some(member) = members.iter_mut().find(|m| m.id == change.candidate_id) {
                    member.rating += change.delta;
                    if change.won {
                        member.wins += 1;
                    } else {
                        member.losses += 1;
                    }
                }
            }
        }
        state.rating_batches.push((cohort.id(), changes.to_vec()));
        Ok(())
    }

    async fn record_vote(&self, vote: &VoteRecord) -> Result<(), StoreError> {
        self.lock().votes.push(vote.clone());
        Ok(())
    }

    async fn pending_mutations(&self) -> Result<Vec<PendingMutation>, StoreError> {
        Ok(self.lock().pending.clone())
    }

    async fn apply_mutation(
        &self,
        mutation: &PendingMutation,
    ) -> Result<Vec<CohortId>, StoreError> {
        let mut state = self.lock();
        state.attempted_mutations.push(mutation.id);

        if state.fail_mutation == Some(mutation.id) {
            return Err(StoreError::InvalidData(format!(
                "mutation {} rejected",
                mutation.id
            )));
        }

        state.pending.retain(|m| m.id != mutation.id);

        let mut affected = Vec::new();
        match mutation.kind {
            MutationKind::Add => {
                for &cohort in &mutation.cohort_ids {
                    let members = state.members.entry(cohort).or_default();
                    if !members.iter().any(|m| m.id == mutation.candidate_id) {
                        members.push(candidate(mutation.candidate_id, 1000));
                        affected.push(cohort);
                    }
                }
            }
            MutationKind::Remove => {
                for (&cohort, members) in state.members.iter_mut() {
                    let Some(index) = members.iter().position(|m| m.id == mutation.candidate_id)
                    else {
                        continue;
                    };
                    if let Some(removed) = members.remove(index).rank {
                        for member in members.iter_mut() {
                            if let Some(rank) = member.rank.as_mut().filter(|r| **r > removed) {
                                *rank -= 1;
                            }
                        }
                    }
                    affected.push(cohort);
                }
                affected.sort_unstable();
            }
        }
        Ok(affected)
    }

    async fn enqueue_mutation(
        &self,
        candidate_id: CandidateId,
        kind: MutationKind,
        cohort_ids: &[CohortId],
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();
        if state
            .pending
            .iter()
            .any(|m| m.candidate_id == candidate_id && m.kind == kind)
        {
            return Ok(false);
        }

        let id = state.next_mutation_id;
        state.next_mutation_id += 1;
        state.pending.push(PendingMutation {
            id,
            candidate_id,
            kind,
            cohort_ids: cohort_ids.to_vec(),
        });
        Ok(true)
    }

    async fn update_ranks(&self, cohort: &Cohort) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.rank_updates.push(cohort.id());
        state.rerank(cohort.id());
        Ok(())
    }

    async fn count_candidates(&self, cohort: &Cohort) -> Result<u64, StoreError> {
        let mut state = self.lock();
        if state.fail_count == Some(cohort.id()) {
            return Err(StoreError::Unavailable("count disabled".to_string()));
        }
        state.counted.push(cohort.id());
        Ok(state.members.get(&cohort.id()).map_or(0, Vec::len) as u64)
    }

    async fn fetch_leaderboard(
        &self,
        cohort: &Cohort,
        limit: u32,
    ) -> Result<Vec<CandidateRecord>, StoreError> {
        let mut state = self.lock();
        state.leaderboard_fetches += 1;
        let mut board: Vec<CandidateRecord> = state
            .members
            .get(&cohort.id())
            .map(|members| {
                members
                    .iter()
                    .filter(|m| m.rank.is_some_and(|rank| rank <= limit as i64))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        board.sort_by_key(|m| m.rank);
        Ok(board)
    }

    async fn fetch_candidate(
        &self,
        cohort: &Cohort,
        candidate_id: CandidateId,
    ) -> Result<Option<CandidateRecord>, StoreError> {
        Ok(self.member(cohort.id(), candidate_id))
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}

/// A registry loaded from `store` with the given cardinalities applied
pub async fn registry(store: &MemoryStore, cardinalities: &[(CohortId, u64)]) -> CohortRegistry {
    let registry = CohortRegistry::load(store, DECAY, PairingSelector::default())
        .await
        .expect("load cohorts");

    for &(id, count) in cardinalities {
        let cohort = registry.get_by_id(id).expect("registered cohort");
        registry.set_cardinality(cohort, count);
    }
    registry
}

/// Store seeded with `sizes` candidates per cohort and a matchmaker over it
pub async fn setup(sizes: &[(CohortId, u64)]) -> (Arc<MemoryStore>, Matchmaker) {
    let store = Arc::new(MemoryStore::new(cohort_rows()));
    for &(cohort, count) in sizes {
        store.seed(cohort, count);
    }

    let registry = Arc::new(registry(&store, sizes).await);
    let matchmaker = Matchmaker::new(
        registry,
        store.clone(),
        LeaderboardCache::new(64, Duration::from_secs(300)),
        3,
    );
    (store, matchmaker)
}
