use crate::core::error::MatchError;
use crate::core::rating::{match_deltas, Outcome, RatingDeltas};
use crate::core::selector::PairingSelector;
use crate::core::session::{MatchSessionStore, PairingSession, SessionToken};
use crate::models::{
    CandidateId, CandidateRecord, CohortId, CohortRow, CohortSummary, Gender, RatingChange,
    VoteRecord,
};
use crate::services::{CandidateStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

/// Country key of the cohort every profile joins
pub const INTERNATIONAL_COUNTRY: &str = "international";

/// A partition of candidates by category and gender
#[derive(Debug)]
pub struct Cohort {
    id: CohortId,
    category: String,
    country: String,
    gender: Gender,
    active: bool,
    predefined: bool,
    key: String,
    candidate_count: AtomicU64,
    sessions: MatchSessionStore,
}

impl Cohort {
    fn new(
        id: CohortId,
        category: String,
        country: String,
        gender: Gender,
        active: bool,
        predefined: bool,
        decay: Duration,
    ) -> Self {
        let key = format!("{}-{}", category, gender);
        Self {
            id,
            category,
            country,
            gender,
            active,
            predefined,
            key,
            candidate_count: AtomicU64::new(0),
            sessions: MatchSessionStore::new(decay),
        }
    }

    pub fn id(&self) -> CohortId {
        self.id
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Fixed roster (predefined subjects) rather than open membership
    pub fn is_predefined(&self) -> bool {
        self.predefined
    }

    /// `"{category}-{gender}"`, e.g. `"dk-f"`
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn candidate_count(&self) -> u64 {
        self.candidate_count.load(Ordering::Acquire)
    }

    pub fn sessions(&self) -> &MatchSessionStore {
        &self.sessions
    }

    fn set_candidate_count(&self, count: u64) {
        self.candidate_count.store(count, Ordering::Release);
    }

    /// Shift the count by `delta`, flooring at zero
    fn shift_candidate_count(&self, delta: i64) -> u64 {
        let shift = |current: u64| Some(current.saturating_add_signed(delta));
        let previous = self
            .candidate_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, shift)
            .unwrap_or_else(|current| current);
        previous.saturating_add_signed(delta)
    }

    pub fn summary(&self) -> CohortSummary {
        CohortSummary {
            id: self.id,
            category: self.category.clone(),
            country: self.country.clone(),
            gender: self.gender,
            active: self.active,
            predefined: self.predefined,
            candidate_count: self.candidate_count(),
        }
    }
}

/// A freshly generated pairing handed to the voter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchOffer {
    pub token: SessionToken,
    pub first: CandidateRecord,
    pub second: CandidateRecord,
}

/// A consumed pairing with its outcome and rating deltas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMatch {
    pub cohort_id: CohortId,
    pub session: PairingSession,
    pub outcome: Outcome,
    pub deltas: RatingDeltas,
}

impl ResolvedMatch {
    pub fn winner(&self) -> Option<CandidateId> {
        match self.outcome {
            Outcome::FirstWins => Some(self.session.candidates[0]),
            Outcome::SecondWins => Some(self.session.candidates[1]),
            Outcome::Skipped => None,
        }
    }

    /// Changes to persist: one per seat on a decisive outcome, none on skip
    pub fn rating_changes(&self) -> Vec<RatingChange> {
        if !self.outcome.is_decisive() {
            return Vec::new();
        }

        let first_won = self.outcome == Outcome::FirstWins;
        vec![
            RatingChange {
                candidate_id: self.session.candidates[0],
                delta: self.deltas.first,
                won: first_won,
            },
            RatingChange {
                candidate_id: self.session.candidates[1],
                delta: self.deltas.second,
                won: !first_won,
            },
        ]
    }

    pub fn vote(&self) -> VoteRecord {
        VoteRecord {
            cohort_id: self.cohort_id,
            first_id: self.session.candidates[0],
            second_id: self.session.candidates[1],
            winner_id: self.winner(),
            voter: self.session.voter.clone(),
        }
    }
}

/// Arena of cohorts with key indices.
///
/// The set of cohorts is fixed once loaded; only candidate counts and
/// per-cohort sessions change afterwards.
#[derive(Debug)]
pub struct CohortRegistry {
    cohorts: Vec<Cohort>,
    by_key: HashMap<(String, Gender), usize>,
    by_country: HashMap<(String, Gender), usize>,
    by_id: HashMap<CohortId, usize>,
    categories: Vec<String>,
    decay: Duration,
    selector: PairingSelector,
}

impl CohortRegistry {
    pub fn new(decay: Duration, selector: PairingSelector) -> Self {
        Self {
            cohorts: Vec::new(),
            by_key: HashMap::new(),
            by_country: HashMap::new(),
            by_id: HashMap::new(),
            categories: Vec::new(),
            decay,
            selector,
        }
    }

    /// Build the registry from every active cohort row in storage.
    ///
    /// A failure here must stop startup.
    pub async fn load(
        store: &dyn CandidateStore,
        decay: Duration,
        selector: PairingSelector,
    ) -> Result<Self, StoreError> {
        let rows = store.fetch_cohort_rows().await?;
        let mut registry = Self::new(decay, selector);

        for row in rows.iter().filter(|row| row.active) {
            registry.register(row);
        }

        info!(
            cohorts = registry.len(),
            decay_secs = decay.as_secs(),
            "Loaded cohorts; matches decay after roughly one interval"
        );
        Ok(registry)
    }

    /// Register one cohort row. Rows with an unrecognized gender or a
    /// duplicate key are logged and skipped.
    pub fn register(&mut self, row: &CohortRow) -> Option<&Cohort> {
        let gender: Gender = match row.gender.parse() {
            Ok(gender) => gender,
            Err(e) => {
                warn!(
                    id = row.id,
                    category = %row.category,
                    country = %row.country,
                    "Invalid cohort row: {}",
                    e
                );
                return None;
            }
        };

        let key = (row.category.clone(), gender);
        if self.by_key.contains_key(&key) || self.by_id.contains_key(&row.id) {
            warn!(id = row.id, "Duplicate cohort '{}-{}', skipping", row.category, gender);
            return None;
        }

        let index = self.cohorts.len();
        self.cohorts.push(Cohort::new(
            row.id,
            row.category.clone(),
            row.country.clone(),
            gender,
            row.active,
            row.predefined,
            self.decay,
        ));

        self.by_key.insert(key, index);
        self.by_country
            .entry((row.country.to_lowercase(), gender))
            .or_insert(index);
        self.by_id.insert(row.id, index);
        if !self.categories.contains(&row.category) {
            self.categories.push(row.category.clone());
        }

        let cohort = &self.cohorts[index];
        info!("Registered cohort '{}'", cohort.key());
        Some(cohort)
    }

    pub fn get(&self, category: &str, gender: Gender) -> Option<&Cohort> {
        self.by_key
            .get(&(category.to_string(), gender))
            .map(|&index| &self.cohorts[index])
    }

    pub fn get_by_id(&self, id: CohortId) -> Option<&Cohort> {
        self.by_id.get(&id).map(|&index| &self.cohorts[index])
    }

    pub fn contains_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    /// Distinct categories in registration order
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn cohorts(&self) -> &[Cohort] {
        &self.cohorts
    }

    pub fn summaries(&self) -> Vec<CohortSummary> {
        self.cohorts.iter().map(Cohort::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.cohorts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cohorts.is_empty()
    }

    pub fn selector(&self) -> &PairingSelector {
        &self.selector
    }

    /// Cohorts a new profile joins: its country's cohort (if any) and the
    /// international one. `None` if the profile gender has no cohorts.
    pub fn cohorts_for_profile(&self, gender: &str, country: Option<&str>) -> Option<Vec<&Cohort>> {
        let gender = Gender::from_profile(gender)?;
        let mut result = Vec::with_capacity(2);

        if let Some(country) = country {
            let country = country.to_lowercase();
            if country != INTERNATIONAL_COUNTRY {
                if let Some(&index) = self.by_country.get(&(country, gender)) {
                    result.push(&self.cohorts[index]);
                }
            }
        }

        if let Some(&index) = self
            .by_country
            .get(&(INTERNATIONAL_COUNTRY.to_string(), gender))
        {
            result.push(&self.cohorts[index]);
        }

        Some(result)
    }

    pub fn set_cardinality(&self, cohort: &Cohort, count: u64) {
        cohort.set_candidate_count(count);
    }

    /// Returns the new cardinality
    pub fn shift_cardinality(&self, cohort: &Cohort, delta: i64) -> u64 {
        cohort.shift_candidate_count(delta)
    }

    /// Pick two candidates of a cohort and open a session for them
    pub async fn generate_match(
        &self,
        store: &dyn CandidateStore,
        category: &str,
        gender: Gender,
        voter: Option<String>,
    ) -> Result<MatchOffer, MatchError> {
        let cohort = self
            .get(category, gender)
            .ok_or_else(|| MatchError::UnknownCohort {
                category: category.to_string(),
                gender,
            })?;

        let count = cohort.candidate_count();
        if count < 2 {
            warn!("Not enough candidates in cohort {} ({})", cohort.key(), count);
            return Err(MatchError::TooFewCandidates {
                cohort: cohort.key().to_string(),
                count,
            });
        }

        let (first, second) = {
            let mut rng = rand::rng();
            self.selector.select_pair(&mut rng, count)
        };

        let records = store
            .fetch_candidates_at_positions(cohort, &[first, second])
            .await
            .map_err(|e| {
                error!(
                    cohort = cohort.key(),
                    "Failed to fetch candidates at ({}, {}): {}", first, second, e
                );
                MatchError::Database(e)
            })?;

        let fetched = records.len();
        let mut records = records.into_iter();
        let (Some(first_record), Some(second_record)) = (records.next(), records.next()) else {
            error!(
                cohort = cohort.key(),
                "{} candidate(s) fetched, but 2 were needed. Positions ({}, {})",
                fetched,
                first,
                second
            );
            return Err(MatchError::Database(StoreError::InvalidData(format!(
                "expected 2 candidates at positions ({}, {}), got {}",
                first, second, fetched
            ))));
        };

        // No session exists until both candidates are in hand
        let token = cohort
            .sessions()
            .create_session(&first_record, &second_record, voter);

        tracing::debug!(
            cohort = cohort.key(),
            token = %token,
            "Match started between positions {} and {}",
            first,
            second
        );

        Ok(MatchOffer {
            token,
            first: first_record,
            second: second_record,
        })
    }

    /// Consume a session and compute the rating deltas for `outcome`
    pub fn resolve_match(
        &self,
        category: &str,
        gender: Gender,
        token: &SessionToken,
        outcome: Outcome,
    ) -> Result<ResolvedMatch, MatchError> {
        let cohort = self
            .get(category, gender)
            .ok_or_else(|| MatchError::UnknownCohort {
                category: category.to_string(),
                gender,
            })?;

        let session = cohort
            .sessions()
            .resolve_session(token)
            .ok_or(MatchError::UnresolvableSession)?;

        let deltas = match_deltas(session.ratings[0], session.ratings[1], outcome);

        Ok(ResolvedMatch {
            cohort_id: cohort.id(),
            session,
            outcome,
            deltas,
        })
    }
}
