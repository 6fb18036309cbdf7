use crate::models::{CandidateRecord, CohortId};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory leaderboard cache, one entry per cohort.
///
/// Ranks only move when reconciliation runs, so entries live for one
/// reconciliation interval. Entries are keyed by an invalidation epoch:
/// a load still in flight when the cache is invalidated lands under the
/// old epoch and is never served.
#[derive(Clone)]
pub struct LeaderboardCache {
    entries: moka::future::Cache<(CohortId, u64), Arc<Vec<CandidateRecord>>>,
    epoch: Arc<AtomicU64>,
    ttl: Duration,
}

impl LeaderboardCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let entries = moka::future::CacheBuilder::new(capacity)
            .time_to_live(ttl)
            .build();

        Self {
            entries,
            epoch: Arc::new(AtomicU64::new(0)),
            ttl,
        }
    }

    fn key(&self, cohort: CohortId) -> (CohortId, u64) {
        (cohort, self.epoch.load(Ordering::Acquire))
    }

    pub async fn get(&self, cohort: CohortId) -> Option<Arc<Vec<CandidateRecord>>> {
        let hit = self.entries.get(&self.key(cohort)).await;
        if hit.is_some() {
            tracing::trace!("Leaderboard cache hit: {}", cohort);
        }
        hit
    }

    pub async fn insert(&self, cohort: CohortId, board: Vec<CandidateRecord>) -> Arc<Vec<CandidateRecord>> {
        let board = Arc::new(board);
        self.entries.insert(self.key(cohort), Arc::clone(&board)).await;
        tracing::trace!("Leaderboard cache set: {}", cohort);
        board
    }

    /// Return the cached board or load and cache it.
    ///
    /// Concurrent misses for one cohort share a single load. Failed loads
    /// are not cached and every waiter gets the same error.
    pub async fn get_or_load<F, Fut, E>(
        &self,
        cohort: CohortId,
        load: F,
    ) -> Result<Arc<Vec<CandidateRecord>>, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<CandidateRecord>, E>>,
        E: Send + Sync + 'static,
    {
        self.entries
            .try_get_with(self.key(cohort), async move {
                let board = load().await?;
                tracing::trace!("Leaderboard cache set: {}", cohort);
                Ok(Arc::new(board))
            })
            .await
    }

    /// Drop every cached board, including loads that have not finished yet
    pub fn invalidate_all(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.entries.invalidate_all();
        tracing::debug!("Invalidated all leaderboards");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.entry_count(),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: u64,
    pub ttl_secs: u64,
}
