use crate::core::error::ReconcileError;
use crate::core::registry::CohortRegistry;
use crate::models::{MutationKind, PendingMutation};
use crate::services::{CandidateStore, LeaderboardCache};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// What one successful reconciliation run did
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub mutations_applied: usize,
    pub cohorts_recounted: usize,
}

/// Periodic task bringing cohort membership, ranks and cardinality in
/// line with storage.
///
/// Every step runs sequentially and the first failure aborts the run.
/// Pending mutations are applied in queue order; ranks and counts are only
/// recomputed once the whole queue has drained.
///
/// A cohort's cardinality never exceeds its number of contiguously ranked
/// rows, so an aborted run leaves every selectable position fetchable.
pub struct Reconciler {
    registry: Arc<CohortRegistry>,
    store: Arc<dyn CandidateStore>,
    leaderboards: Option<LeaderboardCache>,
}

impl Reconciler {
    pub fn new(registry: Arc<CohortRegistry>, store: Arc<dyn CandidateStore>) -> Self {
        Self {
            registry,
            store,
            leaderboards: None,
        }
    }

    /// Drop cached leaderboards whenever a cohort's ranks are recomputed
    pub fn with_cache(mut self, leaderboards: LeaderboardCache) -> Self {
        self.leaderboards = Some(leaderboards);
        self
    }

    pub async fn run_once(&self) -> Result<ReconcileReport, ReconcileError> {
        info!("Starting reconciliation");

        let mutations = self.store.pending_mutations().await.map_err(|e| {
            error!("Failed to fetch pending mutations: {}", e);
            ReconcileError::Fetch(e)
        })?;

        let mut report = ReconcileReport::default();

        for mutation in &mutations {
            self.apply(mutation).await?;
            report.mutations_applied += 1;
        }

        for cohort in self.registry.cohorts() {
            self.store.update_ranks(cohort).await.map_err(|e| {
                error!(cohort = cohort.key(), "Failed to update ranks: {}", e);
                ReconcileError::Ranks {
                    cohort: cohort.id(),
                    source: e,
                }
            })?;

            if let Some(leaderboards) = &self.leaderboards {
                leaderboards.invalidate_all();
            }

            let count = self.store.count_candidates(cohort).await.map_err(|e| {
                error!(cohort = cohort.key(), "Failed to count candidates: {}", e);
                ReconcileError::Count {
                    cohort: cohort.id(),
                    source: e,
                }
            })?;

            self.registry.set_cardinality(cohort, count);
            report.cohorts_recounted += 1;
        }

        info!(
            mutations = report.mutations_applied,
            cohorts = report.cohorts_recounted,
            "Reconciliation complete"
        );
        Ok(report)
    }

    async fn apply(&self, mutation: &PendingMutation) -> Result<(), ReconcileError> {
        let affected = self.store.apply_mutation(mutation).await.map_err(|e| {
            error!(
                mutation_id = mutation.id,
                candidate_id = mutation.candidate_id,
                kind = mutation.kind.as_str(),
                "Pending mutation failed, aborting reconciliation: {}",
                e
            );
            ReconcileError::Mutation {
                mutation_id: mutation.id,
                source: e,
            }
        })?;

        // Added rows stay unranked until the recount, so only removals may
        // move the cardinality here. Storage closes the rank gap of a removal
        // in the same transaction.
        if mutation.kind == MutationKind::Remove {
            for cohort_id in affected {
                match self.registry.get_by_id(cohort_id) {
                    Some(cohort) => {
                        let count = self.registry.shift_cardinality(cohort, -1);
                        debug!(cohort = cohort.key(), count, "Candidate removed");
                    }
                    // Inactive cohorts are not registered
                    None => debug!(
                        "Mutation {} touched unregistered cohort {}",
                        mutation.id, cohort_id
                    ),
                }
            }
        }

        Ok(())
    }

    /// Run every `period` until `shutdown` flips to `true` or its sender
    /// is dropped. The first run happens one period after spawning.
    pub fn spawn(self, period: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Reconciler received shutdown signal");
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once().await {
                            warn!("Reconciliation aborted, retrying next cycle: {}", e);
                        }
                    }
                }
            }

            info!("Reconciler shutdown complete");
        })
    }
}
