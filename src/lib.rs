//! Matchup - pairwise voting and Elo rating engine
//!
//! This library pairs two candidates of a cohort for a voter, remembers the
//! pairing in a decaying in-memory session store, and turns the vote into
//! Elo rating changes. Storage sits behind the [`CandidateStore`] trait;
//! [`PostgresStore`] is the production implementation.

pub mod config;
pub mod core;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use self::core::{
    Cohort, CohortRegistry, MatchError, MatchOffer, Matchmaker, Outcome, PairingSelector,
    ReconcileError, Reconciler, ResolvedMatch, SessionToken,
};
pub use models::{CandidateRecord, CohortSummary, Gender};
pub use services::{CandidateStore, LeaderboardCache, PostgresStore, StoreError};
