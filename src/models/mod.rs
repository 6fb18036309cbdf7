// Model exports
pub mod domain;

pub use domain::{
    CandidateId, CandidateRecord, CohortId, CohortRow, CohortSummary, Gender, InvalidGender,
    MutationKind, PendingMutation, RatingChange, VoteRecord, ANONYMOUS_VOTER, SKIPPED_WINNER_ID,
};
