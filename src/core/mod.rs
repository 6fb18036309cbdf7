// Core engine exports
pub mod error;
pub mod matchmaker;
pub mod rating;
pub mod reconcile;
pub mod registry;
pub mod selector;
pub mod session;

pub use error::{MatchError, MatchErrorKind, ReconcileError};
pub use matchmaker::Matchmaker;
pub use rating::{expected_score, match_deltas, rating_delta, Outcome, RatingDeltas, K_FACTOR};
pub use reconcile::{ReconcileReport, Reconciler};
pub use registry::{Cohort, CohortRegistry, MatchOffer, ResolvedMatch, INTERNATIONAL_COUNTRY};
pub use selector::{PairingSelector, FAIRNESS_WINDOW, MAX_FAIRNESS_WINDOW};
pub use session::{MatchSessionStore, PairingSession, SessionToken};
