// Service exports
pub mod cache;
pub mod postgres;
pub mod store;

pub use cache::{CacheStats, LeaderboardCache};
pub use postgres::PostgresStore;
pub use store::{CandidateStore, StoreError};
