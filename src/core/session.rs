//! Double-buffered store of in-flight pairings.
//!
//! Sessions are written to the active generation. Once the decay interval
//! has elapsed the next operation flips the generations and clears the
//! newly active one, so a session stays resolvable for at least one and at
//! most two decay intervals. Resolution removes the session, which makes
//! every token resolvable exactly once.

use crate::models::{CandidateId, CandidateRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Opaque 128-bit random handle for one pairing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(Uuid);

impl SessionToken {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// One outstanding, unresolved pairing. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingSession {
    pub token: SessionToken,
    /// Candidate ids in seat order (position 0 and 1)
    pub candidates: [CandidateId; 2],
    /// Ratings of both seats when the pairing was offered
    pub ratings: [i32; 2],
    /// `None` for anonymous voters
    pub voter: Option<String>,
    pub created_at: DateTime<Utc>,
}

struct Generations {
    buckets: [HashMap<SessionToken, PairingSession>; 2],
    active: usize,
    last_rotation: Instant,
}

impl Generations {
    /// Lazily retire generations whose decay interval has elapsed
    fn rotate(&mut self, now: Instant, decay: Duration) {
        let elapsed = now.saturating_duration_since(self.last_rotation);
        if elapsed < decay {
            return;
        }

        self.active ^= 1;
        self.buckets[self.active].clear();
        // After two idle intervals the previous generation is stale too
        if elapsed >= decay * 2 {
            self.buckets[self.active ^ 1].clear();
        }
        self.last_rotation = now;
    }

    fn contains(&self, token: &SessionToken) -> bool {
        self.buckets[self.active].contains_key(token)
            || self.buckets[self.active ^ 1].contains_key(token)
    }
}

/// Per-cohort session store.
///
/// Rotation, insertion and removal are serialized by one mutex per store;
/// no store shares its lock with another cohort.
pub struct MatchSessionStore {
    decay: Duration,
    inner: Mutex<Generations>,
}

impl MatchSessionStore {
    pub fn new(decay: Duration) -> Self {
        Self::starting_at(decay, Instant::now())
    }

    fn starting_at(decay: Duration, now: Instant) -> Self {
        Self {
            decay,
            inner: Mutex::new(Generations {
                buckets: [HashMap::new(), HashMap::new()],
                active: 0,
                last_rotation: now,
            }),
        }
    }

    pub fn decay_interval(&self) -> Duration {
        self.decay
    }

    fn lock(&self) -> MutexGuard<'_, Generations> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a pairing between `first` and `second` and return its token
    pub fn create_session(
        &self,
        first: &CandidateRecord,
        second: &CandidateRecord,
        voter: Option<String>,
    ) -> SessionToken {
        self.create_session_at(first, second, voter, Instant::now())
    }

    pub(crate) fn create_session_at(
        &self,
        first: &CandidateRecord,
        second: &CandidateRecord,
        voter: Option<String>,
        now: Instant,
    ) -> SessionToken {
        let mut generations = self.lock();
        generations.rotate(now, self.decay);

        let mut token = SessionToken::generate();
        while generations.contains(&token) {
            token = SessionToken::generate();
        }

        let session = PairingSession {
            token,
            candidates: [first.id, second.id],
            ratings: [first.rating, second.rating],
            voter,
            created_at: Utc::now(),
        };

        let active = generations.active;
        generations.buckets[active].insert(token, session);

        token
    }

    /// Whether `token` is still resolvable.
    ///
    /// Prefer [`resolve_session`](Self::resolve_session) and checking the
    /// result over probing first.
    pub fn has_session(&self, token: &SessionToken) -> bool {
        self.has_session_at(token, Instant::now())
    }

    pub(crate) fn has_session_at(&self, token: &SessionToken, now: Instant) -> bool {
        let mut generations = self.lock();
        generations.rotate(now, self.decay);
        generations.contains(token)
    }

    /// Remove and return the session for `token`.
    ///
    /// Unknown, already resolved and decayed tokens all return `None`.
    pub fn resolve_session(&self, token: &SessionToken) -> Option<PairingSession> {
        self.resolve_session_at(token, Instant::now())
    }

    pub(crate) fn resolve_session_at(
        &self,
        token: &SessionToken,
        now: Instant,
    ) -> Option<PairingSession> {
        let mut generations = self.lock();
        generations.rotate(now, self.decay);

        let active = generations.active;
        if let Some(session) = generations.buckets[active].remove(token) {
            return Some(session);
        }
        generations.buckets[active ^ 1].remove(token)
    }

    /// Number of resolvable sessions across both generations
    pub fn len(&self) -> usize {
        let generations = self.lock();
        generations.buckets[0].len() + generations.buckets[1].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for MatchSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchSessionStore")
            .field("decay", &self.decay)
            .field("sessions", &self.len())
            .finish()
    }
}
