use serde::{Deserialize, Serialize};

/// K-factor for rating updates
pub const K_FACTOR: f64 = 32.0;

/// Outcome of a pairing, as voted
///
/// Wire encoding: `1` = first candidate won, `0` = second candidate won,
/// anything else = skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    FirstWins,
    SecondWins,
    Skipped,
}

impl Outcome {
    /// Decode the numeric wire value. Every value other than 1 and 0 is a skip.
    pub fn from_wire(value: i64) -> Self {
        match value {
            1 => Outcome::FirstWins,
            0 => Outcome::SecondWins,
            _ => Outcome::Skipped,
        }
    }

    /// Decode a raw wire string; non-numeric input is a skip
    pub fn parse(raw: &str) -> Self {
        raw.trim()
            .parse::<i64>()
            .map(Self::from_wire)
            .unwrap_or(Outcome::Skipped)
    }

    pub fn to_wire(self) -> i64 {
        match self {
            Outcome::FirstWins => 1,
            Outcome::SecondWins => 0,
            Outcome::Skipped => -1,
        }
    }

    /// The same outcome seen from the second candidate's seat
    pub fn swapped(self) -> Self {
        match self {
            Outcome::FirstWins => Outcome::SecondWins,
            Outcome::SecondWins => Outcome::FirstWins,
            Outcome::Skipped => Outcome::Skipped,
        }
    }

    pub fn is_decisive(self) -> bool {
        !matches!(self, Outcome::Skipped)
    }
}

/// Rating deltas for both seats of a resolved pairing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingDeltas {
    pub first: i32,
    pub second: i32,
}

/// Expected score of `rating_self` against `rating_opponent`
#[inline]
pub fn expected_score(rating_self: i32, rating_opponent: i32) -> f64 {
    let diff = f64::from(rating_opponent) - f64::from(rating_self);
    1.0 / (1.0 + 10.0_f64.powf(diff / 400.0))
}

/// Rating delta for `rating_self`, where `FirstWins` means self won.
///
/// Skips yield 0. Halves round towards positive infinity.
pub fn rating_delta(rating_self: i32, rating_opponent: i32, outcome: Outcome) -> i32 {
    let score = match outcome {
        Outcome::FirstWins => 1.0,
        Outcome::SecondWins => 0.0,
        Outcome::Skipped => return 0,
    };

    let raw = K_FACTOR * (score - expected_score(rating_self, rating_opponent));
    (raw + 0.5).floor() as i32
}

/// Deltas for both candidates, each computed from its own perspective.
///
/// `first` and `-second` may differ by one because of rounding; that is kept.
pub fn match_deltas(rating_first: i32, rating_second: i32, outcome: Outcome) -> RatingDeltas {
    if !outcome.is_decisive() {
        return RatingDeltas::default();
    }

    RatingDeltas {
        first: rating_delta(rating_first, rating_second, outcome),
        second: rating_delta(rating_second, rating_first, outcome.swapped()),
    }
}
