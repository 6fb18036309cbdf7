use rand::Rng;

/// Opponents on each side of the first pick in the biased regime.
///
/// With a window of 20, position 200 is matched against 180..=219.
pub const FAIRNESS_WINDOW: u64 = 20;

/// Largest accepted window; keeps `2 * window` clear of overflow
pub const MAX_FAIRNESS_WINDOW: u64 = 10_000;

/// Picks two distinct 1-based cohort positions for a pairing.
///
/// Cohorts smaller than `2 * window` are paired uniformly. Larger cohorts
/// keep the opponent inside a `2 * window - 1` wide band around the first
/// pick, shifted inwards at either end of the ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingSelector {
    window: u64,
}

impl PairingSelector {
    pub fn new(window: u64) -> Self {
        Self {
            window: window.clamp(1, MAX_FAIRNESS_WINDOW),
        }
    }

    pub fn window(&self) -> u64 {
        self.window
    }

    /// Whether a cohort of `cohort_size` is paired inside the fairness window
    pub fn is_biased(&self, cohort_size: u64) -> bool {
        cohort_size >= self.window * 2
    }

    /// Select `(position_a, position_b)`, both in `[1, cohort_size]` and distinct.
    ///
    /// Callers must reject cohorts with fewer than two candidates first.
    pub fn select_pair<R: Rng + ?Sized>(&self, rng: &mut R, cohort_size: u64) -> (u64, u64) {
        debug_assert!(cohort_size >= 2, "cohort needs at least two candidates");

        let first = rng.random_range(1..=cohort_size);

        let second = if self.is_biased(cohort_size) {
            let w = self.window;
            let offset = if first + w > cohort_size {
                cohort_size - 2 * w + 1
            } else if first <= w {
                1
            } else {
                first - w
            };
            rng.random_range(offset..=offset + 2 * w - 2)
        } else {
            rng.random_range(1..=cohort_size - 1)
        };

        // Skip over the first pick
        let second = if second >= first { second + 1 } else { second };

        (first, second)
    }
}

impl Default for PairingSelector {
    fn default() -> Self {
        Self::new(FAIRNESS_WINDOW)
    }
}
