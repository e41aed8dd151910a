use thiserror::Error;

use crate::model::{Rating, TopicState, clamp_difficulty};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("request retention must be in (0, 1), got {provided}")]
    InvalidRetention { provided: f64 },
    #[error("maximum interval must be at least one day, got {provided}")]
    InvalidMaximumInterval { provided: u32 },
}

//
// ─── PARAMETERS ────────────────────────────────────────────────────────────────
//

/// Default FSRS v4.5 weights.
pub const DEFAULT_WEIGHTS: [f64; 17] = [
    0.4, 0.6, 2.4, 5.8, 4.93, 0.94, 0.86, 0.01, 1.49, 0.14, 0.94, 2.18, 0.05, 0.34, 1.26, 0.29,
    2.61,
];

pub const DEFAULT_RETENTION: f64 = 0.9;

pub const DEFAULT_MAXIMUM_INTERVAL: u32 = 36_500;

/// Fixed model parameters. Not mutated once a model is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    pub weights: [f64; 17],
    pub request_retention: f64,
    pub maximum_interval: u32,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            weights: DEFAULT_WEIGHTS,
            request_retention: DEFAULT_RETENTION,
            maximum_interval: DEFAULT_MAXIMUM_INTERVAL,
        }
    }
}

//
// ─── ESTIMATE ──────────────────────────────────────────────────────────────────
//

/// Memory state computed for one review.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryEstimate {
    pub stability: f64,
    pub difficulty: f64,
    pub state: TopicState,
}

//
// ─── MODEL ─────────────────────────────────────────────────────────────────────
//

/// Reduced FSRS memory model that tracks only current stability and difficulty.
///
/// There is no review log and no short-term learning curve: a first review of
/// any rating, `Again` included, lands directly in [`TopicState::Review`].
///
/// # Examples
///
/// ```
/// # use practice_core::scheduler::MemoryModel;
/// # use practice_core::model::Rating;
/// let model = MemoryModel::new();
/// let first = model.initial_estimate(Rating::Good);
/// assert_eq!(first.stability, 2.4);
/// assert_eq!(model.next_interval(first.stability), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryModel {
    params: Parameters,
}

impl Default for MemoryModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryModel {
    /// Model with default weights, 0.9 retention and a 36500 day cap.
    #[must_use]
    pub fn new() -> Self {
        Self {
            params: Parameters::default(),
        }
    }

    /// Model with custom parameters.
    ///
    /// # Errors
    ///
    /// - `InvalidRetention` if `request_retention` is not strictly between 0 and 1
    /// - `InvalidMaximumInterval` if `maximum_interval` is zero
    pub fn try_with_parameters(params: Parameters) -> Result<Self, SchedulerError> {
        let retention = params.request_retention;
        if !(retention > 0.0 && retention < 1.0) {
            return Err(SchedulerError::InvalidRetention {
                provided: retention,
            });
        }
        if params.maximum_interval == 0 {
            return Err(SchedulerError::InvalidMaximumInterval {
                provided: params.maximum_interval,
            });
        }
        Ok(Self { params })
    }

    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    fn w(&self, index: usize) -> f64 {
        self.params.weights[index]
    }

    /// Stability and difficulty after the very first review of a topic.
    #[must_use]
    pub fn initial_estimate(&self, rating: Rating) -> MemoryEstimate {
        let r = f64::from(rating.value());
        let stability = self.w(usize::from(rating.value()) - 1);
        let difficulty = clamp_difficulty(self.w(4) - (r - 3.0) * self.w(5));

        MemoryEstimate {
            stability,
            difficulty,
            state: TopicState::Review,
        }
    }

    /// Stability and difficulty after a later review.
    ///
    /// `prev_stability` must be positive; callers keep that invariant on every write.
    #[must_use]
    pub fn review_estimate(
        &self,
        prev_stability: f64,
        prev_difficulty: f64,
        rating: Rating,
        elapsed_days: f64,
    ) -> MemoryEstimate {
        let r = f64::from(rating.value());
        let retention = self.params.request_retention;

        let difficulty = prev_difficulty - self.w(6) * (r - 3.0);
        let difficulty = clamp_difficulty(self.mean_reversion(difficulty));

        if rating == Rating::Again {
            let stability = self.w(11)
                * difficulty.powf(-self.w(12))
                * ((prev_stability + 1.0).powf(self.w(13)) - 1.0)
                * (self.w(14) * (1.0 - retention)).exp();
            return MemoryEstimate {
                stability,
                difficulty,
                state: TopicState::Relearning,
            };
        }

        let retrievability = retrievability(elapsed_days, prev_stability);
        let hard_penalty = if rating == Rating::Hard { self.w(15) } else { 1.0 };
        let easy_bonus = if rating == Rating::Easy { self.w(16) } else { 1.0 };

        let growth = self.w(8).exp()
            * (11.0 - difficulty)
            * prev_stability.powf(-self.w(9))
            * ((self.w(10) * (1.0 - retrievability)).exp() - 1.0);
        let stability = prev_stability * (1.0 + growth * hard_penalty * easy_bonus);

        MemoryEstimate {
            stability,
            difficulty,
            state: TopicState::Review,
        }
    }

    /// Pull a difficulty toward the initial "Good" difficulty `w[4]`.
    fn mean_reversion(&self, difficulty: f64) -> f64 {
        self.w(7) * self.w(4) + (1.0 - self.w(7)) * difficulty
    }

    /// Days until the next review, clamped to `[1, maximum_interval]`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn next_interval(&self, stability: f64) -> u32 {
        let retention = self.params.request_retention;
        let raw = (9.0 * stability * (1.0 / retention - 1.0)).round();
        let max = f64::from(self.params.maximum_interval);

        if raw.is_nan() {
            return 1;
        }
        // Clamped into u32 range before the cast.
        raw.clamp(1.0, max) as u32
    }
}

/// Probability of recall after `elapsed_days` for a memory of `stability`.
#[must_use]
pub fn retrievability(elapsed_days: f64, stability: f64) -> f64 {
    (1.0 + elapsed_days / (9.0 * stability)).powi(-1)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
