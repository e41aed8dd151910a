use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors that can occur when interpreting a user rating.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RatingError {
    #[error("invalid rating value: {0} (expected 1-4)")]
    InvalidRating(u8),
}

//
// ─── RATING ───────────────────────────────────────────────────────────────────
//

/// Four-level recall rating given after working through a question.
///
/// Numeric values follow the scheduler's 1-4 scale and are what the
/// memory model formulas index with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Rating {
    /// Could not solve it.
    Again,
    /// Solved with significant difficulty.
    Hard,
    /// Solved with appropriate effort.
    Good,
    /// Solved without effort.
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// Converts a numeric rating (1-4).
    ///
    /// # Errors
    ///
    /// Returns `RatingError::InvalidRating` if the value is outside 1-4.
    pub fn from_u8(value: u8) -> Result<Self, RatingError> {
        match value {
            1 => Ok(Self::Again),
            2 => Ok(Self::Hard),
            3 => Ok(Self::Good),
            4 => Ok(Self::Easy),
            _ => Err(RatingError::InvalidRating(value)),
        }
    }

    /// Numeric value on the 1-4 scale.
    #[must_use]
    pub fn value(self) -> u8 {
        match self {
            Rating::Again => 1,
            Rating::Hard => 2,
            Rating::Good => 3,
            Rating::Easy => 4,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Rating::Again => "Again",
            Rating::Hard => "Hard",
            Rating::Good => "Good",
            Rating::Easy => "Easy",
        }
    }
}

impl TryFrom<u8> for Rating {
    type Error = RatingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.value()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_rating_conversion_works() {
        assert_eq!(Rating::from_u8(1).unwrap(), Rating::Again);
        assert_eq!(Rating::from_u8(4).unwrap(), Rating::Easy);
        assert!(matches!(
            Rating::from_u8(0).unwrap_err(),
            RatingError::InvalidRating(0)
        ));
        assert!(Rating::from_u8(5).is_err());
    }

    #[test]
    fn value_round_trips_for_every_rating() {
        for rating in Rating::ALL {
            assert_eq!(Rating::from_u8(rating.value()).unwrap(), rating);
        }
    }

    #[test]
    fn serializes_as_number() {
        assert_eq!(serde_json::to_string(&Rating::Hard).unwrap(), "2");
        assert!(serde_json::from_str::<Rating>("9").is_err());
    }
}
