//! Refinement rounds.

use serde::{Deserialize, Serialize};

use crate::domain::error::{InferenceError, Result};

/// Position in the fixed refinement sequence 1, 2, 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Round(u32);

impl Round {
    pub const FIRST: Round = Round(1);
    pub const LAST: Round = Round(3);

    /// Every round, in execution order.
    pub const ALL: [Round; 3] = [Round(1), Round(2), Round(3)];

    /// Validate a round number.
    pub fn new(n: u32) -> Result<Self> {
        if (Self::FIRST.0..=Self::LAST.0).contains(&n) {
            Ok(Round(n))
        } else {
            Err(InferenceError::configuration(format!(
                "round must be in 1..=3, got {n}"
            )))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_first(self) -> bool {
        self == Self::FIRST
    }

    /// The round whose moved images feed this one.
    pub fn previous(self) -> Option<Round> {
        if self.is_first() {
            None
        } else {
            Some(Round(self.0 - 1))
        }
    }

    /// Directory name of the round, e.g. `round2`.
    pub fn dir_name(self) -> String {
        format!("round{}", self.0)
    }
}

impl TryFrom<u32> for Round {
    type Error = InferenceError;

    fn try_from(n: u32) -> Result<Self> {
        Round::new(n)
    }
}

impl From<Round> for u32 {
    fn from(round: Round) -> u32 {
        round.0
    }
}

impl std::fmt::Display for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_bounds() {
        assert!(Round::new(0).is_err());
        assert!(Round::new(4).is_err());
        assert_eq!(Round::new(2).unwrap().get(), 2);
    }

    #[test]
    fn test_round_previous() {
        assert_eq!(Round::FIRST.previous(), None);
        assert_eq!(Round::new(3).unwrap().previous(), Some(Round::new(2).unwrap()));
    }

    #[test]
    fn test_round_all_in_order() {
        let numbers: Vec<u32> = Round::ALL.iter().map(|r| r.get()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_round_serde_rejects_out_of_range() {
        let ok: Round = serde_json::from_str("2").unwrap();
        assert_eq!(ok.dir_name(), "round2");
        assert!(serde_json::from_str::<Round>("7").is_err());
    }
}
