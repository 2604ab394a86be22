//! Lifecycle stage numbering.

use serde::{Deserialize, Serialize};

/// A lifecycle stage in the fixed 1..=25 sequence.
///
/// The inner number is private so a `Stage` is always in range; construct
/// via [`Stage::new`] or deserialization (which validates).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Stage(u8);

impl Stage {
    /// The first lifecycle stage.
    pub const FIRST: Stage = Stage(1);
    /// The last lifecycle stage.
    pub const LAST: Stage = Stage(25);
    /// Total number of stages.
    pub const COUNT: u8 = 25;

    /// Create a stage, rejecting out-of-range numbers.
    pub fn new(number: u8) -> Option<Stage> {
        if (1..=Self::COUNT).contains(&number) {
            Some(Stage(number))
        } else {
            None
        }
    }

    /// The raw stage number.
    pub fn get(self) -> u8 {
        self.0
    }

    /// The next stage, or `None` at the end of the sequence.
    pub fn next(self) -> Option<Stage> {
        Stage::new(self.0 + 1)
    }
}

impl TryFrom<u8> for Stage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Stage::new(value).ok_or_else(|| format!("stage {value} out of range 1..=25"))
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> u8 {
        stage.0
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
