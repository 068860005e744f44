use serde::{Deserialize, Serialize};
use std::fmt;

/// Signal class produced by the classifier. The class order matches the
/// network's output layer: Long = 0, Short = 1, Neutral = 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

impl Direction {
    pub fn class_index(self) -> usize {
        match self {
            Direction::Long => 0,
            Direction::Short => 1,
            Direction::Neutral => 2,
        }
    }

    pub fn from_class_index(index: usize) -> Self {
        match index {
            0 => Direction::Long,
            1 => Direction::Short,
            _ => Direction::Neutral,
        }
    }

    /// Sign of the implied position: +1 long, -1 short, 0 flat.
    pub fn signum(self) -> i8 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
            Direction::Neutral => 0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
            Direction::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_index_round_trip() {
        for direction in [Direction::Long, Direction::Short, Direction::Neutral] {
            assert_eq!(Direction::from_class_index(direction.class_index()), direction);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Direction::Long.to_string(), "LONG");
        assert_eq!(Direction::Short.to_string(), "SHORT");
        assert_eq!(Direction::Neutral.to_string(), "NEUTRAL");
    }
}
