//! Dice kinds and rolling

use rand::Rng;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DiceKind {
    D4,
    D6,
    D8,
    D10,
    D12,
    #[default]
    D20,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown dice type `{0}` (expected one of d4, d6, d8, d10, d12, d20)")]
pub struct UnknownDice(pub String);

impl DiceKind {
    pub const ALL: [DiceKind; 6] = [
        DiceKind::D4,
        DiceKind::D6,
        DiceKind::D8,
        DiceKind::D10,
        DiceKind::D12,
        DiceKind::D20,
    ];

    pub fn sides(self) -> u32 {
        match self {
            DiceKind::D4 => 4,
            DiceKind::D6 => 6,
            DiceKind::D8 => 8,
            DiceKind::D10 => 10,
            DiceKind::D12 => 12,
            DiceKind::D20 => 20,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiceKind::D4 => "d4",
            DiceKind::D6 => "d6",
            DiceKind::D8 => "d8",
            DiceKind::D10 => "d10",
            DiceKind::D12 => "d12",
            DiceKind::D20 => "d20",
        }
    }

    /// Uniform result in `1..=sides`.
    pub fn roll<R: Rng + ?Sized>(self, rng: &mut R) -> u32 {
        rng.gen_range(1..=self.sides())
    }
}

impl fmt::Display for DiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiceKind {
    type Err = UnknownDice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        DiceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| UnknownDice(s.to_string()))
    }
}

/// Chat line shown for a roll.
pub fn roll_text(sender_name: &str, dice_type: &str, result: u32) -> String {
    format!("{} rolled a {}: {}", sender_name, dice_type, result)
}
