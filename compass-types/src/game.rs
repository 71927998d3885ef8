use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::errors::ColorParseError;

/// Largest value representable by a 24-bit RGB color.
pub const MAX_RGB: u32 = 0x00FF_FFFF;

/// A 24-bit RGB color in canonical `#rrggbb` form (lowercase, zero padded).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(try_from = "String", into = "String")]
#[ts(export)]
pub struct Color(String);

impl Color {
    /// Build a color from the low 24 bits of `value`.
    pub fn from_rgb(value: u32) -> Self {
        Color(format!("#{:06x}", value & MAX_RGB))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn rgb(&self) -> u32 {
        // Constructors only ever store validated hex.
        u32::from_str_radix(&self.0[1..], 16).unwrap_or_default()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| ColorParseError::MissingHash(s.to_string()))?;
        if hex.len() != 6 {
            return Err(ColorParseError::InvalidLength(s.to_string()));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError::InvalidDigit(s.to_string()));
        }
        Ok(Color(format!("#{}", hex.to_ascii_lowercase())))
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum GamePhase {
    Ready,
    Playing,
    Ended,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GamePhase::Ready => "ready",
            GamePhase::Playing => "playing",
            GamePhase::Ended => "ended",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoundSnapshot {
    pub number: u32,
    pub targets: Vec<Color>,
    pub pool: Vec<Color>,
}

/// What the client renders: the three counters, the current round and the
/// "new high score" banner flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameStateSnapshot {
    pub phase: GamePhase,
    pub time_left: u32,
    pub score: u32,
    pub high_score: u32,
    pub round: Option<RoundSnapshot>,
    pub is_new_high_score: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum SelectionOutcome {
    Hit {
        points: u32,
        remaining_targets: u32,
        round_completed: bool,
    },
    Miss {
        penalty: u32,
    },
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum TickOutcome {
    Running { time_left: u32 },
    Ended {
        final_score: u32,
        high_score: u32,
        new_high_score: bool,
    },
    Ignored,
}
