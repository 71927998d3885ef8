use compass_types::{Color, RoundSnapshot};
use rand::Rng;

use crate::color_pool::{TARGET_COUNT, generate_color, generate_pool};

/// One generation of targets and pool.
///
/// The pool order is fixed when the round is generated; matching a color only
/// removes it from `targets`.
#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    number: u32,
    targets: Vec<Color>,
    pool: Vec<Color>,
}

impl Round {
    /// Draw four distinct targets and a pool around them.
    pub fn generate<R: Rng + ?Sized>(number: u32, rng: &mut R) -> Self {
        let mut targets = Vec::with_capacity(TARGET_COUNT);
        while targets.len() < TARGET_COUNT {
            let color = generate_color(rng);
            if !targets.contains(&color) {
                targets.push(color);
            }
        }
        let pool = generate_pool(rng, &targets);

        Self {
            number,
            targets,
            pool,
        }
    }

    /// Assemble a round from known colors.
    pub fn from_parts(number: u32, targets: Vec<Color>, pool: Vec<Color>) -> Self {
        Self {
            number,
            targets,
            pool,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn targets(&self) -> &[Color] {
        &self.targets
    }

    pub fn pool(&self) -> &[Color] {
        &self.pool
    }

    pub fn is_target(&self, color: &Color) -> bool {
        self.targets.contains(color)
    }

    pub fn in_pool(&self, color: &Color) -> bool {
        self.pool.contains(color)
    }

    /// Remove a single occurrence of `color` from the targets.
    pub fn take_target(&mut self, color: &Color) -> bool {
        match self.targets.iter().position(|t| t == color) {
            Some(index) => {
                self.targets.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            number: self.number,
            targets: self.targets.clone(),
            pool: self.pool.clone(),
        }
    }
}
