use std::collections::HashMap;

use tracing::{debug, warn};

/// Fixed key under which the best score survives reloads.
pub const HIGH_SCORE_KEY: &str = "colorCompassHighScore";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// String key-value persistence port injected into a game session.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let mut entries = HashMap::new();
        entries.insert(key.to_string(), value.to_string());
        Self { entries }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Read the stored high score. A missing key, an unreadable store or a
/// value that is not a non-negative integer all yield 0.
pub fn load_high_score<S: KeyValueStore + ?Sized>(store: &S) -> u32 {
    match store.get(HIGH_SCORE_KEY) {
        Ok(Some(raw)) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring malformed stored high score: {:?}", raw);
            0
        }),
        Ok(None) => {
            debug!("No stored high score, starting from 0");
            0
        }
        Err(e) => {
            warn!("Could not read high score: {}", e);
            0
        }
    }
}

pub fn save_high_score<S: KeyValueStore + ?Sized>(
    store: &mut S,
    score: u32,
) -> Result<(), StoreError> {
    store.set(HIGH_SCORE_KEY, &score.to_string())
}
