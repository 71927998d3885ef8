#![allow(dead_code)]

use compass_core::{
    GameEvent, GameEventHandler, GameSession, HIGH_SCORE_KEY, KeyValueStore, MemoryStore,
    StoreError,
};
use compass_types::Color;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex};

pub type TestSession = GameSession<MemoryStore, ChaCha8Rng>;

/// Seeded RNG so every run draws the same colors
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Creates a session with no stored high score
pub fn create_session() -> TestSession {
    GameSession::new(MemoryStore::new(), seeded_rng(7))
}

/// Creates a session whose store already holds `high_score`
pub fn create_session_with_high_score(high_score: u32) -> TestSession {
    let store = MemoryStore::with_entry(HIGH_SCORE_KEY, &high_score.to_string());
    GameSession::new(store, seeded_rng(7))
}

pub fn current_targets<S: KeyValueStore>(session: &GameSession<S, ChaCha8Rng>) -> Vec<Color> {
    session
        .state()
        .round
        .as_ref()
        .map(|round| round.targets().to_vec())
        .unwrap_or_default()
}

pub fn current_pool<S: KeyValueStore>(session: &GameSession<S, ChaCha8Rng>) -> Vec<Color> {
    session
        .state()
        .round
        .as_ref()
        .map(|round| round.pool().to_vec())
        .unwrap_or_default()
}

/// A pool color that is not a live target
pub fn find_decoy<S: KeyValueStore>(session: &GameSession<S, ChaCha8Rng>) -> Color {
    let targets = current_targets(session);
    current_pool(session)
        .into_iter()
        .find(|color| !targets.contains(color))
        .expect("pool always holds fillers")
}

/// Earn `points` (a multiple of 10) by clicking targets
pub fn score_points<S: KeyValueStore>(session: &mut GameSession<S, ChaCha8Rng>, points: u32) {
    for _ in 0..points / 10 {
        let target = current_targets(session)[0].clone();
        session.select_color(&target);
    }
}

pub fn run_clock<S: KeyValueStore>(session: &mut GameSession<S, ChaCha8Rng>, ticks: u32) {
    for _ in 0..ticks {
        session.tick();
    }
}

/// Store that refuses every read and write
pub struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("storage disabled".to_string()))
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("storage disabled".to_string()))
    }
}

/// Event collector for testing event emissions
#[derive(Clone)]
pub struct EventCollector {
    events: Arc<Mutex<Vec<GameEvent>>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn get_events(&self) -> Vec<GameEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn has_event_type(&self, check_fn: impl Fn(&GameEvent) -> bool) -> bool {
        self.events.lock().unwrap().iter().any(check_fn)
    }
}

impl GameEventHandler for EventCollector {
    fn handle_event(&mut self, event: GameEvent) {
        self.events.lock().unwrap().push(event);
    }
}
