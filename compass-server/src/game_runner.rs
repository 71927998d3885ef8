use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use compass_core::{
    GameEvent, GameEventHandler, GameSession, HIGH_SCORE_KEY, KeyValueStore, StoreError,
};
use compass_persistence::repositories::KeyValueRepository;
use compass_types::{Color, GamePhase, GameStateSnapshot, SelectionOutcome, ServerMessage, TickOutcome};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

pub type CompassSession = GameSession<WriteBehindStore, StdRng>;
pub type CompassRunner = GameRunner<WriteBehindStore, StdRng>;

/// A pending write for the persister task.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub key: String,
    pub value: String,
}

pub type WriteSender = mpsc::UnboundedSender<WriteRequest>;

/// Drains write requests into the `key_value` table. Failures are logged
/// and dropped; the game never waits on the database.
pub fn spawn_persister(repository: KeyValueRepository) -> (WriteSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<WriteRequest>();
    let handle = tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            match repository.set(&request.key, &request.value).await {
                Ok(()) => debug!("Persisted {} = {}", request.key, request.value),
                Err(e) => warn!("Failed to persist {}: {}", request.key, e),
            }
        }
        debug!("Persister stopped");
    });
    (tx, handle)
}

/// Synchronous store over an in-memory cache; writes are forwarded to the
/// persister task.
#[derive(Debug, Clone)]
pub struct WriteBehindStore {
    cache: HashMap<String, String>,
    writes: WriteSender,
}

impl WriteBehindStore {
    pub fn new(writes: WriteSender) -> Self {
        Self {
            cache: HashMap::new(),
            writes,
        }
    }

    /// Seed the cache with the persisted high score. A failed read leaves
    /// the cache empty.
    pub async fn load(repository: &KeyValueRepository, writes: WriteSender) -> Self {
        let mut store = Self::new(writes);
        match repository.get(HIGH_SCORE_KEY).await {
            Ok(Some(value)) => {
                store.cache.insert(HIGH_SCORE_KEY.to_string(), value);
            }
            Ok(None) => {}
            Err(e) => warn!("Could not load stored high score: {}", e),
        }
        store
    }
}

impl KeyValueStore for WriteBehindStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.cache.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.cache.insert(key.to_string(), value.to_string());
        self.writes
            .send(WriteRequest {
                key: key.to_string(),
                value: value.to_string(),
            })
            .map_err(|_| StoreError::Unavailable("persister stopped".to_string()))
    }
}

/// Forwards round and end-of-game events to the connection.
pub struct ChannelForwarder {
    outbound: mpsc::UnboundedSender<ServerMessage>,
}

impl ChannelForwarder {
    pub fn new(outbound: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { outbound }
    }
}

impl GameEventHandler for ChannelForwarder {
    fn handle_event(&mut self, event: GameEvent) {
        let message = match event {
            GameEvent::GameStarted { round, .. } | GameEvent::RoundStarted { round } => {
                ServerMessage::RoundStarted { round }
            }
            GameEvent::GameEnded {
                final_score,
                high_score,
                new_high_score,
                ..
            } => ServerMessage::GameOver {
                final_score,
                high_score,
                new_high_score,
            },
            _ => return,
        };
        if self.outbound.send(message).is_err() {
            debug!("Dropping game event, connection closed");
        }
    }
}

/// The running tick task. Dropping the handle stops the task.
#[derive(Debug)]
pub struct TickHandle {
    handle: JoinHandle<()>,
}

impl TickHandle {
    fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Hosts one game session for one connection and drives its clock.
pub struct GameRunner<S, R> {
    session: Arc<Mutex<GameSession<S, R>>>,
    ticker: Mutex<Option<TickHandle>>,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    tick_interval: Duration,
}

impl<S, R> GameRunner<S, R>
where
    S: KeyValueStore + Send + 'static,
    R: Rng + Send + 'static,
{
    pub fn new(mut session: GameSession<S, R>, outbound: mpsc::UnboundedSender<ServerMessage>) -> Self {
        session.add_handler(Box::new(ChannelForwarder::new(outbound.clone())));
        Self {
            session: Arc::new(Mutex::new(session)),
            ticker: Mutex::new(None),
            outbound,
            tick_interval: TICK_INTERVAL,
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub async fn snapshot(&self) -> GameStateSnapshot {
        self.session.lock().await.snapshot()
    }

    pub async fn phase(&self) -> GamePhase {
        self.session.lock().await.phase()
    }

    /// Start a game and its clock. Returns `false` if one is already running.
    pub async fn start(&self) -> bool {
        let mut ticker = self.ticker.lock().await;

        let snapshot = {
            let mut session = self.session.lock().await;
            if !session.start() {
                return false;
            }
            session.snapshot()
        };

        if let Some(previous) = ticker.take() {
            previous.cancel();
        }
        self.send(ServerMessage::GameStateUpdate { state: snapshot });
        *ticker = Some(self.spawn_ticker());
        true
    }

    pub async fn select_color(&self, color: &Color) -> SelectionOutcome {
        let (outcome, score) = {
            let mut session = self.session.lock().await;
            let outcome = session.select_color(color);
            (outcome, session.state().score)
        };

        if outcome != SelectionOutcome::Ignored {
            self.send(ServerMessage::SelectionResult {
                outcome: outcome.clone(),
                score,
            });
        }
        outcome
    }

    /// Stop the clock without touching the session state.
    pub async fn stop(&self) {
        if let Some(ticker) = self.ticker.lock().await.take() {
            ticker.cancel();
        }
    }

    fn spawn_ticker(&self) -> TickHandle {
        let session = self.session.clone();
        let outbound = self.outbound.clone();
        let interval = self.tick_interval;

        TickHandle::new(tokio::spawn(async move {
            loop {
                // Reschedule after each tick rather than keeping a fixed cadence
                tokio::time::sleep(interval).await;

                let outcome = session.lock().await.tick();
                match outcome {
                    TickOutcome::Running { time_left } => {
                        if outbound.send(ServerMessage::TimeUpdate { time_left }).is_err() {
                            break;
                        }
                    }
                    TickOutcome::Ended { final_score, .. } => {
                        let _ = outbound.send(ServerMessage::TimeUpdate { time_left: 0 });
                        info!("Color Compass game ended with score {}", final_score);
                        break;
                    }
                    TickOutcome::Ignored => break,
                }
            }
        }))
    }

    fn send(&self, message: ServerMessage) {
        if self.outbound.send(message).is_err() {
            debug!("Outbound channel closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_core::MemoryStore;
    use compass_persistence::connection::connect_to_memory_database;
    use migration::{Migrator, MigratorTrait};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_write_behind_store_forwards_writes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut store = WriteBehindStore::new(tx);

        store.set(HIGH_SCORE_KEY, "40").unwrap();
        assert_eq!(store.get(HIGH_SCORE_KEY).unwrap(), Some("40".to_string()));
        assert_eq!(
            rx.try_recv().unwrap(),
            WriteRequest {
                key: HIGH_SCORE_KEY.to_string(),
                value: "40".to_string()
            }
        );
    }

    #[test]
    fn test_write_behind_store_reports_stopped_persister() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut store = WriteBehindStore::new(tx);
        assert!(matches!(
            store.set(HIGH_SCORE_KEY, "1"),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_persister_round_trip() {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        let repository = KeyValueRepository::new(db);

        let (tx, handle) = spawn_persister(repository.clone());
        let mut store = WriteBehindStore::load(&repository, tx.clone()).await;
        assert_eq!(store.get(HIGH_SCORE_KEY).unwrap(), None);

        store.set(HIGH_SCORE_KEY, "70").unwrap();
        drop(store);
        drop(tx);
        handle.await.unwrap();

        let reloaded = WriteBehindStore::load(&repository, spawn_persister(repository.clone()).0).await;
        assert_eq!(reloaded.get(HIGH_SCORE_KEY).unwrap(), Some("70".to_string()));
    }

    #[tokio::test]
    async fn test_forwarder_maps_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut forwarder = ChannelForwarder::new(tx);

        forwarder.handle_event(GameEvent::RoundCompleted { number: 1, score: 40 });
        assert!(rx.try_recv().is_err());

        forwarder.handle_event(GameEvent::GameEnded {
            final_score: 40,
            high_score: 40,
            new_high_score: true,
            at: chrono::Utc::now().to_rfc3339(),
        });
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerMessage::GameOver { final_score: 40, new_high_score: true, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_rejected_while_playing() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = GameSession::new(MemoryStore::new(), ChaCha8Rng::seed_from_u64(1));
        let runner = GameRunner::new(session, tx);

        assert!(runner.start().await);
        assert!(!runner.start().await);
        assert_eq!(runner.phase().await, GamePhase::Playing);
        runner.stop().await;
    }
}
