use compass_types::{Color, GamePhase, GameStateSnapshot, SelectionOutcome, TickOutcome};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::{
    GAME_DURATION_SECONDS, GameEvent, GameEventBus, GameEventHandler, KeyValueStore, Round,
    ScoringEngine, load_high_score, save_high_score,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub phase: GamePhase,
    pub time_left: u32,
    pub score: u32,
    pub high_score: u32,
    pub round: Option<Round>,
    pub duration: u32,
}

impl SessionState {
    pub fn new(high_score: u32) -> Self {
        Self::with_duration(high_score, GAME_DURATION_SECONDS)
    }

    pub fn with_duration(high_score: u32, duration: u32) -> Self {
        Self {
            phase: GamePhase::Ready,
            time_left: duration,
            score: 0,
            high_score,
            round: None,
            duration,
        }
    }

    pub fn is_new_high_score(&self) -> bool {
        self.phase == GamePhase::Ended
            && ScoringEngine::shows_new_high_score(self.score, self.high_score)
    }

    pub fn snapshot(&self) -> GameStateSnapshot {
        GameStateSnapshot {
            phase: self.phase,
            time_left: self.time_left,
            score: self.score,
            high_score: self.high_score,
            round: self.round.as_ref().map(Round::snapshot),
            is_new_high_score: self.is_new_high_score(),
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Start,
    Tick,
    Select(Color),
}

/// Work the host must carry out after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    PersistHighScore(u32),
    Emit(GameEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Started,
    Tick(TickOutcome),
    Selection(SelectionOutcome),
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: SessionState,
    pub effects: Vec<SessionEffect>,
    pub outcome: TransitionOutcome,
}

impl Transition {
    fn ignored(state: SessionState) -> Self {
        Self {
            state,
            effects: Vec::new(),
            outcome: TransitionOutcome::Ignored,
        }
    }
}

/// The session state machine.
///
/// Events that are not valid in the current phase leave the state untouched
/// and report [`TransitionOutcome::Ignored`].
pub fn transition<R: Rng + ?Sized>(
    state: SessionState,
    event: SessionEvent,
    rng: &mut R,
) -> Transition {
    match (state.phase, event) {
        (GamePhase::Ready | GamePhase::Ended, SessionEvent::Start) => start(state, rng),
        (GamePhase::Playing, SessionEvent::Tick) => tick(state),
        (GamePhase::Playing, SessionEvent::Select(color)) => select(state, color, rng),
        (phase, event) => {
            debug!("Ignoring {:?} while {}", event, phase);
            Transition::ignored(state)
        }
    }
}

fn start<R: Rng + ?Sized>(mut state: SessionState, rng: &mut R) -> Transition {
    let round = Round::generate(1, rng);
    let snapshot = round.snapshot();

    state.phase = GamePhase::Playing;
    state.score = 0;
    state.time_left = state.duration;
    state.round = Some(round);

    Transition {
        state,
        effects: vec![SessionEffect::Emit(GameEvent::GameStarted {
            round: snapshot,
            at: chrono::Utc::now().to_rfc3339(),
        })],
        outcome: TransitionOutcome::Started,
    }
}

fn tick(mut state: SessionState) -> Transition {
    state.time_left = state.time_left.saturating_sub(1);
    if state.time_left > 0 {
        let time_left = state.time_left;
        return Transition {
            state,
            effects: Vec::new(),
            outcome: TransitionOutcome::Tick(TickOutcome::Running { time_left }),
        };
    }
    end(state)
}

fn end(mut state: SessionState) -> Transition {
    let mut effects = Vec::new();

    state.phase = GamePhase::Ended;
    state.round = None;

    if ScoringEngine::beats_high_score(state.score, state.high_score) {
        state.high_score = state.score;
        effects.push(SessionEffect::PersistHighScore(state.score));
    }

    let new_high_score = state.is_new_high_score();
    effects.push(SessionEffect::Emit(GameEvent::GameEnded {
        final_score: state.score,
        high_score: state.high_score,
        new_high_score,
        at: chrono::Utc::now().to_rfc3339(),
    }));

    let outcome = TransitionOutcome::Tick(TickOutcome::Ended {
        final_score: state.score,
        high_score: state.high_score,
        new_high_score,
    });

    Transition {
        state,
        effects,
        outcome,
    }
}

fn select<R: Rng + ?Sized>(mut state: SessionState, color: Color, rng: &mut R) -> Transition {
    let Some(mut round) = state.round.take() else {
        return Transition::ignored(state);
    };

    if !round.take_target(&color) {
        let before = state.score;
        state.score = ScoringEngine::apply_miss(state.score);
        state.round = Some(round);
        let score = state.score;
        return Transition {
            state,
            effects: vec![SessionEffect::Emit(GameEvent::ColorMissed { color, score })],
            outcome: TransitionOutcome::Selection(SelectionOutcome::Miss {
                penalty: before - score,
            }),
        };
    }

    state.score = ScoringEngine::apply_hit(state.score);
    let remaining_targets = round.targets().len() as u32;
    let mut effects = vec![SessionEffect::Emit(GameEvent::ColorMatched {
        color,
        score: state.score,
        remaining_targets,
    })];

    let round_completed = round.is_complete();
    if round_completed {
        let next = Round::generate(round.number() + 1, rng);
        effects.push(SessionEffect::Emit(GameEvent::RoundCompleted {
            number: round.number(),
            score: state.score,
        }));
        effects.push(SessionEffect::Emit(GameEvent::RoundStarted {
            round: next.snapshot(),
        }));
        round = next;
    }
    state.round = Some(round);

    Transition {
        state,
        effects,
        outcome: TransitionOutcome::Selection(SelectionOutcome::Hit {
            points: crate::HIT_POINTS,
            remaining_targets,
            round_completed,
        }),
    }
}

/// Drives [`transition`] for a host: owns the state, the random source, the
/// persistence port and the event bus, and applies every effect.
pub struct GameSession<S, R> {
    state: SessionState,
    store: S,
    rng: R,
    event_bus: GameEventBus,
}

impl<S: KeyValueStore, R: Rng> GameSession<S, R> {
    pub fn new(store: S, rng: R) -> Self {
        Self::with_duration(store, rng, GAME_DURATION_SECONDS)
    }

    /// The stored high score is read once, here.
    pub fn with_duration(store: S, rng: R, duration: u32) -> Self {
        let high_score = load_high_score(&store);
        Self {
            state: SessionState::with_duration(high_score, duration),
            store,
            rng,
            event_bus: GameEventBus::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Box<dyn GameEventHandler>) {
        self.event_bus.add_handler(handler);
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> GamePhase {
        self.state.phase
    }

    pub fn snapshot(&self) -> GameStateSnapshot {
        self.state.snapshot()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns `false` when a game is already running.
    pub fn start(&mut self) -> bool {
        let started = self.apply(SessionEvent::Start) == TransitionOutcome::Started;
        if started {
            info!("Color Compass game started (high score {})", self.state.high_score);
        }
        started
    }

    pub fn tick(&mut self) -> TickOutcome {
        match self.apply(SessionEvent::Tick) {
            TransitionOutcome::Tick(outcome) => outcome,
            _ => TickOutcome::Ignored,
        }
    }

    pub fn select_color(&mut self, color: &Color) -> SelectionOutcome {
        match self.apply(SessionEvent::Select(color.clone())) {
            TransitionOutcome::Selection(outcome) => outcome,
            _ => SelectionOutcome::Ignored,
        }
    }

    fn apply(&mut self, event: SessionEvent) -> TransitionOutcome {
        let current = std::mem::take(&mut self.state);
        let Transition {
            state,
            effects,
            outcome,
        } = transition(current, event, &mut self.rng);
        self.state = state;

        for effect in effects {
            match effect {
                SessionEffect::PersistHighScore(score) => {
                    if let Err(e) = save_high_score(&mut self.store, score) {
                        warn!("High score {} not saved: {}", score, e);
                    }
                }
                SessionEffect::Emit(event) => self.event_bus.publish(event),
            }
        }

        outcome
    }
}
