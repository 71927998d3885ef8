use compass_types::{Color, RoundSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    GameStarted {
        round: RoundSnapshot,
        at: String, // ISO 8601 string
    },
    ColorMatched {
        color: Color,
        score: u32,
        remaining_targets: u32,
    },
    ColorMissed {
        color: Color,
        score: u32,
    },
    RoundCompleted {
        number: u32,
        score: u32,
    },
    RoundStarted {
        round: RoundSnapshot,
    },
    GameEnded {
        final_score: u32,
        high_score: u32,
        new_high_score: bool,
        at: String,
    },
}

impl GameEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::GameStarted { .. } => "game_started",
            GameEvent::ColorMatched { .. } => "color_matched",
            GameEvent::ColorMissed { .. } => "color_missed",
            GameEvent::RoundCompleted { .. } => "round_completed",
            GameEvent::RoundStarted { .. } => "round_started",
            GameEvent::GameEnded { .. } => "game_ended",
        }
    }
}

/// Event handler trait for processing game events
pub trait GameEventHandler: Send {
    fn handle_event(&mut self, event: GameEvent);
}

/// Simple event bus for distributing game events
pub struct GameEventBus {
    handlers: Vec<Box<dyn GameEventHandler>>,
}

impl GameEventBus {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Box<dyn GameEventHandler>) {
        self.handlers.push(handler);
    }

    pub fn publish(&mut self, event: GameEvent) {
        for handler in &mut self.handlers {
            handler.handle_event(event.clone());
        }
    }
}

impl Default for GameEventBus {
    fn default() -> Self {
        Self::new()
    }
}
