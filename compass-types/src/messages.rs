use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{Color, GameStateSnapshot, Identity, RoleTag, RoundSnapshot, SelectionOutcome};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ClientMessage {
    Authenticate { token: String },
    StartGame,
    SelectColor { color: Color },
    Heartbeat,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ServerMessage {
    AuthenticationSuccess { identity: Identity, effective_role: RoleTag },
    AuthenticationFailed { reason: String },
    GameStateUpdate { state: GameStateSnapshot },
    TimeUpdate { time_left: u32 },
    SelectionResult { outcome: SelectionOutcome, score: u32 },
    RoundStarted { round: RoundSnapshot },
    GameOver { final_score: u32, high_score: u32, new_high_score: bool },
    Error { message: String },
}

/// One tile of the partner vault landing page.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VaultSection {
    pub title: String,
    pub description: String,
}
