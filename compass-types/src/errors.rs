use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Serialize, Deserialize, TS, thiserror::Error)]
#[ts(export)]
pub enum GameError {
    #[error("Invalid color: {color}")]
    InvalidColor { color: String },
    #[error("Not allowed while the game is {current_state}")]
    InvalidGameState { current_state: String },
    #[error("Too many clicks, slow down")]
    RateLimitExceeded,
    #[error("Authentication required")]
    AuthenticationRequired,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, thiserror::Error)]
#[ts(export)]
pub enum ConnectionError {
    #[error("Invalid token")]
    InvalidToken,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorParseError {
    #[error("color must start with '#': {0}")]
    MissingHash(String),
    #[error("color must have exactly 6 hex digits: {0}")]
    InvalidLength(String),
    #[error("color contains a non-hex digit: {0}")]
    InvalidDigit(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role tag: {0}")]
pub struct RoleParseError(pub String);
