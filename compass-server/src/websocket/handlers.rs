use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::IdentityBackend;
use crate::game_runner::CompassRunner;
use crate::session::SessionResolver;
use crate::websocket::connection::{ConnectionId, ConnectionManager};
use compass_types::{
    ClientMessage, Color, ConnectionError, GameError, SelectionOutcome, ServerMessage,
};

#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    connection_manager: Arc<ConnectionManager>,
    backend: Arc<dyn IdentityBackend>,
    runner: Arc<CompassRunner>,
}

impl MessageHandler {
    pub fn new(
        connection_id: ConnectionId,
        connection_manager: Arc<ConnectionManager>,
        backend: Arc<dyn IdentityBackend>,
        runner: Arc<CompassRunner>,
    ) -> Self {
        Self {
            connection_id,
            connection_manager,
            backend,
            runner,
        }
    }

    pub async fn handle_message(&self, message: ClientMessage) -> Result<(), String> {
        self.connection_manager
            .update_activity(self.connection_id)
            .await;

        match message {
            ClientMessage::Authenticate { token } => self.handle_authenticate(token).await,
            ClientMessage::StartGame => self.handle_start_game().await,
            ClientMessage::SelectColor { color } => self.handle_select_color(color).await,
            ClientMessage::Heartbeat => self.handle_heartbeat().await,
        }
    }

    pub async fn handle_disconnect(&self) {
        info!("Handling disconnect for connection {}", self.connection_id);
        self.runner.stop().await;
    }

    async fn handle_authenticate(&self, token: String) -> Result<(), String> {
        info!("Authenticating connection {}", self.connection_id);

        let resolver = SessionResolver::new(self.backend.clone(), Some(token));
        match resolver.resolve().await {
            Some(session) => {
                let effective_role = session.effective_role();
                self.connection_manager
                    .authenticate_connection(
                        self.connection_id,
                        session.identity.clone(),
                        effective_role,
                    )
                    .await?;
                self.send_message(ServerMessage::AuthenticationSuccess {
                    identity: session.identity,
                    effective_role,
                })
                .await?;
                self.send_message(ServerMessage::GameStateUpdate {
                    state: self.runner.snapshot().await,
                })
                .await
            }
            None => {
                warn!("Authentication failed for connection {}", self.connection_id);
                self.send_message(ServerMessage::AuthenticationFailed {
                    reason: ConnectionError::InvalidToken.to_string(),
                })
                .await
            }
        }
    }

    async fn handle_start_game(&self) -> Result<(), String> {
        if !self.is_authenticated().await {
            return self.send_game_error(GameError::AuthenticationRequired).await;
        }

        if self.runner.start().await {
            info!("Connection {} started a game", self.connection_id);
            Ok(())
        } else {
            let phase = self.runner.phase().await;
            self.send_game_error(GameError::InvalidGameState {
                current_state: phase.to_string(),
            })
            .await
        }
    }

    async fn handle_select_color(&self, color: Color) -> Result<(), String> {
        if !self.is_authenticated().await {
            return self.send_game_error(GameError::AuthenticationRequired).await;
        }

        match self.runner.select_color(&color).await {
            // Only a game that is not running ignores a click
            SelectionOutcome::Ignored => {
                let phase = self.runner.phase().await;
                self.send_game_error(GameError::InvalidGameState {
                    current_state: phase.to_string(),
                })
                .await
            }
            // The runner already reported the outcome
            _ => Ok(()),
        }
    }

    async fn handle_heartbeat(&self) -> Result<(), String> {
        // Heartbeat just updates activity (already done in handle_message)
        Ok(())
    }

    async fn is_authenticated(&self) -> bool {
        self.connection_manager
            .get_connection(self.connection_id)
            .await
            .is_some_and(|conn| conn.is_authenticated())
    }

    async fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.connection_manager
            .send_to_connection(self.connection_id, message)
            .await
    }

    pub async fn send_game_error(&self, error: GameError) -> Result<(), String> {
        self.send_error(&error.to_string()).await
    }

    pub async fn send_error(&self, error_message: &str) -> Result<(), String> {
        self.send_message(ServerMessage::Error {
            message: error_message.to_string(),
        })
        .await
    }
}
