use futures_util::{SinkExt, StreamExt};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::{error, info, warn};
use warp::ws::{Message, WebSocket};

use crate::AppState;
use crate::game_runner::{CompassRunner, WriteBehindStore};
use compass_core::GameSession;
use compass_types::{ClientMessage, GameError};

pub mod connection;
pub mod handlers;
pub mod rate_limiter;

use connection::ConnectionId;
pub use connection::ConnectionManager;
use handlers::MessageHandler;
use rate_limiter::RateLimiter;

pub async fn handle_connection(websocket: WebSocket, state: AppState) {
    let connection_id = ConnectionId::new();
    info!("New WebSocket connection: {}", connection_id);

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let connection_manager = state.connection_manager.clone();

    // Create connection and get receiver for outgoing messages
    let message_receiver = connection_manager.create_connection(connection_id).await;
    let Some(outbound) = connection_manager.outbound(connection_id).await else {
        error!("Connection {} vanished during setup", connection_id);
        return;
    };

    let store = WriteBehindStore::load(&state.key_values, state.writes.clone()).await;
    let session = GameSession::with_duration(
        store,
        StdRng::from_os_rng(),
        state.config.game_duration_seconds,
    );
    let runner = Arc::new(CompassRunner::new(session, outbound));

    let message_handler = MessageHandler::new(
        connection_id,
        connection_manager.clone(),
        state.backend.clone(),
        runner,
    );

    // Handle incoming messages
    let incoming_handler = {
        let message_handler = message_handler.clone();
        let mut rate_limiter = RateLimiter::per_second(state.config.click_rate_limit);

        async move {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(msg) => {
                        if let Err(e) =
                            handle_message(msg, &mut rate_limiter, &message_handler).await
                        {
                            error!("Error handling message for {}: {}", connection_id, e);
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("WebSocket error for {}: {}", connection_id, e);
                        break;
                    }
                }
            }
        }
    };

    // Handle outgoing messages
    let outgoing_handler = async move {
        let mut receiver = message_receiver;

        while let Some(message) = receiver.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize message: {:?}", e);
                    continue;
                }
            };

            if let Err(e) = ws_sender.send(Message::text(json)).await {
                warn!("Failed to send message to {}: {:?}", connection_id, e);
                break;
            }
        }
    };

    tokio::select! {
        _ = incoming_handler => {},
        _ = outgoing_handler => {},
    }

    info!("Connection {} disconnected", connection_id);
    message_handler.handle_disconnect().await;
    connection_manager.remove_connection(connection_id).await;
}

async fn handle_message(
    msg: Message,
    rate_limiter: &mut RateLimiter,
    message_handler: &MessageHandler,
) -> Result<(), String> {
    if msg.is_close() {
        return Err("Connection closed by client".to_string());
    }

    // Only handle text messages
    if !msg.is_text() {
        return Ok(());
    }

    let text = msg.to_str().map_err(|_| "Invalid text message")?;

    let client_message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Rejecting malformed message: {}", e);
            if let Some(color) = rejected_color(text) {
                return message_handler
                    .send_game_error(GameError::InvalidColor { color })
                    .await;
            }
            return message_handler
                .send_error(&format!("Invalid message: {}", e))
                .await;
        }
    };

    if matches!(client_message, ClientMessage::SelectColor { .. })
        && !rate_limiter.check_rate_limit()
    {
        return message_handler
            .send_game_error(GameError::RateLimitExceeded)
            .await;
    }

    message_handler.handle_message(client_message).await
}

/// The raw color of a `SelectColor` message whose color failed to parse.
fn rejected_color(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    value
        .get("SelectColor")?
        .get("color")?
        .as_str()
        .map(str::to_string)
}
