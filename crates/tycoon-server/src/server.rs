//! WebSocket server and connection handling.

use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::RoomError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::room::ConnectionId;
use crate::sync::ServerState;

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Tycoon server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let connection_id = Uuid::new_v4();

    // Create channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.register(connection_id, tx);

    let welcome = ServerMessage::Welcome { connection_id };
    let msg_text = serde_json::to_string(&welcome)?;
    ws_sender.send(Message::Text(msg_text)).await?;

    // Spawn task to forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Failed to encode outgoing message: {}", e),
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_message(connection_id, client_msg, &state).await,
                Err(e) => {
                    warn!("Invalid message from {}: {}", connection_id, e);
                    state.send_to(
                        connection_id,
                        ServerMessage::Error {
                            code: "InvalidMessage".into(),
                            message: e.to_string(),
                        },
                    );
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", connection_id);
                break;
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", connection_id, e);
                break;
            }
            _ => {}
        }
    }

    // Clean up on disconnect
    state.disconnect(connection_id).await;
    send_task.abort();

    info!("Connection closed for {}", connection_id);
    Ok(())
}

/// Handle a client message.
async fn handle_message(connection: ConnectionId, msg: ClientMessage, state: &Arc<ServerState>) {
    match msg {
        ClientMessage::CreateGame {
            host_name,
            max_players,
        } => {
            let state_ = Arc::clone(state);
            reply_within(state, connection, async move {
                state_.create_game(connection, host_name, max_players).await
            })
            .await;
        }

        ClientMessage::JoinGame {
            game_id,
            player_name,
        } => {
            let state_ = Arc::clone(state);
            reply_within(state, connection, async move {
                state_
                    .join_game(connection, &game_id, player_name)
                    .await
                    .map(|_| ())
            })
            .await;
        }

        ClientMessage::StartGame { game_id } => {
            let state_ = Arc::clone(state);
            reply_within(state, connection, async move {
                state_.start_game(connection, &game_id).await
            })
            .await;
        }

        ClientMessage::Rejoin { game_id, player_id } => {
            let state_ = Arc::clone(state);
            reply_within(state, connection, async move {
                state_.rejoin(connection, &game_id, player_id).await
            })
            .await;
        }

        ClientMessage::LeaveGame { game_id, player_id } => {
            if let Err(e) = state.leave_game(connection, &game_id, player_id).await {
                state.send_to(connection, ServerMessage::error(&e));
            }
        }

        ClientMessage::CloseGame { game_id } => {
            if let Err(e) = state.close_game(connection, &game_id).await {
                state.send_to(connection, ServerMessage::error(&e));
            }
        }

        ClientMessage::ListGames => {
            let games = state.list_games().await;
            state.send_to(connection, ServerMessage::GameList { games });
        }

        ClientMessage::Ping => {
            state.send_to(connection, ServerMessage::Pong);
        }

        other => {
            if let Some((game_id, player_id, action)) = other.into_game_action() {
                if let Err(e) = state.act(connection, &game_id, player_id, action).await {
                    state.send_to(connection, ServerMessage::error(&e));
                }
            }
        }
    }
}

/// Run a lobby request on its own task and answer within the reply timeout.
///
/// On timeout the client gets an error but the task keeps running, so a
/// commit that lands late still reaches the room as a normal broadcast.
async fn reply_within<Fut>(state: &Arc<ServerState>, connection: ConnectionId, request: Fut)
where
    Fut: Future<Output = Result<(), RoomError>> + Send + 'static,
{
    let handle = tokio::spawn(request);
    let err = match tokio::time::timeout(state.config.reply_timeout, handle).await {
        Ok(Ok(Ok(()))) => return,
        Ok(Ok(Err(e))) => e,
        Ok(Err(e)) => {
            error!("Request task for {} failed: {}", connection, e);
            RoomError::Internal
        }
        Err(_) => {
            warn!("Request from {} timed out", connection);
            RoomError::Timeout
        }
    };
    state.send_to(connection, ServerMessage::error(&err));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn state(reply_timeout: Duration) -> (Arc<ServerState>, mpsc::UnboundedReceiver<ServerMessage>, ConnectionId) {
        let config = ServerConfig {
            reply_timeout,
            ..ServerConfig::default()
        };
        let state = Arc::new(ServerState::new(config, Arc::new(MemoryStore::new())));
        let connection = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        state.register(connection, tx);
        (state, rx, connection)
    }

    #[tokio::test]
    async fn test_slow_request_times_out_without_cancelling() {
        let (state, mut rx, connection) = state(Duration::from_millis(10));
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();

        reply_within(&state, connection, async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = done_tx.send(());
            Ok(())
        })
        .await;

        match rx.recv().await {
            Some(ServerMessage::Error { code, .. }) => assert_eq!(code, "Timeout"),
            other => panic!("expected timeout error, got {:?}", other),
        }
        // The request still finishes in the background
        assert!(done_rx.await.is_ok());
    }

    #[tokio::test]
    async fn test_lobby_errors_reach_the_originator() {
        let (state, mut rx, connection) = state(Duration::from_secs(5));

        handle_message(
            connection,
            ClientMessage::JoinGame {
                game_id: "nope".into(),
                player_name: "Bob".into(),
            },
            &state,
        )
        .await;

        match rx.recv().await {
            Some(ServerMessage::Error { code, .. }) => assert_eq!(code, "RoomNotFound"),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let (state, mut rx, connection) = state(Duration::from_secs(5));

        handle_message(
            connection,
            ClientMessage::CreateGame {
                host_name: "Alice".into(),
                max_players: None,
            },
            &state,
        )
        .await;
        let game_id = match rx.recv().await {
            Some(ServerMessage::GameCreated { game_id, room, .. }) => {
                assert_eq!(room.version, 1);
                game_id
            }
            other => panic!("expected GameCreated, got {:?}", other),
        };

        handle_message(connection, ClientMessage::ListGames, &state).await;
        match rx.recv().await {
            Some(ServerMessage::GameList { games }) => {
                assert_eq!(games.len(), 1);
                assert_eq!(games[0].id, game_id);
                assert_eq!(games[0].host_name, "Alice");
            }
            other => panic!("expected GameList, got {:?}", other),
        }
    }
}
