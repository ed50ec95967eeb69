//! Synchronization layer.
//!
//! Attributes each request to the connection's bound room and seat, runs it
//! through the registry's commit path, and fans the result out to every
//! connection in the room while the room lock is still held.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tycoon_core::game::MAX_PLAYERS;
use tycoon_core::{GameAction, GameEvent, PlayerId};

use crate::config::ServerConfig;
use crate::error::RoomError;
use crate::protocol::{RoomInfo, ServerMessage};
use crate::registry::{Registry, RoomCode};
use crate::room::{ConnectionId, GameRoom};
use crate::store::RoomStore;

/// The room and seat a connection speaks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub room: RoomCode,
    pub player: PlayerId,
}

/// Server state shared across all connections.
pub struct ServerState {
    pub registry: Registry,
    pub config: ServerConfig,
    /// Mapping from connection ID to its message sender
    senders: DashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>,
    /// Mapping from connection ID to its seat
    bindings: DashMap<ConnectionId, Binding>,
}

enum Departure {
    /// The connection had already been replaced
    Stale,
    Left(Vec<GameEvent>),
    Disconnected(Vec<GameEvent>),
    Closed,
}

impl ServerState {
    pub fn new(config: ServerConfig, store: Arc<dyn RoomStore>) -> Self {
        Self {
            registry: Registry::new(store, config.retry_policy()),
            config,
            senders: DashMap::new(),
            bindings: DashMap::new(),
        }
    }

    pub fn register(&self, connection: ConnectionId, tx: mpsc::UnboundedSender<ServerMessage>) {
        self.senders.insert(connection, tx);
    }

    pub fn binding(&self, connection: ConnectionId) -> Option<Binding> {
        self.bindings.get(&connection).map(|b| b.clone())
    }

    /// Send a message to a specific connection.
    pub fn send_to(&self, connection: ConnectionId, msg: ServerMessage) {
        if let Some(sender) = self.senders.get(&connection) {
            // A closed receiver just means the client is gone
            let _ = sender.send(msg);
        }
    }

    /// Send a message to every connection in a room.
    fn broadcast(&self, room: &GameRoom, msg: ServerMessage) {
        for connection in room.members.values() {
            self.send_to(*connection, msg.clone());
        }
    }

    fn ensure_unbound(&self, connection: ConnectionId) -> Result<(), RoomError> {
        if self.bindings.contains_key(&connection) {
            return Err(RoomError::AlreadyInRoom);
        }
        Ok(())
    }

    /// Check that a request names the room and seat this connection holds
    pub fn authorize(
        &self,
        connection: ConnectionId,
        game_id: &str,
        player_id: Option<PlayerId>,
    ) -> Result<Binding, RoomError> {
        let binding = self.binding(connection).ok_or(RoomError::NotInRoom)?;
        let code: RoomCode = game_id.parse().map_err(|_| RoomError::NotAuthorized)?;
        if code != binding.room {
            return Err(RoomError::NotAuthorized);
        }
        if player_id.is_some_and(|p| p != binding.player) {
            return Err(RoomError::NotAuthorized);
        }
        Ok(binding)
    }

    // ==================== Lobby ====================

    pub async fn create_game(
        &self,
        connection: ConnectionId,
        host_name: String,
        max_players: Option<u8>,
    ) -> Result<(), RoomError> {
        self.ensure_unbound(connection)?;
        let max_players = max_players.unwrap_or(MAX_PLAYERS as u8);

        self.registry
            .create_room(host_name, max_players, |room, host_id| {
                room.members.insert(host_id, connection);
                self.bindings.insert(
                    connection,
                    Binding {
                        room: room.code.clone(),
                        player: host_id,
                    },
                );
                self.send_to(
                    connection,
                    ServerMessage::GameCreated {
                        game_id: room.code.to_string(),
                        player_id: host_id,
                        room: room.snapshot(),
                    },
                );
            })
            .await?;
        Ok(())
    }

    pub async fn join_game(
        &self,
        connection: ConnectionId,
        game_id: &str,
        player_name: String,
    ) -> Result<PlayerId, RoomError> {
        self.ensure_unbound(connection)?;
        let code: RoomCode = game_id.parse()?;
        let player_id = uuid::Uuid::new_v4();

        self.registry
            .transact(
                &code,
                |room| {
                    let player = room.add_player(player_id, player_name)?.clone();
                    room.members.insert(player_id, connection);
                    Ok(player)
                },
                |room, player| {
                    self.bindings.insert(
                        connection,
                        Binding {
                            room: code.clone(),
                            player: player_id,
                        },
                    );
                    let snapshot = room.snapshot();
                    self.send_to(
                        connection,
                        ServerMessage::JoinedGame {
                            game_id: code.to_string(),
                            player_id,
                            room: snapshot.clone(),
                        },
                    );
                    self.broadcast(
                        room,
                        ServerMessage::PlayerJoined {
                            room: snapshot,
                            new_player: player.clone(),
                        },
                    );
                },
            )
            .await?;

        info!(room = %code, player = %player_id, "Player joined");
        Ok(player_id)
    }

    pub async fn start_game(&self, connection: ConnectionId, game_id: &str) -> Result<(), RoomError> {
        let binding = self.authorize(connection, game_id, None)?;

        self.registry
            .transact(
                &binding.room,
                |room| room.start_game(binding.player),
                |room, _| {
                    self.broadcast(
                        room,
                        ServerMessage::GameStarted {
                            room: room.snapshot(),
                        },
                    );
                },
            )
            .await?;

        info!(room = %binding.room, "Game started");
        Ok(())
    }

    /// Reattach a connection to an existing seat
    pub async fn rejoin(
        &self,
        connection: ConnectionId,
        game_id: &str,
        player_id: PlayerId,
    ) -> Result<(), RoomError> {
        self.ensure_unbound(connection)?;
        let code: RoomCode = game_id.parse()?;

        self.registry
            .transact(
                &code,
                |room| {
                    let seat = room.game.get_player(player_id).ok_or(RoomError::NotInRoom)?;
                    if seat.connected {
                        return Err(RoomError::NotAuthorized);
                    }
                    let previous = room.members.insert(player_id, connection);
                    room.set_player_connected(player_id, true)?;
                    room.skip_disconnected()?;
                    Ok(previous)
                },
                |room, previous| {
                    if let Some(old) = previous.filter(|old| *old != connection) {
                        self.bindings.remove(&old);
                    }
                    self.bindings.insert(
                        connection,
                        Binding {
                            room: code.clone(),
                            player: player_id,
                        },
                    );
                    self.broadcast(
                        room,
                        ServerMessage::PlayerRejoined {
                            room: room.snapshot(),
                            player_id,
                        },
                    );
                },
            )
            .await?;

        info!(room = %code, player = %player_id, "Player rejoined");
        Ok(())
    }

    pub async fn leave_game(
        &self,
        connection: ConnectionId,
        game_id: &str,
        player_id: PlayerId,
    ) -> Result<(), RoomError> {
        let binding = self.authorize(connection, game_id, Some(player_id))?;
        self.depart(connection, binding, true).await
    }

    pub async fn list_games(&self) -> Vec<RoomInfo> {
        self.registry.list_rooms().await
    }

    // ==================== Game Actions ====================

    /// Apply an in-game action on behalf of the bound seat
    pub async fn act(
        &self,
        connection: ConnectionId,
        game_id: &str,
        player_id: PlayerId,
        action: GameAction,
    ) -> Result<(), RoomError> {
        let binding = self.authorize(connection, game_id, Some(player_id))?;
        let ledger = action.ledger().map(|(kind, property)| (kind, property.to_string()));
        let is_roll = action == GameAction::RollDice;

        let events = self
            .registry
            .transact(
                &binding.room,
                |room| room.apply_action(player_id, action),
                |room, events| {
                    let version = room.version;
                    let msg = if let Some((kind, property)) = &ledger {
                        let property = room.game.properties.get(property).cloned();
                        let player = room.game.get_player(player_id).cloned();
                        match (property, player) {
                            (Ok(property), Some(player)) => ServerMessage::PropertyUpdated {
                                version,
                                action: *kind,
                                property,
                                player,
                            },
                            _ => ServerMessage::MoveResolved {
                                version,
                                events: events.clone(),
                                room: room.snapshot(),
                            },
                        }
                    } else if is_roll {
                        ServerMessage::MoveResolved {
                            version,
                            events: events.clone(),
                            room: room.snapshot(),
                        }
                    } else if events.iter().any(releases_properties) {
                        ServerMessage::RoomSynced {
                            version,
                            events: events.clone(),
                            room: room.snapshot(),
                        }
                    } else {
                        ServerMessage::TurnUpdated {
                            version,
                            current_player: room.game.current_player,
                            phase: room.game.phase,
                            players: room.game.players.clone(),
                        }
                    };
                    self.broadcast(room, msg);
                    self.finish(room);
                },
            )
            .await?;

        debug!(room = %binding.room, player = %player_id, events = events.len(), "Action applied");
        Ok(())
    }

    /// Close the room on the host's request, in any phase
    pub async fn close_game(&self, connection: ConnectionId, game_id: &str) -> Result<(), RoomError> {
        let binding = self.authorize(connection, game_id, None)?;

        self.registry
            .transact(
                &binding.room,
                |room| {
                    if room.host_id != binding.player {
                        return Err(RoomError::NotAuthorized);
                    }
                    room.close();
                    Ok(())
                },
                |room, _| self.release_members(room),
            )
            .await?;

        info!(room = %binding.room, "Room closed by host");
        Ok(())
    }

    /// Announce a winner, then let go of a room that is being destroyed
    fn finish(&self, room: &mut GameRoom) {
        if let Some((winner, winner_name)) = room.get_winner() {
            info!(room = %room.code, winner = %winner, "Game over");
            self.broadcast(room, ServerMessage::GameOver { winner, winner_name });
        }
        if room.closed {
            self.release_members(room);
        }
    }

    /// Tell every member the room is gone and unbind their connections
    fn release_members(&self, room: &mut GameRoom) {
        let msg = ServerMessage::RoomClosed {
            game_id: room.code.to_string(),
        };
        for (_, member) in std::mem::take(&mut room.members) {
            self.bindings.remove(&member);
            self.send_to(member, msg.clone());
        }
    }

    // ==================== Departures ====================

    /// Drop a connection. Before the game starts this is a leave; after, the
    /// seat is kept and marked disconnected.
    pub async fn disconnect(&self, connection: ConnectionId) {
        self.senders.remove(&connection);
        let Some(binding) = self.binding(connection) else {
            return;
        };
        if let Err(e) = self.depart(connection, binding.clone(), false).await {
            warn!(room = %binding.room, player = %binding.player, error = %e, "Failed to handle disconnect");
        }
        self.bindings.remove(&connection);
    }

    async fn depart(
        &self,
        connection: ConnectionId,
        binding: Binding,
        leaving: bool,
    ) -> Result<(), RoomError> {
        let player_id = binding.player;

        let outcome = self
            .registry
            .transact(
                &binding.room,
                |room| {
                    if !leaving && room.members.get(&player_id) != Some(&connection) {
                        return Ok(Departure::Stale);
                    }
                    if !room.is_started() && player_id == room.host_id {
                        room.close();
                        return Ok(Departure::Closed);
                    }
                    if leaving || !room.is_started() {
                        return Ok(Departure::Left(room.remove_player(player_id)?));
                    }
                    room.members.remove(&player_id);
                    room.set_player_connected(player_id, false)?;
                    if room.members.is_empty() {
                        room.close();
                        return Ok(Departure::Closed);
                    }
                    Ok(Departure::Disconnected(room.skip_disconnected()?))
                },
                |room, outcome| {
                    // Notify the departing connection directly; it is no longer a member
                    let notify_self = |msg: ServerMessage| {
                        if leaving {
                            self.send_to(connection, msg);
                        }
                    };
                    match outcome {
                        Departure::Stale => {}
                        Departure::Closed => self.release_members(room),
                        Departure::Left(_) => {
                            let msg = ServerMessage::PlayerLeft {
                                room: room.snapshot(),
                                player_id,
                            };
                            self.broadcast(room, msg.clone());
                            notify_self(msg);
                            self.finish(room);
                        }
                        Departure::Disconnected(_) => {
                            self.broadcast(
                                room,
                                ServerMessage::PlayerDisconnected {
                                    room: room.snapshot(),
                                    player_id,
                                },
                            );
                            self.finish(room);
                        }
                    }
                },
            )
            .await?;

        if leaving {
            self.bindings.remove(&connection);
        }
        match outcome {
            Departure::Stale => {}
            Departure::Closed => info!(room = %binding.room, "Room closed"),
            Departure::Left(events) => {
                info!(room = %binding.room, player = %player_id, released = events.len(), "Player left")
            }
            Departure::Disconnected(events) => {
                info!(room = %binding.room, player = %player_id, skipped = events.len(), "Player disconnected")
            }
        }
        Ok(())
    }
}

/// Events after which per-property deltas no longer describe the board
fn releases_properties(event: &GameEvent) -> bool {
    matches!(
        event,
        GameEvent::PlayerBankrupt { .. } | GameEvent::PlayerRemoved { .. }
    )
}
