//! WebSocket protocol messages for Tycoon multiplayer.

use serde::{Deserialize, Serialize};
use tycoon_core::{
    GameAction, GameEvent, LedgerAction, Player, PlayerId, Property, PropertyId, RoomSnapshot,
    TurnPhase,
};
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Create a new game room
    CreateGame {
        host_name: String,
        #[serde(default)]
        max_players: Option<u8>,
    },

    /// Join an existing room by code
    JoinGame { game_id: String, player_name: String },

    /// Start the game (host only)
    StartGame { game_id: String },

    /// Reattach this connection to an existing seat
    Rejoin { game_id: String, player_id: PlayerId },

    /// Leave the room
    LeaveGame { game_id: String, player_id: PlayerId },

    /// Destroy the room (host only)
    CloseGame { game_id: String },

    RollDice { game_id: String, player_id: PlayerId },

    BuyProperty {
        game_id: String,
        property_id: PropertyId,
        player_id: PlayerId,
    },

    SellProperty {
        game_id: String,
        property_id: PropertyId,
        player_id: PlayerId,
    },

    MortgageProperty {
        game_id: String,
        property_id: PropertyId,
        player_id: PlayerId,
    },

    UnmortgageProperty {
        game_id: String,
        property_id: PropertyId,
        player_id: PlayerId,
    },

    BuildHouse {
        game_id: String,
        property_id: PropertyId,
        player_id: PlayerId,
    },

    BuildHotel {
        game_id: String,
        property_id: PropertyId,
        player_id: PlayerId,
    },

    EndTurn { game_id: String, player_id: PlayerId },

    /// Request the list of joinable rooms
    ListGames,

    /// Ping for keepalive
    Ping,
}

impl ClientMessage {
    /// The room, acting player and engine action for in-game requests
    pub fn into_game_action(self) -> Option<(String, PlayerId, GameAction)> {
        let parts = match self {
            ClientMessage::RollDice { game_id, player_id } => {
                (game_id, player_id, GameAction::RollDice)
            }
            ClientMessage::EndTurn { game_id, player_id } => {
                (game_id, player_id, GameAction::EndTurn)
            }
            ClientMessage::BuyProperty {
                game_id,
                property_id,
                player_id,
            } => (game_id, player_id, GameAction::BuyProperty(property_id)),
            ClientMessage::SellProperty {
                game_id,
                property_id,
                player_id,
            } => (game_id, player_id, GameAction::SellProperty(property_id)),
            ClientMessage::MortgageProperty {
                game_id,
                property_id,
                player_id,
            } => (game_id, player_id, GameAction::MortgageProperty(property_id)),
            ClientMessage::UnmortgageProperty {
                game_id,
                property_id,
                player_id,
            } => (game_id, player_id, GameAction::UnmortgageProperty(property_id)),
            ClientMessage::BuildHouse {
                game_id,
                property_id,
                player_id,
            } => (game_id, player_id, GameAction::BuildHouse(property_id)),
            ClientMessage::BuildHotel {
                game_id,
                property_id,
                player_id,
            } => (game_id, player_id, GameAction::BuildHotel(property_id)),
            _ => return None,
        };
        Some(parts)
    }
}

/// Messages sent from server to client.
///
/// Every message that follows a committed mutation carries the room version,
/// either directly or inside `room`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with this connection's ID
    Welcome { connection_id: Uuid },

    /// Room created; sent to the host only
    GameCreated {
        game_id: String,
        player_id: PlayerId,
        room: RoomSnapshot,
    },

    /// Seat assigned; sent to the joining player only
    JoinedGame {
        game_id: String,
        player_id: PlayerId,
        room: RoomSnapshot,
    },

    /// A new player took a seat
    PlayerJoined { room: RoomSnapshot, new_player: Player },

    PlayerLeft { room: RoomSnapshot, player_id: PlayerId },

    PlayerRejoined { room: RoomSnapshot, player_id: PlayerId },

    PlayerDisconnected { room: RoomSnapshot, player_id: PlayerId },

    GameStarted { room: RoomSnapshot },

    /// A roll and everything it triggered
    MoveResolved {
        version: u64,
        events: Vec<GameEvent>,
        room: RoomSnapshot,
    },

    /// Players went bankrupt or were removed; the board is resent whole
    RoomSynced {
        version: u64,
        events: Vec<GameEvent>,
        room: RoomSnapshot,
    },

    /// A ledger action was applied
    PropertyUpdated {
        version: u64,
        action: LedgerAction,
        property: Property,
        player: Player,
    },

    /// The turn passed
    TurnUpdated {
        version: u64,
        current_player: usize,
        phase: TurnPhase,
        players: Vec<Player>,
    },

    /// Game finished
    GameOver {
        winner: PlayerId,
        winner_name: String,
    },

    /// The room no longer exists
    RoomClosed { game_id: String },

    /// List of joinable rooms
    GameList { games: Vec<RoomInfo> },

    /// Request rejected; sent to the originator only
    Error { code: String, message: String },

    /// Pong response
    Pong,
}

impl ServerMessage {
    pub fn error(err: &crate::error::RoomError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Room summary for the lobby list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: String,
    pub host_name: String,
    pub players: usize,
    pub max_players: u8,
    pub is_started: bool,
    pub created_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_format() {
        let player_id = Uuid::new_v4();
        let json = format!(
            r#"{{"type":"BuyProperty","payload":{{"game_id":"abc123","property_id":"boardwalk","player_id":"{}"}}}}"#,
            player_id
        );
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();

        let (game_id, player, action) = msg.into_game_action().unwrap();
        assert_eq!(game_id, "abc123");
        assert_eq!(player, player_id);
        assert_eq!(action, GameAction::BuyProperty("boardwalk".into()));
    }

    #[test]
    fn test_create_game_max_players_optional() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"CreateGame","payload":{"host_name":"Alice"}}"#)
                .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::CreateGame {
                max_players: None,
                ..
            }
        ));
    }

    #[test]
    fn test_unit_messages() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"Ping"}"#).unwrap();
        assert!(msg.into_game_action().is_none());

        let json = serde_json::to_string(&ServerMessage::Pong).unwrap();
        assert_eq!(json, r#"{"type":"Pong"}"#);
    }

    #[test]
    fn test_close_game_is_not_an_engine_action() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"CloseGame","payload":{"game_id":"abc123"}}"#)
                .unwrap();
        assert!(matches!(&msg, ClientMessage::CloseGame { game_id } if game_id == "abc123"));
        assert!(msg.into_game_action().is_none());
    }

    #[test]
    fn test_error_message_carries_code() {
        let err = crate::error::RoomError::RoomFull;
        let json = serde_json::to_value(ServerMessage::error(&err)).unwrap();
        assert_eq!(json["type"], "Error");
        assert_eq!(json["payload"]["code"], "RoomFull");
    }
}
