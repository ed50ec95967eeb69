//! Persisted and broadcast form of a room.
//!
//! One JSON document per room. Field names are camelCase on disk and on the
//! wire so a browser client can read them directly.

use crate::board::{PlayerId, Property};
use crate::cards::Card;
use crate::game::{GameState, MAX_PLAYERS};
use crate::ledger::Ledger;
use crate::player::Player;
use crate::turn::TurnPhase;
use serde::{Deserialize, Serialize};

fn default_max_players() -> u8 {
    MAX_PLAYERS as u8
}

/// Full state of one room at a given version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    /// Room code
    pub id: String,
    pub players: Vec<Player>,
    pub properties: Vec<Property>,
    pub is_started: bool,
    #[serde(default = "default_max_players")]
    pub max_players: u8,
    pub current_player: usize,
    /// Unix millis
    pub created_at: u64,
    pub host_id: PlayerId,
    pub phase: TurnPhase,
    /// Bumped once per committed mutation
    pub version: u64,
    #[serde(default)]
    pub turn_actions: Vec<String>,
    #[serde(default)]
    pub dice: Option<(u8, u8)>,
    #[serde(default)]
    pub last_card: Option<Card>,
}

/// Room metadata that lives outside the game engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMeta {
    pub id: String,
    pub host_id: PlayerId,
    pub max_players: u8,
    pub created_at: u64,
    pub version: u64,
}

impl RoomSnapshot {
    /// Capture a game under the given room metadata
    pub fn capture(meta: &RoomMeta, game: &GameState) -> Self {
        Self {
            id: meta.id.clone(),
            players: game.players.clone(),
            properties: game.properties.properties().to_vec(),
            is_started: game.is_started(),
            max_players: meta.max_players,
            current_player: game.current_player,
            created_at: meta.created_at,
            host_id: meta.host_id,
            phase: game.phase,
            version: meta.version,
            turn_actions: game.turn_actions.clone(),
            dice: game.dice_roll,
            last_card: game.last_card.clone(),
        }
    }

    /// Split back into metadata and a game engine
    pub fn restore(self) -> (RoomMeta, GameState) {
        let meta = RoomMeta {
            id: self.id,
            host_id: self.host_id,
            max_players: self.max_players,
            created_at: self.created_at,
            version: self.version,
        };
        let game = GameState {
            players: self.players,
            properties: Ledger::from_properties(self.properties),
            current_player: self.current_player,
            phase: self.phase,
            dice_roll: self.dice,
            turn_actions: self.turn_actions,
            last_card: self.last_card,
        };
        (meta, game)
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn property(&self, id: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.id == id)
    }

    /// ID of the player whose turn it is, once started
    pub fn current_player_id(&self) -> Option<PlayerId> {
        if !self.is_started {
            return None;
        }
        self.players.get(self.current_player).map(|p| p.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn meta(host: PlayerId) -> RoomMeta {
        RoomMeta {
            id: "ABC123".into(),
            host_id: host,
            max_players: 3,
            created_at: 1_700_000_000_000,
            version: 7,
        }
    }

    #[test]
    fn test_capture_then_restore() {
        let host = Uuid::new_v4();
        let mut game = GameState::new();
        game.add_player(host, "Alice".into(), true).unwrap();
        game.add_player(Uuid::new_v4(), "Bob".into(), false).unwrap();
        game.start().unwrap();

        let snapshot = RoomSnapshot::capture(&meta(host), &game);
        assert!(snapshot.is_started);
        assert_eq!(snapshot.current_player_id(), Some(host));

        let (restored_meta, restored) = snapshot.restore();
        assert_eq!(restored_meta, meta(host));
        assert_eq!(restored, game);
    }

    #[test]
    fn test_json_uses_camel_case() {
        let host = Uuid::new_v4();
        let mut game = GameState::new();
        game.add_player(host, "Alice".into(), true).unwrap();
        let json = serde_json::to_value(RoomSnapshot::capture(&meta(host), &game)).unwrap();

        for key in [
            "id",
            "players",
            "properties",
            "isStarted",
            "maxPlayers",
            "currentPlayer",
            "createdAt",
            "hostId",
            "phase",
            "version",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_max_players_defaults_to_four() {
        let host = Uuid::new_v4();
        let game = GameState::new();
        let mut json = serde_json::to_value(RoomSnapshot::capture(&meta(host), &game)).unwrap();
        json.as_object_mut().unwrap().remove("maxPlayers");

        let snapshot: RoomSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(snapshot.max_players, 4);
    }
}
