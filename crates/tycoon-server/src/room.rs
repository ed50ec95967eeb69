//! Game room management.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tycoon_core::game::{MAX_PLAYERS, MIN_PLAYERS};
use tycoon_core::{
    GameAction, GameError, GameEvent, GameState, Player, PlayerId, RoomMeta, RoomSnapshot,
};
use uuid::Uuid;

use crate::error::RoomError;
use crate::protocol::RoomInfo;
use crate::registry::RoomCode;

/// One WebSocket connection
pub type ConnectionId = Uuid;

/// A game room: the engine plus room metadata and live connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRoom {
    pub code: RoomCode,
    pub host_id: PlayerId,
    pub max_players: u8,
    /// Unix millis
    pub created_at: u64,
    /// Bumped once per committed mutation
    pub version: u64,
    pub game: GameState,
    /// Live connection per seat; not persisted
    pub members: HashMap<PlayerId, ConnectionId>,
    /// Set when the room is destroyed, for tasks still holding it
    pub closed: bool,
}

impl GameRoom {
    pub fn new(code: RoomCode, host_id: PlayerId, host_name: String, max_players: u8) -> Self {
        let game = GameState::with_host(host_id, host_name);

        Self {
            code,
            host_id,
            max_players: max_players.clamp(MIN_PLAYERS as u8, MAX_PLAYERS as u8),
            created_at: now_millis(),
            version: 0,
            game,
            members: HashMap::new(),
            closed: false,
        }
    }

    pub fn player_count(&self) -> usize {
        self.game.player_count()
    }

    pub fn is_full(&self) -> bool {
        self.player_count() >= self.max_players as usize
    }

    pub fn is_started(&self) -> bool {
        self.game.is_started()
    }

    pub fn has_player(&self, player_id: PlayerId) -> bool {
        self.game.get_player(player_id).is_some()
    }

    pub fn add_player(&mut self, player_id: PlayerId, name: String) -> Result<&Player, RoomError> {
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }
        if self.is_started() {
            return Err(RoomError::RoomAlreadyStarted);
        }

        self.game.add_player(player_id, name, false).map_err(|e| match e {
            GameError::NoColorAvailable => RoomError::RoomFull,
            GameError::GameAlreadyStarted => RoomError::RoomAlreadyStarted,
            other => RoomError::Game(other),
        })
    }

    /// Remove a player; their properties return to the bank
    pub fn remove_player(&mut self, player_id: PlayerId) -> Result<Vec<GameEvent>, RoomError> {
        if !self.has_player(player_id) {
            return Err(RoomError::NotInRoom);
        }
        self.members.remove(&player_id);
        let events = self.game.remove_player(player_id)?;

        if self.game.players.is_empty() {
            self.closed = true;
        }
        self.settle();
        Ok(events)
    }

    /// Close the room for everyone
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn start_game(&mut self, requester_id: PlayerId) -> Result<(), RoomError> {
        if requester_id != self.host_id {
            return Err(RoomError::NotAuthorized);
        }
        if self.is_started() {
            return Err(RoomError::RoomAlreadyStarted);
        }
        if self.player_count() < MIN_PLAYERS {
            return Err(RoomError::NotEnoughPlayers);
        }

        self.game.start()?;
        Ok(())
    }

    pub fn apply_action(
        &mut self,
        player_id: PlayerId,
        action: GameAction,
    ) -> Result<Vec<GameEvent>, RoomError> {
        if !self.has_player(player_id) {
            return Err(RoomError::NotInRoom);
        }
        let mut events = self.game.apply_action(player_id, action)?;
        events.extend(self.skip_disconnected()?);
        Ok(events)
    }

    pub fn set_player_connected(
        &mut self,
        player_id: PlayerId,
        connected: bool,
    ) -> Result<(), RoomError> {
        self.game
            .set_connected(player_id, connected)
            .map_err(|_| RoomError::NotInRoom)
    }

    /// End the turns of disconnected players while anyone connected remains
    pub fn skip_disconnected(&mut self) -> Result<Vec<GameEvent>, RoomError> {
        let mut events = Vec::new();
        for _ in 0..self.player_count() {
            if !self.is_started() || self.game.is_finished() {
                break;
            }
            let holder_connected = self
                .game
                .current_player_id()
                .and_then(|id| self.game.get_player(id))
                .map_or(true, |p| p.connected);
            let anyone_connected = self
                .game
                .players
                .iter()
                .any(|p| p.connected && p.is_active());
            if holder_connected || !anyone_connected {
                break;
            }
            events.extend(self.game.force_end_turn()?);
        }
        self.settle();
        Ok(events)
    }

    /// A finished game has nothing left to host
    fn settle(&mut self) {
        if self.game.is_finished() {
            self.closed = true;
        }
    }

    pub fn get_winner(&self) -> Option<(PlayerId, String)> {
        let winner = self.game.get_winner()?;
        let name = self.game.get_player(winner)?.name.clone();
        Some((winner, name))
    }

    pub fn meta(&self) -> RoomMeta {
        RoomMeta {
            id: self.code.to_string(),
            host_id: self.host_id,
            max_players: self.max_players,
            created_at: self.created_at,
            version: self.version,
        }
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot::capture(&self.meta(), &self.game)
    }

    /// Rebuild a room from its persisted record, with no live connections
    pub fn from_snapshot(snapshot: RoomSnapshot) -> Result<Self, RoomError> {
        let (meta, game) = snapshot.restore();
        Ok(Self {
            code: meta.id.parse()?,
            host_id: meta.host_id,
            max_players: meta.max_players,
            created_at: meta.created_at,
            version: meta.version,
            game,
            members: HashMap::new(),
            closed: false,
        })
    }

    pub fn to_info(&self) -> RoomInfo {
        RoomInfo {
            id: self.code.to_string(),
            host_name: self
                .game
                .get_player(self.host_id)
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            players: self.player_count(),
            max_players: self.max_players,
            is_started: self.is_started(),
            created_at: self.created_at,
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tycoon_core::{PlayerColor, TurnPhase};

    fn code() -> RoomCode {
        "ABC123".parse().unwrap()
    }

    #[test]
    fn test_create_room() {
        let host_id = Uuid::new_v4();
        let room = GameRoom::new(code(), host_id, "Host".to_string(), 4);

        assert_eq!(room.player_count(), 1);
        assert!(!room.is_full());
        assert_eq!(room.host_id, host_id);
        assert!(!room.is_started());

        let host = room.game.get_player(host_id).unwrap();
        assert!(host.is_host);
        assert_eq!(host.color, PlayerColor::Red);
        assert_eq!(host.cash, 1500);
    }

    #[test]
    fn test_max_players_clamped() {
        let room = GameRoom::new(code(), Uuid::new_v4(), "Host".into(), 9);
        assert_eq!(room.max_players, 4);
        let room = GameRoom::new(code(), Uuid::new_v4(), "Host".into(), 1);
        assert_eq!(room.max_players, 2);
    }

    #[test]
    fn test_add_remove_players() {
        let host_id = Uuid::new_v4();
        let mut room = GameRoom::new(code(), host_id, "Host".to_string(), 2);

        let player2 = Uuid::new_v4();
        let joined = room.add_player(player2, "Player 2".to_string()).unwrap();
        assert_eq!(joined.color, PlayerColor::Blue);

        assert_eq!(room.player_count(), 2);
        assert!(room.is_full());

        // Can't add more players
        let player3 = Uuid::new_v4();
        assert!(matches!(
            room.add_player(player3, "Player 3".to_string()),
            Err(RoomError::RoomFull)
        ));

        // Remove a player
        room.remove_player(player2).unwrap();
        assert!(!room.closed);
        assert_eq!(room.player_count(), 1);
        assert!(matches!(
            room.remove_player(player2),
            Err(RoomError::NotInRoom)
        ));

        room.remove_player(host_id).unwrap();
        assert!(room.closed);
    }

    #[test]
    fn test_start_game() {
        let host_id = Uuid::new_v4();
        let mut room = GameRoom::new(code(), host_id, "Host".to_string(), 4);

        // Can't start with only 1 player
        assert!(matches!(
            room.start_game(host_id),
            Err(RoomError::NotEnoughPlayers)
        ));

        // Add another player
        let player2 = Uuid::new_v4();
        room.add_player(player2, "Player 2".to_string()).unwrap();

        // Non-host can't start
        assert!(matches!(
            room.start_game(player2),
            Err(RoomError::NotAuthorized)
        ));

        // Host can start
        room.start_game(host_id).unwrap();
        assert_eq!(room.game.phase, TurnPhase::AwaitingRoll);
        assert_eq!(room.game.current_player_id(), Some(host_id));

        assert!(matches!(
            room.start_game(host_id),
            Err(RoomError::RoomAlreadyStarted)
        ));
        assert!(matches!(
            room.add_player(Uuid::new_v4(), "Late".into()),
            Err(RoomError::RoomAlreadyStarted)
        ));
    }

    #[test]
    fn test_skip_disconnected_players() {
        let host_id = Uuid::new_v4();
        let mut room = GameRoom::new(code(), host_id, "Host".into(), 4);
        let bob = Uuid::new_v4();
        let carol = Uuid::new_v4();
        room.add_player(bob, "Bob".into()).unwrap();
        room.add_player(carol, "Carol".into()).unwrap();
        room.start_game(host_id).unwrap();

        room.set_player_connected(host_id, false).unwrap();
        room.set_player_connected(bob, false).unwrap();
        let events = room.skip_disconnected().unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(room.game.current_player_id(), Some(carol));

        // Nobody left to hand the turn to
        room.set_player_connected(carol, false).unwrap();
        assert!(room.skip_disconnected().unwrap().is_empty());
        assert_eq!(room.game.current_player_id(), Some(carol));
    }

    #[test]
    fn test_full_room_reported_before_started() {
        let host_id = Uuid::new_v4();
        let mut room = GameRoom::new(code(), host_id, "Host".into(), 2);
        room.add_player(Uuid::new_v4(), "Bob".into()).unwrap();
        room.start_game(host_id).unwrap();

        assert!(matches!(
            room.add_player(Uuid::new_v4(), "Carol".into()),
            Err(RoomError::RoomFull)
        ));
    }

    #[test]
    fn test_turn_never_lands_on_disconnected_player() {
        let host_id = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut room = GameRoom::new(code(), host_id, "Host".into(), 4);
        room.add_player(bob, "Bob".into()).unwrap();
        room.start_game(host_id).unwrap();

        room.apply_action(host_id, GameAction::RollDice).unwrap();
        room.apply_action(host_id, GameAction::EndTurn).unwrap();
        room.set_player_connected(host_id, false).unwrap();

        room.apply_action(bob, GameAction::RollDice).unwrap();
        let events = room.apply_action(bob, GameAction::EndTurn).unwrap();

        assert_eq!(room.game.current_player_id(), Some(bob));
        assert_eq!(room.game.phase, TurnPhase::AwaitingRoll);
        let turns_ended = events
            .iter()
            .filter(|e| matches!(e, GameEvent::TurnEnded { .. }))
            .count();
        assert_eq!(turns_ended, 2);
        room.apply_action(bob, GameAction::RollDice).unwrap();
    }

    #[test]
    fn test_finished_game_closes_room() {
        let host_id = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut room = GameRoom::new(code(), host_id, "Host".into(), 4);
        room.add_player(bob, "Bob".into()).unwrap();
        room.start_game(host_id).unwrap();

        room.remove_player(bob).unwrap();

        assert_eq!(room.get_winner().map(|(id, _)| id), Some(host_id));
        assert!(room.closed);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let host_id = Uuid::new_v4();
        let mut room = GameRoom::new(code(), host_id, "Host".into(), 3);
        room.version = 4;
        room.members.insert(host_id, Uuid::new_v4());

        let restored = GameRoom::from_snapshot(room.snapshot()).unwrap();

        assert_eq!(restored.code, room.code);
        assert_eq!(restored.version, 4);
        assert_eq!(restored.game, room.game);
        assert!(restored.members.is_empty());
    }
}
