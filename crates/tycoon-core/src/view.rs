//! Read-only client projection of a room.
//!
//! Clients never run the rules. They hold the last snapshot the server
//! broadcast and patch it with versioned deltas. A delta that does not follow
//! the held version directly is refused, and the client should ask for a
//! fresh snapshot.

use crate::board::{PlayerId, Property};
use crate::player::Player;
use crate::snapshot::RoomSnapshot;
use crate::turn::TurnPhase;
use serde::{Deserialize, Serialize};

/// Result of feeding a broadcast into a [`ClientView`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyOutcome {
    Applied,
    /// Already seen; ignored
    Stale,
    /// A version was missed; resync with a snapshot
    Gap { expected: u64, got: u64 },
}

/// Versioned partial update carried by a broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewDelta {
    Turn {
        current_player: usize,
        phase: TurnPhase,
        players: Vec<Player>,
    },
    Property {
        property: Property,
        player: Player,
    },
}

/// A server broadcast as the client sees it, straight off the wire.
///
/// Messages that carry no room state decode to [`RoomUpdate::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Envelope")]
pub enum RoomUpdate {
    Snapshot(RoomSnapshot),
    Delta { version: u64, delta: ViewDelta },
    Other,
}

/// The raw `type` / `payload` pair of a server message
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Deserialize)]
struct RoomPayload {
    room: RoomSnapshot,
}

#[derive(Deserialize)]
struct PropertyPayload {
    version: u64,
    property: Property,
    player: Player,
}

#[derive(Deserialize)]
struct TurnPayload {
    version: u64,
    current_player: usize,
    phase: TurnPhase,
    players: Vec<Player>,
}

impl TryFrom<Envelope> for RoomUpdate {
    type Error = serde_json::Error;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        let update = match envelope.kind.as_str() {
            "GameCreated" | "JoinedGame" | "PlayerJoined" | "PlayerLeft" | "PlayerRejoined"
            | "PlayerDisconnected" | "GameStarted" | "MoveResolved" | "RoomSynced" => {
                let payload: RoomPayload = serde_json::from_value(envelope.payload)?;
                RoomUpdate::Snapshot(payload.room)
            }
            "PropertyUpdated" => {
                let payload: PropertyPayload = serde_json::from_value(envelope.payload)?;
                RoomUpdate::Delta {
                    version: payload.version,
                    delta: ViewDelta::Property {
                        property: payload.property,
                        player: payload.player,
                    },
                }
            }
            "TurnUpdated" => {
                let payload: TurnPayload = serde_json::from_value(envelope.payload)?;
                RoomUpdate::Delta {
                    version: payload.version,
                    delta: ViewDelta::Turn {
                        current_player: payload.current_player,
                        phase: payload.phase,
                        players: payload.players,
                    },
                }
            }
            _ => RoomUpdate::Other,
        };
        Ok(update)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientView {
    me: Option<PlayerId>,
    room: Option<RoomSnapshot>,
}

impl ClientView {
    pub fn new(me: Option<PlayerId>) -> Self {
        Self { me, room: None }
    }

    pub fn me(&self) -> Option<PlayerId> {
        self.me
    }

    pub fn set_me(&mut self, me: PlayerId) {
        self.me = Some(me);
    }

    pub fn room(&self) -> Option<&RoomSnapshot> {
        self.room.as_ref()
    }

    pub fn version(&self) -> Option<u64> {
        self.room.as_ref().map(|r| r.version)
    }

    /// Replace the held room if the snapshot is newer
    pub fn apply_snapshot(&mut self, snapshot: RoomSnapshot) -> ApplyOutcome {
        if let Some(current) = &self.room {
            if current.id == snapshot.id && snapshot.version <= current.version {
                return ApplyOutcome::Stale;
            }
        }
        self.room = Some(snapshot);
        ApplyOutcome::Applied
    }

    /// Patch the held room with a delta stamped `version`
    pub fn apply_delta(&mut self, version: u64, delta: ViewDelta) -> ApplyOutcome {
        let Some(room) = self.room.as_mut() else {
            return ApplyOutcome::Gap {
                expected: 0,
                got: version,
            };
        };

        if version <= room.version {
            return ApplyOutcome::Stale;
        }
        if version != room.version + 1 {
            return ApplyOutcome::Gap {
                expected: room.version + 1,
                got: version,
            };
        }

        match delta {
            ViewDelta::Turn {
                current_player,
                phase,
                players,
            } => {
                room.current_player = current_player;
                room.phase = phase;
                room.is_started = phase.is_started();
                room.players = players;
                if phase == TurnPhase::AwaitingRoll {
                    room.turn_actions.clear();
                    room.dice = None;
                }
            }
            ViewDelta::Property { property, player } => {
                match room.properties.iter_mut().find(|p| p.id == property.id) {
                    Some(slot) => *slot = property,
                    None => room.properties.push(property),
                }
                if let Some(slot) = room.players.iter_mut().find(|p| p.id == player.id) {
                    *slot = player;
                }
            }
        }

        room.version = version;
        ApplyOutcome::Applied
    }

    /// Feed a decoded broadcast; `None` when it carries no room state
    pub fn apply_update(&mut self, update: RoomUpdate) -> Option<ApplyOutcome> {
        match update {
            RoomUpdate::Snapshot(room) => Some(self.apply_snapshot(room)),
            RoomUpdate::Delta { version, delta } => Some(self.apply_delta(version, delta)),
            RoomUpdate::Other => None,
        }
    }

    /// Whether the local player holds the turn
    pub fn is_my_turn(&self) -> bool {
        match (self.me, self.room.as_ref()) {
            (Some(me), Some(room)) => room.current_player_id() == Some(me),
            _ => false,
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.room.as_ref()?.player(id)
    }

    pub fn property(&self, id: &str) -> Option<&Property> {
        self.room.as_ref()?.property(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::GameAction;
    use crate::game::GameState;
    use crate::snapshot::RoomMeta;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn snapshot(version: u64) -> (RoomSnapshot, GameState, Vec<PlayerId>) {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let mut game = GameState::new();
        game.add_player(ids[0], "Alice".into(), true).unwrap();
        game.add_player(ids[1], "Bob".into(), false).unwrap();
        game.start().unwrap();
        let meta = RoomMeta {
            id: "ROOM01".into(),
            host_id: ids[0],
            max_players: 4,
            created_at: 0,
            version,
        };
        (RoomSnapshot::capture(&meta, &game), game, ids)
    }

    #[test]
    fn test_newer_snapshot_replaces_older() {
        let mut view = ClientView::new(None);
        let (s3, _, _) = snapshot(3);
        assert_eq!(view.apply_snapshot(s3.clone()), ApplyOutcome::Applied);

        let mut older = s3.clone();
        older.version = 2;
        assert_eq!(view.apply_snapshot(older), ApplyOutcome::Stale);
        assert_eq!(view.version(), Some(3));
    }

    #[test]
    fn test_delta_requires_next_version() {
        let (s, _, ids) = snapshot(5);
        let mut view = ClientView::new(Some(ids[0]));
        view.apply_snapshot(s.clone());
        assert!(view.is_my_turn());

        let turn = ViewDelta::Turn {
            current_player: 1,
            phase: TurnPhase::AwaitingRoll,
            players: s.players.clone(),
        };

        assert_eq!(
            view.apply_delta(7, turn.clone()),
            ApplyOutcome::Gap {
                expected: 6,
                got: 7
            }
        );
        assert_eq!(view.apply_delta(5, turn.clone()), ApplyOutcome::Stale);
        assert_eq!(view.apply_delta(6, turn), ApplyOutcome::Applied);
        assert!(!view.is_my_turn());
        assert_eq!(view.version(), Some(6));
    }

    #[test]
    fn test_property_delta_updates_owner_and_cash() {
        let (s, mut game, ids) = snapshot(1);
        let mut view = ClientView::new(Some(ids[0]));
        view.apply_snapshot(s);

        game.roll_with_dice(ids[0], (1, 2), &mut rand::thread_rng())
            .unwrap();
        game.apply_action(ids[0], GameAction::BuyProperty("baltic".into()))
            .unwrap();

        let delta = ViewDelta::Property {
            property: game.properties.get("baltic").unwrap().clone(),
            player: game.get_player(ids[0]).unwrap().clone(),
        };
        assert_eq!(view.apply_delta(2, delta), ApplyOutcome::Applied);
        assert_eq!(view.property("baltic").unwrap().owner, Some(ids[0]));
        assert_eq!(view.player(ids[0]).unwrap().cash, 1440);
    }

    #[test]
    fn test_wire_messages_drive_the_view() {
        let (s, mut game, ids) = snapshot(1);
        let mut view = ClientView::new(Some(ids[0]));

        let started = serde_json::json!({"type": "GameStarted", "payload": {"room": s}});
        let update: RoomUpdate = serde_json::from_value(started).unwrap();
        assert_eq!(view.apply_update(update), Some(ApplyOutcome::Applied));

        game.roll_with_dice(ids[0], (1, 2), &mut rand::thread_rng())
            .unwrap();
        game.apply_action(ids[0], GameAction::BuyProperty("baltic".into()))
            .unwrap();
        let bought = serde_json::json!({
            "type": "PropertyUpdated",
            "payload": {
                "version": 2,
                "action": "Buy",
                "property": game.properties.get("baltic").unwrap(),
                "player": game.get_player(ids[0]).unwrap(),
            }
        });
        let update: RoomUpdate = serde_json::from_value(bought).unwrap();
        assert_eq!(view.apply_update(update), Some(ApplyOutcome::Applied));
        assert_eq!(view.property("baltic").unwrap().owner, Some(ids[0]));
        assert_eq!(view.version(), Some(2));

        let over = serde_json::json!({
            "type": "GameOver",
            "payload": {"winner": ids[0], "winner_name": "Alice"}
        });
        let update: RoomUpdate = serde_json::from_value(over).unwrap();
        assert_eq!(view.apply_update(update), None);

        let pong: RoomUpdate = serde_json::from_str(r#"{"type":"Pong"}"#).unwrap();
        assert_eq!(pong, RoomUpdate::Other);

        let broken = serde_json::json!({"type": "TurnUpdated", "payload": {"version": 3}});
        assert!(serde_json::from_value::<RoomUpdate>(broken).is_err());
    }

    #[test]
    fn test_delta_without_snapshot_is_gap() {
        let mut view = ClientView::new(None);
        let (s, _, _) = snapshot(1);
        let delta = ViewDelta::Turn {
            current_player: 0,
            phase: TurnPhase::AwaitingRoll,
            players: s.players,
        };
        assert!(matches!(view.apply_delta(1, delta), ApplyOutcome::Gap { .. }));
    }
}
