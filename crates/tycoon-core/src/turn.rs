//! Turn phases and their legal transitions.

use crate::board::PlayerId;
use crate::game::GameError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the room is in the turn cycle.
///
/// ```text
/// WaitingForPlayers → AwaitingRoll → ResolvingMove → OpenActions → TurnComplete
///                          ↑                                           │
///                          └───────────────────────────────────────────┤
///                                                                      ↓
///                                                                  GameOver
/// ```
///
/// `AwaitingRoll → TurnComplete` is only taken when the server force-ends the
/// turn of a disconnected player. Any started phase may jump to `GameOver`
/// when players leave and one remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase")]
pub enum TurnPhase {
    WaitingForPlayers,
    AwaitingRoll,
    ResolvingMove,
    OpenActions,
    TurnComplete,
    GameOver { winner: PlayerId },
}

impl TurnPhase {
    /// Whether the game has been started
    pub fn is_started(&self) -> bool {
        !matches!(self, TurnPhase::WaitingForPlayers)
    }

    pub fn is_over(&self) -> bool {
        matches!(self, TurnPhase::GameOver { .. })
    }

    /// Returns `true` if moving to `target` is a legal transition
    pub fn can_transition_to(&self, target: &TurnPhase) -> bool {
        use TurnPhase::*;
        match (self, target) {
            (WaitingForPlayers, AwaitingRoll)
            | (AwaitingRoll, ResolvingMove)
            | (ResolvingMove, OpenActions)
            | (OpenActions, TurnComplete)
            | (AwaitingRoll, TurnComplete)
            | (TurnComplete, AwaitingRoll) => true,
            (WaitingForPlayers, GameOver { .. }) | (GameOver { .. }, _) => false,
            (_, GameOver { .. }) => true,
            _ => false,
        }
    }

    /// Move to `target`, rejecting illegal transitions
    pub fn transition(&mut self, target: TurnPhase) -> Result<(), GameError> {
        if !self.can_transition_to(&target) {
            return Err(GameError::IllegalTransition {
                from: *self,
                to: target,
            });
        }
        *self = target;
        Ok(())
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnPhase::WaitingForPlayers => write!(f, "WaitingForPlayers"),
            TurnPhase::AwaitingRoll => write!(f, "AwaitingRoll"),
            TurnPhase::ResolvingMove => write!(f, "ResolvingMove"),
            TurnPhase::OpenActions => write!(f, "OpenActions"),
            TurnPhase::TurnComplete => write!(f, "TurnComplete"),
            TurnPhase::GameOver { .. } => write!(f, "GameOver"),
        }
    }
}
