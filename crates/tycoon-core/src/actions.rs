//! Game actions that players can take.
//!
//! This module defines all possible actions in the game and the events
//! that result from those actions.

use crate::board::{PlayerId, PropertyId};
use crate::cards::Card;
use crate::ledger::LedgerAction;
use serde::{Deserialize, Serialize};

/// All possible actions a player can take once the game has started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameAction {
    // ==================== Turn Actions ====================
    /// Roll the dice (must be done at start of turn)
    RollDice,

    // ==================== Ledger Actions (Open Actions) ====================
    /// Buy an unowned property from the bank
    BuyProperty(PropertyId),
    /// Sell a property back to the bank at 90%
    SellProperty(PropertyId),
    /// Mortgage a property for 50%
    MortgageProperty(PropertyId),
    /// Lift a mortgage for 55%
    UnmortgageProperty(PropertyId),
    /// Build one house
    BuildHouse(PropertyId),
    /// Replace four houses with a hotel
    BuildHotel(PropertyId),

    // ==================== Turn Management ====================
    /// End your turn
    EndTurn,
}

impl GameAction {
    /// The ledger operation behind this action, if any
    pub fn ledger(&self) -> Option<(LedgerAction, &str)> {
        match self {
            GameAction::BuyProperty(p) => Some((LedgerAction::Buy, p)),
            GameAction::SellProperty(p) => Some((LedgerAction::Sell, p)),
            GameAction::MortgageProperty(p) => Some((LedgerAction::Mortgage, p)),
            GameAction::UnmortgageProperty(p) => Some((LedgerAction::Unmortgage, p)),
            GameAction::BuildHouse(p) => Some((LedgerAction::BuildHouse, p)),
            GameAction::BuildHotel(p) => Some((LedgerAction::BuildHotel, p)),
            GameAction::RollDice | GameAction::EndTurn => None,
        }
    }
}

/// Why the bank moved money
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BankReason {
    Salary,
    Card,
    Repairs,
    JailFine,
}

/// How a player got out of jail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JailExit {
    Doubles,
    JailFreeToken,
    FinePaid,
}

/// Events that occur as a result of actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Dice were rolled
    DiceRolled {
        player: PlayerId,
        roll: (u8, u8),
        total: u8,
    },

    /// A player moved on the board
    PlayerMoved {
        player: PlayerId,
        from: u8,
        to: u8,
        passed_go: bool,
    },

    /// The bank paid (positive) or collected (negative)
    BankAdjusted {
        player: PlayerId,
        amount: i64,
        reason: BankReason,
    },

    /// Rent changed hands
    RentPaid {
        from: PlayerId,
        to: PlayerId,
        property: PropertyId,
        amount: i64,
    },

    /// A card was drawn
    CardDrawn { player: PlayerId, card: Card },

    /// A player was sent to jail
    SentToJail { player: PlayerId },

    /// A player left jail
    LeftJail { player: PlayerId, via: JailExit },

    /// A jailed player failed to roll doubles
    StayedInJail { player: PlayerId, jail_turns: u8 },

    /// A get-out-of-jail-free token was granted
    JailFreeGranted { player: PlayerId },

    /// A ledger action was applied
    PropertyChanged {
        player: PlayerId,
        property: PropertyId,
        action: LedgerAction,
        cash_change: i64,
    },

    /// Turn ended
    TurnEnded {
        player: PlayerId,
        next_player: PlayerId,
    },

    /// A player ended their turn in debt and was eliminated
    PlayerBankrupt {
        player: PlayerId,
        released: Vec<PropertyId>,
    },

    /// A player left a running game
    PlayerRemoved {
        player: PlayerId,
        released: Vec<PropertyId>,
    },

    /// Only one solvent player remains
    GameWon { player: PlayerId },
}

impl GameEvent {
    /// One-line description for the turn-action log
    pub fn describe(&self) -> Option<String> {
        match self {
            GameEvent::DiceRolled { total, .. } => Some(format!("Rolled {}", total)),
            GameEvent::RentPaid {
                amount, property, ..
            } => Some(format!("Paid ${} rent on {}", amount, property)),
            GameEvent::CardDrawn { card, .. } => Some(format!(
                "Drew {:?} card: {}",
                card.category, card.title
            )),
            GameEvent::SentToJail { .. } => Some("Went to jail".to_string()),
            GameEvent::PropertyChanged {
                property,
                action,
                cash_change,
                ..
            } => Some(format!("{:?} {} (${:+})", action, property, cash_change)),
            _ => None,
        }
    }
}
