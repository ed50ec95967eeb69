//! Player state and cash handling.
//!
//! This module contains:
//! - The fixed four-color palette and color assignment
//! - Player struct with cash, position, holdings and jail state

use crate::board::{PlayerId, PropertyId};
use serde::{Deserialize, Serialize};

/// Cash every player starts with
pub const STARTING_CASH: i64 = 1500;

/// Player token color, unique within a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerColor {
    Red,
    Blue,
    Green,
    Yellow,
}

impl PlayerColor {
    /// The palette in assignment order
    pub const PALETTE: [PlayerColor; 4] = [
        PlayerColor::Red,
        PlayerColor::Blue,
        PlayerColor::Green,
        PlayerColor::Yellow,
    ];

    /// Lowest palette color not already in use
    pub fn lowest_unused(used: &[PlayerColor]) -> Option<PlayerColor> {
        Self::PALETTE.into_iter().find(|c| !used.contains(c))
    }

    /// Get hex color code for rendering
    pub fn hex_code(&self) -> u32 {
        match self {
            PlayerColor::Red => 0xE74C3C,
            PlayerColor::Blue => 0x3498DB,
            PlayerColor::Green => 0x2ECC71,
            PlayerColor::Yellow => 0xF1C40F,
        }
    }
}

/// A single player's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    /// Display name
    pub name: String,
    pub color: PlayerColor,
    /// Cash balance; negative only until the turn ends
    pub cash: i64,
    /// Board position (0-39)
    pub position: u8,
    /// Owned property ids, in acquisition order
    pub properties: Vec<PropertyId>,
    pub in_jail: bool,
    /// Failed rolls spent in jail this stay
    pub jail_turns: u8,
    /// Get-out-of-jail-free tokens held
    pub jail_free_tokens: u8,
    pub is_host: bool,
    pub connected: bool,
    pub bankrupt: bool,
}

impl Player {
    /// Create a new player at GO with starting cash
    pub fn new(id: PlayerId, name: String, color: PlayerColor, is_host: bool) -> Self {
        Self {
            id,
            name,
            color,
            cash: STARTING_CASH,
            position: 0,
            properties: Vec::new(),
            in_jail: false,
            jail_turns: 0,
            jail_free_tokens: 0,
            is_host,
            connected: true,
            bankrupt: false,
        }
    }

    pub fn can_afford(&self, amount: i64) -> bool {
        self.cash >= amount
    }

    /// Apply a signed cash change
    pub fn adjust_cash(&mut self, delta: i64) {
        self.cash += delta;
    }

    pub fn owns(&self, property: &str) -> bool {
        self.properties.iter().any(|p| p == property)
    }

    pub fn add_property(&mut self, property: &str) {
        if !self.owns(property) {
            self.properties.push(property.to_string());
        }
    }

    pub fn remove_property(&mut self, property: &str) {
        self.properties.retain(|p| p != property);
    }

    /// Send the player to jail (no GO salary)
    pub fn go_to_jail(&mut self) {
        self.position = crate::board::JAIL_POSITION;
        self.in_jail = true;
        self.jail_turns = 0;
    }

    pub fn leave_jail(&mut self) {
        self.in_jail = false;
        self.jail_turns = 0;
    }

    /// Still eligible to take turns
    pub fn is_active(&self) -> bool {
        !self.bankrupt
    }
}
