//! Transaction validator and property ledger.
//!
//! Every ledger operation is split into a pure `check_*` function that
//! inspects the current state and either rejects the request or produces a
//! [`LedgerDelta`], and [`Ledger::apply`] which commits a delta. A rejected
//! check never touches state.

use crate::board::{standard_properties, ColorGroup, PlayerId, Property, PropertyId};
use crate::game::GameError;
use crate::player::Player;
use serde::{Deserialize, Serialize};

/// Cost of a single house
pub const HOUSE_COST: i64 = 50;

/// Cost of a hotel (replaces four houses)
pub const HOTEL_COST: i64 = 100;

/// Maximum houses on a property before a hotel
pub const MAX_HOUSES: u8 = 4;

/// Rent multipliers for 0-4 houses on a street
const HOUSE_RENT_MULTIPLIER: [i64; 5] = [1, 5, 15, 45, 80];

/// Rent multiplier with a hotel on a street
const HOTEL_RENT_MULTIPLIER: i64 = 125;

/// Ledger operations a player can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerAction {
    Buy,
    Sell,
    Mortgage,
    Unmortgage,
    BuildHouse,
    BuildHotel,
}

/// A validated change to one property and its owner's cash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDelta {
    pub action: LedgerAction,
    pub property: PropertyId,
    pub player: PlayerId,
    /// Signed change to the player's cash (bank is the counterparty)
    pub cash_change: i64,
}

/// An exact player-to-player transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: PlayerId,
    pub to: PlayerId,
    pub amount: i64,
}

/// Authoritative record of ownership, improvements and mortgages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    properties: Vec<Property>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::standard()
    }
}

impl Ledger {
    /// Ledger over the classic property table with nothing owned
    pub fn standard() -> Self {
        Self {
            properties: standard_properties(),
        }
    }

    /// Rebuild a ledger from persisted properties
    pub fn from_properties(properties: Vec<Property>) -> Self {
        Self { properties }
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn get(&self, id: &str) -> Result<&Property, GameError> {
        self.properties
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| GameError::UnknownProperty(id.to_string()))
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Property, GameError> {
        self.properties
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| GameError::UnknownProperty(id.to_string()))
    }

    /// The property on a board position, if that space is a property
    pub fn at_position(&self, position: u8) -> Option<&Property> {
        self.properties.iter().find(|p| p.position == position)
    }

    /// All properties owned by a player
    pub fn owned_by(&self, player: PlayerId) -> impl Iterator<Item = &Property> {
        self.properties
            .iter()
            .filter(move |p| p.owner == Some(player))
    }

    fn count_owned_in_group(&self, player: PlayerId, group: ColorGroup) -> usize {
        self.owned_by(player).filter(|p| p.color == group).count()
    }

    /// Total (houses, hotels) a player has built
    pub fn buildings_owned(&self, player: PlayerId) -> (u32, u32) {
        self.owned_by(player).fold((0, 0), |(h, t), p| {
            (h + p.houses as u32, t + p.hotels as u32)
        })
    }

    /// Rent due for landing on a property, given the dice total.
    ///
    /// Unowned and mortgaged properties charge nothing.
    pub fn rent_due(&self, property: &Property, dice_total: u8) -> i64 {
        let Some(owner) = property.owner else {
            return 0;
        };
        if property.mortgaged {
            return 0;
        }

        match property.color {
            ColorGroup::Railroad => {
                let owned = self.count_owned_in_group(owner, ColorGroup::Railroad).max(1);
                property.rent * (1 << (owned - 1))
            }
            ColorGroup::Utility => {
                let multiplier = if self.count_owned_in_group(owner, ColorGroup::Utility) >= 2 {
                    10
                } else {
                    4
                };
                multiplier * dice_total as i64
            }
            _ if property.hotels > 0 => property.rent * HOTEL_RENT_MULTIPLIER,
            _ => property.rent * HOUSE_RENT_MULTIPLIER[property.houses.min(MAX_HOUSES) as usize],
        }
    }

    // ==================== Validation ====================

    /// Check a ledger action without mutating anything
    pub fn check(
        &self,
        action: LedgerAction,
        property: &str,
        player: &Player,
    ) -> Result<LedgerDelta, GameError> {
        match action {
            LedgerAction::Buy => self.check_buy(property, player),
            LedgerAction::Sell => self.check_sell(property, player),
            LedgerAction::Mortgage => self.check_mortgage(property, player),
            LedgerAction::Unmortgage => self.check_unmortgage(property, player),
            LedgerAction::BuildHouse => self.check_build_house(property, player),
            LedgerAction::BuildHotel => self.check_build_hotel(property, player),
        }
    }

    pub fn check_buy(&self, property: &str, player: &Player) -> Result<LedgerDelta, GameError> {
        let p = self.get(property)?;
        if p.is_owned() {
            return Err(GameError::AlreadyOwned);
        }
        require_funds(player, p.price)?;
        Ok(delta(LedgerAction::Buy, p, player, -p.price))
    }

    pub fn check_sell(&self, property: &str, player: &Player) -> Result<LedgerDelta, GameError> {
        let p = self.owned(property, player)?;
        Ok(delta(LedgerAction::Sell, p, player, p.sale_value()))
    }

    pub fn check_mortgage(
        &self,
        property: &str,
        player: &Player,
    ) -> Result<LedgerDelta, GameError> {
        let p = self.owned(property, player)?;
        if p.mortgaged {
            return Err(GameError::AlreadyMortgaged);
        }
        Ok(delta(LedgerAction::Mortgage, p, player, p.mortgage_value()))
    }

    pub fn check_unmortgage(
        &self,
        property: &str,
        player: &Player,
    ) -> Result<LedgerDelta, GameError> {
        let p = self.owned(property, player)?;
        if !p.mortgaged {
            return Err(GameError::NotMortgaged);
        }
        let cost = p.unmortgage_cost();
        require_funds(player, cost)?;
        Ok(delta(LedgerAction::Unmortgage, p, player, -cost))
    }

    pub fn check_build_house(
        &self,
        property: &str,
        player: &Player,
    ) -> Result<LedgerDelta, GameError> {
        let p = self.buildable(property, player)?;
        if p.hotels > 0 {
            return Err(GameError::HotelBuilt);
        }
        if p.houses >= MAX_HOUSES {
            return Err(GameError::MaxHouses);
        }
        require_funds(player, HOUSE_COST)?;
        Ok(delta(LedgerAction::BuildHouse, p, player, -HOUSE_COST))
    }

    pub fn check_build_hotel(
        &self,
        property: &str,
        player: &Player,
    ) -> Result<LedgerDelta, GameError> {
        let p = self.buildable(property, player)?;
        if p.houses != MAX_HOUSES || p.hotels != 0 {
            return Err(GameError::HotelRequiresFourHouses);
        }
        require_funds(player, HOTEL_COST)?;
        Ok(delta(LedgerAction::BuildHotel, p, player, -HOTEL_COST))
    }

    fn owned(&self, property: &str, player: &Player) -> Result<&Property, GameError> {
        let p = self.get(property)?;
        if p.owner != Some(player.id) {
            return Err(GameError::NotOwner);
        }
        Ok(p)
    }

    fn buildable(&self, property: &str, player: &Player) -> Result<&Property, GameError> {
        let p = self.owned(property, player)?;
        if !p.color.is_street() {
            return Err(GameError::NotAStreet);
        }
        if p.mortgaged {
            return Err(GameError::Mortgaged);
        }
        Ok(p)
    }

    // ==================== Application ====================

    /// Commit a delta produced by [`Ledger::check`].
    ///
    /// The delta must have been checked against the same state; the player
    /// passed in must be the delta's player.
    pub fn apply(&mut self, delta: &LedgerDelta, player: &mut Player) -> Result<(), GameError> {
        if delta.player != player.id {
            return Err(GameError::UnknownPlayer);
        }
        let property = self.get_mut(&delta.property)?;

        match delta.action {
            LedgerAction::Buy => {
                property.owner = Some(player.id);
                player.add_property(&delta.property);
            }
            LedgerAction::Sell => {
                property.release();
                player.remove_property(&delta.property);
            }
            LedgerAction::Mortgage => property.mortgaged = true,
            LedgerAction::Unmortgage => property.mortgaged = false,
            LedgerAction::BuildHouse => property.houses += 1,
            LedgerAction::BuildHotel => {
                property.houses = 0;
                property.hotels = 1;
            }
        }
        player.adjust_cash(delta.cash_change);
        Ok(())
    }

    /// Return every property a player owns to the bank
    pub fn release_all(&mut self, player: PlayerId) -> Vec<PropertyId> {
        let mut released = Vec::new();
        for property in self.properties.iter_mut().filter(|p| p.owner == Some(player)) {
            property.release();
            released.push(property.id.clone());
        }
        released
    }
}

/// Unconditional player-to-player transfer of exactly `amount`.
///
/// The payer may go negative; both players must exist or nothing moves.
pub fn pay_rent(
    players: &mut [Player],
    from: PlayerId,
    to: PlayerId,
    amount: i64,
) -> Result<Transfer, GameError> {
    let from_idx = players
        .iter()
        .position(|p| p.id == from)
        .ok_or(GameError::UnknownPlayer)?;
    let to_idx = players
        .iter()
        .position(|p| p.id == to)
        .ok_or(GameError::UnknownPlayer)?;

    if from_idx != to_idx {
        players[from_idx].adjust_cash(-amount);
        players[to_idx].adjust_cash(amount);
    }

    Ok(Transfer { from, to, amount })
}

fn require_funds(player: &Player, needed: i64) -> Result<(), GameError> {
    if !player.can_afford(needed) {
        return Err(GameError::InsufficientFunds {
            needed,
            available: player.cash,
        });
    }
    Ok(())
}

fn delta(action: LedgerAction, property: &Property, player: &Player, cash_change: i64) -> LedgerDelta {
    LedgerDelta {
        action,
        property: property.id.clone(),
        player: player.id,
        cash_change,
    }
}
