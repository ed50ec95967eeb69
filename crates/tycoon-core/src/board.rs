//! Board layout and the property table.
//!
//! This module contains:
//! - Identifier aliases shared by the whole engine
//! - The 40-space board and what each space does when landed on
//! - The `Property` record and the classic property table

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Player identifier (stable for the lifetime of a room seat)
pub type PlayerId = Uuid;

/// Property identifier, e.g. `"boardwalk"`
pub type PropertyId = String;

/// Number of spaces on the board
pub const BOARD_SIZE: u8 = 40;

/// Board position of GO
pub const GO_POSITION: u8 = 0;

/// Board position of the jail
pub const JAIL_POSITION: u8 = 10;

/// Board position of the "Go To Jail" corner
pub const GO_TO_JAIL_POSITION: u8 = 30;

/// Salary collected when passing or landing on GO
pub const GO_SALARY: i64 = 200;

/// Color group of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorGroup {
    Brown,
    LightBlue,
    Pink,
    Orange,
    Red,
    Yellow,
    Green,
    DarkBlue,
    Railroad,
    Utility,
}

impl ColorGroup {
    /// Whether houses and hotels can be built on this group
    pub fn is_street(&self) -> bool {
        !matches!(self, ColorGroup::Railroad | ColorGroup::Utility)
    }
}

/// What a board space does when a player lands on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Space {
    Go,
    /// Just visiting
    Jail,
    FreeParking,
    GoToJail,
    Chance,
    CommunityChest,
    /// Tax squares carry no charge in this ruleset
    Blank,
    Property,
}

impl Space {
    /// Get the space at a board position (wraps around)
    pub fn at(position: u8) -> Space {
        match position % BOARD_SIZE {
            0 => Space::Go,
            10 => Space::Jail,
            20 => Space::FreeParking,
            30 => Space::GoToJail,
            7 | 22 | 36 => Space::Chance,
            2 | 17 | 33 => Space::CommunityChest,
            4 | 38 => Space::Blank,
            _ => Space::Property,
        }
    }
}

/// A purchasable property and its ledger state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub name: String,
    pub price: i64,
    /// Base rent before improvements
    pub rent: i64,
    pub color: ColorGroup,
    pub position: u8,
    /// 0-4, always 0 once a hotel is built
    pub houses: u8,
    /// 0 or 1
    pub hotels: u8,
    pub owner: Option<PlayerId>,
    pub mortgaged: bool,
}

impl Property {
    fn from_row(row: &PropertyRow) -> Self {
        let (id, name, price, rent, color, position) = *row;
        Self {
            id: id.to_string(),
            name: name.to_string(),
            price,
            rent,
            color,
            position,
            houses: 0,
            hotels: 0,
            owner: None,
            mortgaged: false,
        }
    }

    /// Amount credited when the bank buys the property back (90%)
    pub fn sale_value(&self) -> i64 {
        self.price * 9 / 10
    }

    /// Amount credited when mortgaging (50%)
    pub fn mortgage_value(&self) -> i64 {
        self.price / 2
    }

    /// Amount debited to lift a mortgage (55%)
    pub fn unmortgage_cost(&self) -> i64 {
        self.price * 55 / 100
    }

    pub fn is_owned(&self) -> bool {
        self.owner.is_some()
    }

    /// Return the property to the bank in its pristine state
    pub fn release(&mut self) {
        self.owner = None;
        self.houses = 0;
        self.hotels = 0;
        self.mortgaged = false;
    }
}

type PropertyRow = (&'static str, &'static str, i64, i64, ColorGroup, u8);

const PROPERTY_TABLE: [PropertyRow; 28] = [
    ("mediterranean", "Mediterranean Ave", 60, 2, ColorGroup::Brown, 1),
    ("baltic", "Baltic Ave", 60, 4, ColorGroup::Brown, 3),
    ("reading-railroad", "Reading Railroad", 200, 25, ColorGroup::Railroad, 5),
    ("oriental", "Oriental Ave", 100, 6, ColorGroup::LightBlue, 6),
    ("vermont", "Vermont Ave", 100, 6, ColorGroup::LightBlue, 8),
    ("connecticut", "Connecticut Ave", 120, 8, ColorGroup::LightBlue, 9),
    ("st-charles", "St. Charles Place", 140, 10, ColorGroup::Pink, 11),
    ("electric-company", "Electric Company", 150, 0, ColorGroup::Utility, 12),
    ("states", "States Ave", 140, 10, ColorGroup::Pink, 13),
    ("virginia", "Virginia Ave", 160, 12, ColorGroup::Pink, 14),
    ("pennsylvania-railroad", "Pennsylvania Railroad", 200, 25, ColorGroup::Railroad, 15),
    ("st-james", "St. James Place", 180, 14, ColorGroup::Orange, 16),
    ("tennessee", "Tennessee Ave", 180, 14, ColorGroup::Orange, 18),
    ("new-york", "New York Ave", 200, 16, ColorGroup::Orange, 19),
    ("kentucky", "Kentucky Ave", 220, 18, ColorGroup::Red, 21),
    ("indiana", "Indiana Ave", 220, 18, ColorGroup::Red, 23),
    ("illinois", "Illinois Ave", 240, 20, ColorGroup::Red, 24),
    ("bo-railroad", "B&O Railroad", 200, 25, ColorGroup::Railroad, 25),
    ("atlantic", "Atlantic Ave", 260, 22, ColorGroup::Yellow, 26),
    ("ventnor", "Ventnor Ave", 260, 22, ColorGroup::Yellow, 27),
    ("water-works", "Water Works", 150, 0, ColorGroup::Utility, 28),
    ("marvin", "Marvin Gardens", 280, 24, ColorGroup::Yellow, 29),
    ("pacific", "Pacific Ave", 300, 26, ColorGroup::Green, 31),
    ("north-carolina", "North Carolina Ave", 300, 26, ColorGroup::Green, 32),
    ("pennsylvania", "Pennsylvania Ave", 320, 28, ColorGroup::Green, 34),
    ("short-line", "Short Line", 200, 25, ColorGroup::Railroad, 35),
    ("park-place", "Park Place", 350, 35, ColorGroup::DarkBlue, 37),
    ("boardwalk", "Boardwalk", 400, 50, ColorGroup::DarkBlue, 39),
];

/// The full set of purchasable properties, unowned, in board order
pub fn standard_properties() -> Vec<Property> {
    PROPERTY_TABLE.iter().map(Property::from_row).collect()
}

/// Advance a position by a signed number of steps, wrapping around the board.
///
/// Returns the new position and whether GO was passed moving forward.
pub fn advance(position: u8, steps: i32) -> (u8, bool) {
    let size = BOARD_SIZE as i32;
    let raw = position as i32 + steps;
    let new_position = raw.rem_euclid(size) as u8;
    let passed_go = steps > 0 && raw >= size;
    (new_position, passed_go)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_table_positions_are_property_spaces() {
        for property in standard_properties() {
            assert_eq!(
                Space::at(property.position),
                Space::Property,
                "{} sits on a non-property space",
                property.id
            );
        }
    }

    #[test]
    fn test_every_property_space_has_a_property() {
        let properties = standard_properties();
        for position in 0..BOARD_SIZE {
            if Space::at(position) == Space::Property {
                assert!(properties.iter().any(|p| p.position == position));
            }
        }
        assert_eq!(properties.len(), 28);
    }

    #[test]
    fn test_property_ids_unique() {
        let properties = standard_properties();
        let mut ids: Vec<_> = properties.iter().map(|p| p.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), properties.len());
    }

    #[test]
    fn test_ledger_values_floor() {
        let mut property = standard_properties().remove(0);
        property.price = 75;
        assert_eq!(property.sale_value(), 67);
        assert_eq!(property.mortgage_value(), 37);
        assert_eq!(property.unmortgage_cost(), 41);
    }

    #[test]
    fn test_advance_wraps_and_detects_go() {
        assert_eq!(advance(35, 7), (2, true));
        assert_eq!(advance(10, 5), (15, false));
        assert_eq!(advance(38, 2), (0, true));
        assert_eq!(advance(2, -3), (39, false));
    }

    #[test]
    fn test_street_groups() {
        assert!(ColorGroup::Brown.is_street());
        assert!(!ColorGroup::Railroad.is_street());
        assert!(!ColorGroup::Utility.is_street());
    }
}
