//! Tycoon - a multiplayer property-trading game engine
//!
//! This crate provides the core game logic for Tycoon, including:
//! - The 40-space board and the classic property table
//! - Player state and cash handling
//! - The transaction validator and property ledger
//! - Chance and Community Chest cards
//! - The turn engine with checked phase transitions
//!
//! # Architecture
//!
//! The engine is platform-agnostic and authoritative only on the server.
//! Clients hold a read-only [`view::ClientView`] fed by broadcasts, which can
//! also be compiled to WebAssembly behind the `wasm` feature.
//!
//! # Modules
//!
//! - [`board`]: Spaces, property table, movement
//! - [`player`]: Player state and colors
//! - [`ledger`]: Ownership, mortgages, construction, rent
//! - [`cards`]: Static card piles and draws
//! - [`turn`]: Turn phases
//! - [`game`]: Game state machine
//! - [`snapshot`]: Persisted room record
//! - [`view`]: Client-side projection

pub mod actions;
pub mod board;
pub mod cards;
pub mod game;
pub mod ledger;
pub mod player;
pub mod snapshot;
pub mod turn;
pub mod view;
#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use actions::{BankReason, GameAction, GameEvent, JailExit};
pub use board::{ColorGroup, PlayerId, Property, PropertyId, Space};
pub use cards::{Card, CardAction, CardCategory, CardEffect};
pub use game::{GameError, GameState};
pub use ledger::{Ledger, LedgerAction, LedgerDelta, Transfer};
pub use player::{Player, PlayerColor};
pub use snapshot::{RoomMeta, RoomSnapshot};
pub use turn::TurnPhase;
pub use view::{ApplyOutcome, ClientView, RoomUpdate, ViewDelta};
