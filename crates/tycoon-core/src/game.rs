//! Core game state machine.
//!
//! This module contains the main `GameState` struct: the turn engine that
//! decides whose action is legal, dice and landing resolution, and dispatch
//! of ledger actions to the [`Ledger`].

use crate::actions::{BankReason, GameAction, GameEvent, JailExit};
use crate::board::{advance, PlayerId, Space, BOARD_SIZE, GO_SALARY};
use crate::cards::{self, Card, CardCategory, CardEffect};
use crate::ledger::{pay_rent, Ledger};
use crate::player::{Player, PlayerColor};
use crate::turn::TurnPhase;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum players needed to start
pub const MIN_PLAYERS: usize = 2;

/// Maximum players in one game
pub const MAX_PLAYERS: usize = 4;

/// Fine paid on the third failed roll in jail
pub const JAIL_FINE: i64 = 50;

/// Failed rolls allowed in jail before the fine is forced
pub const MAX_JAIL_TURNS: u8 = 3;

/// Errors that can occur when applying actions
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Not your turn")]
    NotYourTurn,

    #[error("Invalid action for current phase")]
    InvalidPhase,

    #[error("Illegal phase transition from {from} to {to}")]
    IllegalTransition { from: TurnPhase, to: TurnPhase },

    #[error("Game has not started")]
    GameNotStarted,

    #[error("Game already started")]
    GameAlreadyStarted,

    #[error("Not enough players")]
    NotEnoughPlayers,

    #[error("No player colors left")]
    NoColorAvailable,

    #[error("Unknown player")]
    UnknownPlayer,

    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    #[error("Property already owned")]
    AlreadyOwned,

    #[error("Insufficient funds: need ${needed}, have ${available}")]
    InsufficientFunds { needed: i64, available: i64 },

    #[error("Not your property")]
    NotOwner,

    #[error("Property already mortgaged")]
    AlreadyMortgaged,

    #[error("Property not mortgaged")]
    NotMortgaged,

    #[error("Cannot build on a mortgaged property")]
    Mortgaged,

    #[error("Property already has four houses")]
    MaxHouses,

    #[error("Property already has a hotel")]
    HotelBuilt,

    #[error("A hotel requires exactly four houses")]
    HotelRequiresFourHouses,

    #[error("Only streets can be developed")]
    NotAStreet,

    #[error("Dice values must be between 1 and 6")]
    InvalidDice,

    #[error("Game is over")]
    GameOver,
}

impl GameError {
    /// Stable machine-readable name sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            GameError::NotYourTurn => "NotYourTurn",
            GameError::InvalidPhase => "InvalidPhase",
            GameError::IllegalTransition { .. } => "IllegalTransition",
            GameError::GameNotStarted => "GameNotStarted",
            GameError::GameAlreadyStarted => "RoomAlreadyStarted",
            GameError::NotEnoughPlayers => "NotEnoughPlayers",
            GameError::NoColorAvailable => "RoomFull",
            GameError::UnknownPlayer => "UnknownPlayer",
            GameError::UnknownProperty(_) => "UnknownProperty",
            GameError::AlreadyOwned => "AlreadyOwned",
            GameError::InsufficientFunds { .. } => "InsufficientFunds",
            GameError::NotOwner => "NotOwner",
            GameError::AlreadyMortgaged => "AlreadyMortgaged",
            GameError::NotMortgaged => "NotMortgaged",
            GameError::Mortgaged => "Mortgaged",
            GameError::MaxHouses => "MaxHouses",
            GameError::HotelBuilt => "HotelBuilt",
            GameError::HotelRequiresFourHouses => "HotelRequiresFourHouses",
            GameError::NotAStreet => "NotAStreet",
            GameError::InvalidDice => "InvalidDice",
            GameError::GameOver => "GameOver",
        }
    }
}

/// The complete game state of one room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// Players in turn order
    pub players: Vec<Player>,
    /// Property ledger
    pub properties: Ledger,
    /// Index into `players` of whose turn it is
    pub current_player: usize,
    /// Current turn phase
    pub phase: TurnPhase,
    /// Last dice roll this turn
    pub dice_roll: Option<(u8, u8)>,
    /// Human-readable log of this turn, cleared when the turn completes
    pub turn_actions: Vec<String>,
    /// Card drawn this turn
    pub last_card: Option<Card>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    /// Create an empty game waiting for players
    pub fn new() -> Self {
        Self {
            players: Vec::new(),
            properties: Ledger::standard(),
            current_player: 0,
            phase: TurnPhase::WaitingForPlayers,
            dice_roll: None,
            turn_actions: Vec::new(),
            last_card: None,
        }
    }

    /// A fresh game with its host seated in the first palette color
    pub fn with_host(id: PlayerId, name: String) -> Self {
        let mut game = Self::new();
        game.players
            .push(Player::new(id, name, PlayerColor::PALETTE[0], true));
        game
    }

    /// Get the number of players
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Get a player by ID
    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    fn get_player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    fn player_index(&self, id: PlayerId) -> Result<usize, GameError> {
        self.players
            .iter()
            .position(|p| p.id == id)
            .ok_or(GameError::UnknownPlayer)
    }

    /// ID of the player whose turn it is, once started
    pub fn current_player_id(&self) -> Option<PlayerId> {
        if !self.phase.is_started() {
            return None;
        }
        self.players.get(self.current_player).map(|p| p.id)
    }

    pub fn is_started(&self) -> bool {
        self.phase.is_started()
    }

    /// Check if the game is finished
    pub fn is_finished(&self) -> bool {
        self.phase.is_over()
    }

    /// Get the winner if the game is finished
    pub fn get_winner(&self) -> Option<PlayerId> {
        if let TurnPhase::GameOver { winner } = self.phase {
            Some(winner)
        } else {
            None
        }
    }

    // ==================== Lobby ====================

    /// Seat a new player with the lowest unused color
    pub fn add_player(
        &mut self,
        id: PlayerId,
        name: String,
        is_host: bool,
    ) -> Result<&Player, GameError> {
        if self.phase.is_started() {
            return Err(GameError::GameAlreadyStarted);
        }
        let used: Vec<PlayerColor> = self.players.iter().map(|p| p.color).collect();
        let color = PlayerColor::lowest_unused(&used).ok_or(GameError::NoColorAvailable)?;

        self.players.push(Player::new(id, name, color, is_host));
        Ok(&self.players[self.players.len() - 1])
    }

    /// Start the game with the first seated player
    pub fn start(&mut self) -> Result<(), GameError> {
        if self.phase.is_started() {
            return Err(GameError::GameAlreadyStarted);
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers);
        }
        self.current_player = 0;
        self.phase.transition(TurnPhase::AwaitingRoll)
    }

    /// Remove a player, returning their properties to the bank.
    ///
    /// If they held the turn, the turn passes to the next active player.
    pub fn remove_player(&mut self, id: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        let idx = self.player_index(id)?;
        let mut next = self.clone();
        let events = next.remove_player_inner(idx)?;
        *self = next;
        Ok(events)
    }

    fn remove_player_inner(&mut self, idx: usize) -> Result<Vec<GameEvent>, GameError> {
        let id = self.players[idx].id;
        let released = self.properties.release_all(id);
        let held_turn = self.phase.is_started() && idx == self.current_player;
        self.players.remove(idx);

        let mut events = vec![GameEvent::PlayerRemoved {
            player: id,
            released,
        }];

        if self.players.is_empty() || !self.phase.is_started() {
            self.current_player = 0;
            return Ok(events);
        }
        if self.phase.is_over() {
            return Ok(events);
        }

        if idx < self.current_player {
            self.current_player -= 1;
        } else if held_turn {
            self.current_player = self.first_active_from(idx % self.players.len());
            self.reset_turn();
            if self.phase != TurnPhase::AwaitingRoll {
                self.phase.transition(TurnPhase::TurnComplete)?;
                self.phase.transition(TurnPhase::AwaitingRoll)?;
            }
        }

        if let Some(winner) = self.sole_survivor() {
            self.phase.transition(TurnPhase::GameOver { winner })?;
            events.push(GameEvent::GameWon { player: winner });
        }

        Ok(events)
    }

    /// Mark a player's connection state
    pub fn set_connected(&mut self, id: PlayerId, connected: bool) -> Result<(), GameError> {
        let player = self.get_player_mut(id).ok_or(GameError::UnknownPlayer)?;
        player.connected = connected;
        Ok(())
    }

    // ==================== Queries ====================

    /// Get all currently valid actions for a player
    pub fn valid_actions(&self, player: PlayerId) -> Vec<GameAction> {
        let mut actions = Vec::new();
        if self.current_player_id() != Some(player) {
            return actions;
        }
        let Some(p) = self.get_player(player) else {
            return actions;
        };

        match self.phase {
            TurnPhase::AwaitingRoll => actions.push(GameAction::RollDice),
            TurnPhase::OpenActions => {
                // Can always end turn
                actions.push(GameAction::EndTurn);

                for property in self.properties.properties() {
                    let id = &property.id;
                    let candidates = [
                        GameAction::BuyProperty(id.clone()),
                        GameAction::SellProperty(id.clone()),
                        GameAction::MortgageProperty(id.clone()),
                        GameAction::UnmortgageProperty(id.clone()),
                        GameAction::BuildHouse(id.clone()),
                        GameAction::BuildHotel(id.clone()),
                    ];
                    for action in candidates {
                        let allowed = action
                            .ledger()
                            .is_some_and(|(kind, id)| self.properties.check(kind, id, p).is_ok());
                        if allowed {
                            actions.push(action);
                        }
                    }
                }
            }
            _ => {}
        }

        actions
    }

    // ==================== Actions ====================

    /// Apply an action to the game state using the thread RNG
    pub fn apply_action(
        &mut self,
        player: PlayerId,
        action: GameAction,
    ) -> Result<Vec<GameEvent>, GameError> {
        let mut rng = rand::thread_rng();
        self.apply_action_with_rng(player, action, &mut rng)
    }

    /// Apply an action to the game state.
    ///
    /// The action runs against a working copy; on error the state is left
    /// exactly as it was.
    pub fn apply_action_with_rng<R: Rng + ?Sized>(
        &mut self,
        player: PlayerId,
        action: GameAction,
        rng: &mut R,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.transact(player, rng, |game, idx, rng| match action {
            GameAction::RollDice => {
                let roll = (rng.gen_range(1..=6), rng.gen_range(1..=6));
                game.roll(idx, roll, rng)
            }
            GameAction::EndTurn => {
                if game.phase != TurnPhase::OpenActions {
                    return Err(GameError::InvalidPhase);
                }
                game.end_turn()
            }
            ref ledger_action => {
                if game.phase != TurnPhase::OpenActions {
                    return Err(GameError::InvalidPhase);
                }
                let Some((kind, property)) = ledger_action.ledger() else {
                    return Err(GameError::InvalidPhase);
                };
                let delta = game.properties.check(kind, property, &game.players[idx])?;
                game.properties.apply(&delta, &mut game.players[idx])?;
                Ok(vec![GameEvent::PropertyChanged {
                    player: delta.player,
                    property: delta.property,
                    action: delta.action,
                    cash_change: delta.cash_change,
                }])
            }
        })
    }

    /// Roll with fixed dice values, e.g. for scripted games
    pub fn roll_with_dice<R: Rng + ?Sized>(
        &mut self,
        player: PlayerId,
        roll: (u8, u8),
        rng: &mut R,
    ) -> Result<Vec<GameEvent>, GameError> {
        let valid = 1..=6;
        if !valid.contains(&roll.0) || !valid.contains(&roll.1) {
            return Err(GameError::InvalidDice);
        }
        self.transact(player, rng, |game, idx, rng| game.roll(idx, roll, rng))
    }

    /// End the current player's turn on the server's behalf (disconnects).
    pub fn force_end_turn(&mut self) -> Result<Vec<GameEvent>, GameError> {
        if !self.phase.is_started() {
            return Err(GameError::GameNotStarted);
        }
        if self.phase.is_over() {
            return Err(GameError::GameOver);
        }
        if !matches!(self.phase, TurnPhase::AwaitingRoll | TurnPhase::OpenActions) {
            return Err(GameError::InvalidPhase);
        }
        let mut next = self.clone();
        let events = next.end_turn()?;
        *self = next;
        Ok(events)
    }

    fn transact<R, F>(
        &mut self,
        player: PlayerId,
        rng: &mut R,
        f: F,
    ) -> Result<Vec<GameEvent>, GameError>
    where
        R: Rng + ?Sized,
        F: FnOnce(&mut GameState, usize, &mut R) -> Result<Vec<GameEvent>, GameError>,
    {
        // Check game not over
        if self.phase.is_over() {
            return Err(GameError::GameOver);
        }
        if !self.phase.is_started() {
            return Err(GameError::GameNotStarted);
        }
        let idx = self.player_index(player)?;
        if idx != self.current_player {
            return Err(GameError::NotYourTurn);
        }

        let mut next = self.clone();
        let events = f(&mut next, idx, rng)?;
        if next.phase.is_started() && !matches!(next.phase, TurnPhase::AwaitingRoll) {
            next.turn_actions
                .extend(events.iter().filter_map(GameEvent::describe));
        }
        *self = next;
        Ok(events)
    }

    // ==================== Turn Engine ====================

    fn roll<R: Rng + ?Sized>(
        &mut self,
        idx: usize,
        roll: (u8, u8),
        rng: &mut R,
    ) -> Result<Vec<GameEvent>, GameError> {
        if self.phase != TurnPhase::AwaitingRoll {
            return Err(GameError::InvalidPhase);
        }
        self.phase.transition(TurnPhase::ResolvingMove)?;

        let player = self.players[idx].id;
        let total = roll.0 + roll.1;
        self.dice_roll = Some(roll);

        let mut events = vec![GameEvent::DiceRolled {
            player,
            roll,
            total,
        }];

        if self.players[idx].in_jail && !self.try_leave_jail(idx, roll, &mut events) {
            self.phase.transition(TurnPhase::OpenActions)?;
            return Ok(events);
        }

        self.move_by(idx, total as i32, &mut events);
        self.resolve_landing(idx, total, rng, 0, &mut events)?;

        self.phase.transition(TurnPhase::OpenActions)?;
        Ok(events)
    }

    /// Returns `true` if the player is free to move this roll
    fn try_leave_jail(&mut self, idx: usize, roll: (u8, u8), events: &mut Vec<GameEvent>) -> bool {
        let player = &mut self.players[idx];
        let id = player.id;

        let via = if player.jail_free_tokens > 0 {
            player.jail_free_tokens -= 1;
            JailExit::JailFreeToken
        } else if roll.0 == roll.1 {
            JailExit::Doubles
        } else {
            player.jail_turns += 1;
            if player.jail_turns < MAX_JAIL_TURNS {
                events.push(GameEvent::StayedInJail {
                    player: id,
                    jail_turns: player.jail_turns,
                });
                return false;
            }
            player.adjust_cash(-JAIL_FINE);
            events.push(GameEvent::BankAdjusted {
                player: id,
                amount: -JAIL_FINE,
                reason: BankReason::JailFine,
            });
            JailExit::FinePaid
        };

        player.leave_jail();
        events.push(GameEvent::LeftJail { player: id, via });
        true
    }

    fn move_by(&mut self, idx: usize, steps: i32, events: &mut Vec<GameEvent>) {
        let player = &mut self.players[idx];
        let from = player.position;
        let (to, passed_go) = advance(from, steps);
        player.position = to;

        events.push(GameEvent::PlayerMoved {
            player: player.id,
            from,
            to,
            passed_go,
        });

        if passed_go {
            self.bank(idx, GO_SALARY, BankReason::Salary, events);
        }
    }

    fn bank(&mut self, idx: usize, amount: i64, reason: BankReason, events: &mut Vec<GameEvent>) {
        let player = &mut self.players[idx];
        player.adjust_cash(amount);
        events.push(GameEvent::BankAdjusted {
            player: player.id,
            amount,
            reason,
        });
    }

    fn resolve_landing<R: Rng + ?Sized>(
        &mut self,
        idx: usize,
        dice_total: u8,
        rng: &mut R,
        depth: u8,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        let player = self.players[idx].id;
        let position = self.players[idx].position;

        match Space::at(position) {
            Space::Property => {
                let Some(property) = self.properties.at_position(position) else {
                    return Ok(());
                };
                let Some(owner) = property.owner else {
                    return Ok(());
                };
                if owner == player {
                    return Ok(());
                }
                let amount = self.properties.rent_due(property, dice_total);
                if amount > 0 {
                    let property = property.id.clone();
                    let transfer = pay_rent(&mut self.players, player, owner, amount)?;
                    events.push(GameEvent::RentPaid {
                        from: transfer.from,
                        to: transfer.to,
                        property,
                        amount: transfer.amount,
                    });
                }
            }
            // Cards only draw on the roll's own landing, not after a card move
            Space::Chance | Space::CommunityChest if depth == 0 => {
                let category = if Space::at(position) == Space::Chance {
                    CardCategory::Chance
                } else {
                    CardCategory::Community
                };
                let card = cards::draw(category, rng).clone();
                events.push(GameEvent::CardDrawn {
                    player,
                    card: card.clone(),
                });
                self.apply_card(idx, &card, dice_total, rng, depth, events)?;
                self.last_card = Some(card);
            }
            Space::GoToJail => {
                self.players[idx].go_to_jail();
                events.push(GameEvent::SentToJail { player });
            }
            _ => {}
        }

        Ok(())
    }

    fn apply_card<R: Rng + ?Sized>(
        &mut self,
        idx: usize,
        card: &Card,
        dice_total: u8,
        rng: &mut R,
        depth: u8,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), GameError> {
        let player = self.players[idx].id;

        match card.effect() {
            CardEffect::AdvanceTo(target) => {
                let from = self.players[idx].position as i32;
                let steps = (target as i32 - from).rem_euclid(BOARD_SIZE as i32);
                self.move_by(idx, steps, events);
                self.resolve_landing(idx, dice_total, rng, depth + 1, events)?;
            }
            CardEffect::MoveBy(steps) => {
                self.move_by(idx, steps, events);
                self.resolve_landing(idx, dice_total, rng, depth + 1, events)?;
            }
            CardEffect::Money(amount) => self.bank(idx, amount, BankReason::Card, events),
            CardEffect::GoToJail => {
                self.players[idx].go_to_jail();
                events.push(GameEvent::SentToJail { player });
            }
            CardEffect::JailFree => {
                self.players[idx].jail_free_tokens += 1;
                events.push(GameEvent::JailFreeGranted { player });
            }
            CardEffect::Repairs {
                per_house,
                per_hotel,
            } => {
                let (houses, hotels) = self.properties.buildings_owned(player);
                let cost = houses as i64 * per_house + hotels as i64 * per_hotel;
                if cost > 0 {
                    self.bank(idx, -cost, BankReason::Repairs, events);
                }
            }
        }

        Ok(())
    }

    fn end_turn(&mut self) -> Result<Vec<GameEvent>, GameError> {
        self.phase.transition(TurnPhase::TurnComplete)?;

        let mut events = Vec::new();
        let idx = self.current_player;
        let player = self.players[idx].id;

        if self.players[idx].cash < 0 {
            self.declare_bankrupt(idx, &mut events);
        }

        self.reset_turn();

        if let Some(winner) = self.sole_survivor() {
            self.phase.transition(TurnPhase::GameOver { winner })?;
            events.push(GameEvent::GameWon { player: winner });
            return Ok(events);
        }

        self.current_player = self.first_active_from((idx + 1) % self.players.len());
        events.push(GameEvent::TurnEnded {
            player,
            next_player: self.players[self.current_player].id,
        });

        self.phase.transition(TurnPhase::AwaitingRoll)?;
        Ok(events)
    }

    fn declare_bankrupt(&mut self, idx: usize, events: &mut Vec<GameEvent>) {
        let id = self.players[idx].id;
        let released = self.properties.release_all(id);
        let player = &mut self.players[idx];
        player.properties.clear();
        player.bankrupt = true;
        player.leave_jail();
        events.push(GameEvent::PlayerBankrupt {
            player: id,
            released,
        });
    }

    fn reset_turn(&mut self) {
        self.turn_actions.clear();
        self.dice_roll = None;
        self.last_card = None;
    }

    /// First non-bankrupt player at or after `start`, wrapping
    fn first_active_from(&self, start: usize) -> usize {
        let n = self.players.len();
        (0..n)
            .map(|offset| (start + offset) % n)
            .find(|&i| self.players[i].is_active())
            .unwrap_or(start)
    }

    fn sole_survivor(&self) -> Option<PlayerId> {
        let mut active = self.players.iter().filter(|p| p.is_active());
        match (active.next(), active.next()) {
            (Some(p), None) => Some(p.id),
            _ => None,
        }
    }
}
