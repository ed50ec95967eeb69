//! Integration tests for the Tycoon game engine.
//!
//! These tests drive complete games through the public API and check the
//! properties that must hold after every accepted action.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tycoon_core::*;
use uuid::Uuid;

fn new_game(count: usize) -> (GameState, Vec<PlayerId>) {
    let mut game = GameState::new();
    let ids: Vec<PlayerId> = (0..count).map(|_| Uuid::new_v4()).collect();
    for (i, id) in ids.iter().enumerate() {
        game.add_player(*id, format!("Player {}", i + 1), i == 0)
            .unwrap();
    }
    game.start().unwrap();
    (game, ids)
}

/// Every property has at most one owner, and the owner's list agrees
fn assert_single_ownership(game: &GameState) {
    for property in game.properties.properties() {
        let holders: Vec<_> = game
            .players
            .iter()
            .filter(|p| p.owns(&property.id))
            .map(|p| p.id)
            .collect();
        assert!(holders.len() <= 1, "{} held by {:?}", property.id, holders);
        assert_eq!(holders.first().copied(), property.owner, "{}", property.id);
    }
}

fn total_cash(game: &GameState) -> i64 {
    game.players.iter().map(|p| p.cash).sum()
}

/// Net cash created or destroyed by the bank in a batch of events
fn bank_net(events: &[GameEvent]) -> i64 {
    events
        .iter()
        .map(|e| match e {
            GameEvent::BankAdjusted { amount, .. } => *amount,
            GameEvent::PropertyChanged { cash_change, .. } => *cash_change,
            _ => 0,
        })
        .sum()
}

/// Play one turn: roll, take whatever ledger action the RNG picks, end turn
fn play_turn(game: &mut GameState, rng: &mut StdRng) -> Vec<GameEvent> {
    let player = game.current_player_id().unwrap();
    let mut events = game
        .apply_action_with_rng(player, GameAction::RollDice, rng)
        .unwrap();

    let options: Vec<GameAction> = game
        .valid_actions(player)
        .into_iter()
        .filter(|a| *a != GameAction::EndTurn)
        .collect();
    if !options.is_empty() && rng.gen_bool(0.5) {
        let action = options[rng.gen_range(0..options.len())].clone();
        events.extend(game.apply_action_with_rng(player, action, rng).unwrap());
    }

    events.extend(
        game.apply_action_with_rng(player, GameAction::EndTurn, rng)
            .unwrap(),
    );
    events
}

#[test]
fn test_turn_order_is_n_mod_m() {
    for m in 2..=4 {
        let (mut game, _) = new_game(m);
        let mut rng = StdRng::seed_from_u64(m as u64);

        for n in 1..=12 {
            let player = game.current_player_id().unwrap();
            // Keep everyone solvent so nobody is skipped
            for p in game.players.iter_mut() {
                p.cash = p.cash.max(10_000);
            }
            game.apply_action_with_rng(player, GameAction::RollDice, &mut rng)
                .unwrap();
            game.apply_action_with_rng(player, GameAction::EndTurn, &mut rng)
                .unwrap();
            assert_eq!(game.current_player, n % m);
        }
    }
}

#[test]
fn test_cash_is_conserved_between_players() {
    let (mut game, _) = new_game(4);
    let mut rng = StdRng::seed_from_u64(2024);

    for _ in 0..200 {
        if game.is_finished() {
            break;
        }
        let before = total_cash(&game);
        let events = play_turn(&mut game, &mut rng);

        // Bankrupt players keep their (negative) cash on the books
        assert_eq!(
            total_cash(&game) - before,
            bank_net(&events),
            "rent transfers must net to zero"
        );
        assert_single_ownership(&game);
    }
}

#[test]
fn test_rent_transfer_is_exact() {
    let (mut game, ids) = new_game(2);
    let mut rng = StdRng::seed_from_u64(9);

    // Alice rolls onto Baltic and buys it
    game.roll_with_dice(ids[0], (1, 2), &mut rng).unwrap();
    game.apply_action(ids[0], GameAction::BuyProperty("baltic".into()))
        .unwrap();
    game.apply_action(ids[0], GameAction::EndTurn).unwrap();

    let (alice, bob) = (game.players[0].cash, game.players[1].cash);
    let events = game.roll_with_dice(ids[1], (2, 1), &mut rng).unwrap();

    assert!(events.contains(&GameEvent::RentPaid {
        from: ids[1],
        to: ids[0],
        property: "baltic".into(),
        amount: 4
    }));
    assert_eq!(game.players[0].cash, alice + 4);
    assert_eq!(game.players[1].cash, bob - 4);
}

#[test]
fn test_full_game_reaches_game_over() {
    let (mut game, ids) = new_game(3);
    let mut rng = StdRng::seed_from_u64(77);

    // Drain two players so the game must end within a few turns
    game.players[1].cash = -500;
    game.players[2].cash = -500;

    let mut turns = 0;
    while !game.is_finished() && turns < 20 {
        let player = game.current_player_id().unwrap();
        game.apply_action_with_rng(player, GameAction::RollDice, &mut rng)
            .unwrap();
        if player != ids[0] {
            game.players.iter_mut().find(|p| p.id == player).unwrap().cash = -500;
        }
        game.apply_action_with_rng(player, GameAction::EndTurn, &mut rng)
            .unwrap();
        turns += 1;
    }

    assert_eq!(game.get_winner(), Some(ids[0]));
    assert!(game.players[1].bankrupt);
    assert!(game.players[2].bankrupt);
    assert!(game.valid_actions(ids[0]).is_empty());
}

#[test]
fn test_player_leaving_releases_properties() {
    let (mut game, ids) = new_game(3);
    let mut rng = StdRng::seed_from_u64(3);

    game.roll_with_dice(ids[0], (1, 2), &mut rng).unwrap();
    game.apply_action(ids[0], GameAction::BuyProperty("baltic".into()))
        .unwrap();
    game.apply_action(ids[0], GameAction::BuildHouse("baltic".into()))
        .unwrap();
    game.apply_action(ids[0], GameAction::EndTurn).unwrap();

    game.remove_player(ids[0]).unwrap();

    let baltic = game.properties.get("baltic").unwrap();
    assert_eq!(baltic.owner, None);
    assert_eq!(baltic.houses, 0);
    // Bob held the turn at index 1, now index 0
    assert_eq!(game.current_player_id(), Some(ids[1]));
    assert_single_ownership(&game);
}

#[test]
fn test_snapshot_restores_mid_game() {
    let (mut game, ids) = new_game(2);
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..6 {
        play_turn(&mut game, &mut rng);
    }

    let meta = RoomMeta {
        id: "TYCOON".into(),
        host_id: ids[0],
        max_players: 2,
        created_at: 1,
        version: 13,
    };
    let json = serde_json::to_string(&RoomSnapshot::capture(&meta, &game)).unwrap();
    let snapshot: RoomSnapshot = serde_json::from_str(&json).unwrap();
    let (_, restored) = snapshot.restore();

    assert_eq!(restored, game);
}
