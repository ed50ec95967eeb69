//! Chance and Community Chest cards.
//!
//! Cards are static data. Drawing samples uniformly with replacement, so the
//! deck itself never changes; a card only has an effect once the game
//! interprets it through [`Card::effect`].

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Repair cost per house for the repairs card
pub const REPAIR_COST_PER_HOUSE: i64 = 25;

/// Repair cost per hotel for the repairs card
pub const REPAIR_COST_PER_HOTEL: i64 = 100;

/// Which pile a card comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardCategory {
    Chance,
    Community,
}

/// The action tag printed on a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardAction {
    Move,
    Money,
    Jail,
    JailFree,
    Repair,
}

/// A single card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: Cow<'static, str>,
    pub category: CardCategory,
    pub title: Cow<'static, str>,
    pub description: Cow<'static, str>,
    pub action: CardAction,
    pub value: Option<i64>,
}

/// What a card does once interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardEffect {
    /// Move forward to an absolute position, collecting salary if GO is passed
    AdvanceTo(u8),
    /// Move a signed number of spaces
    MoveBy(i32),
    /// Bank pays (positive) or collects (negative)
    Money(i64),
    GoToJail,
    JailFree,
    Repairs { per_house: i64, per_hotel: i64 },
}

impl Card {
    /// Interpret the action tag and value.
    ///
    /// A move card with value 0 advances to GO; any other value is a
    /// relative step.
    pub fn effect(&self) -> CardEffect {
        let value = self.value.unwrap_or(0);
        match self.action {
            CardAction::Move if value == 0 => CardEffect::AdvanceTo(crate::board::GO_POSITION),
            CardAction::Move => CardEffect::MoveBy(value as i32),
            CardAction::Money => CardEffect::Money(value),
            CardAction::Jail => CardEffect::GoToJail,
            CardAction::JailFree => CardEffect::JailFree,
            CardAction::Repair => CardEffect::Repairs {
                per_house: REPAIR_COST_PER_HOUSE,
                per_hotel: REPAIR_COST_PER_HOTEL,
            },
        }
    }
}

const fn card(
    id: &'static str,
    category: CardCategory,
    title: &'static str,
    description: &'static str,
    action: CardAction,
    value: Option<i64>,
) -> Card {
    Card {
        id: Cow::Borrowed(id),
        category,
        title: Cow::Borrowed(title),
        description: Cow::Borrowed(description),
        action,
        value,
    }
}

static CHANCE_CARDS: [Card; 5] = [
    card("c1", CardCategory::Chance, "Advance to GO", "Advance to GO (Collect $200)", CardAction::Move, Some(0)),
    card("c2", CardCategory::Chance, "Bank Dividend", "Bank pays you dividend of $50", CardAction::Money, Some(50)),
    card("c3", CardCategory::Chance, "Go Back 3", "Go back 3 spaces", CardAction::Move, Some(-3)),
    card("c4", CardCategory::Chance, "Go to Jail", "Go directly to Jail", CardAction::Jail, None),
    card("c5", CardCategory::Chance, "Property Repairs", "Make repairs: $25 per house, $100 per hotel", CardAction::Repair, None),
];

static COMMUNITY_CARDS: [Card; 5] = [
    card("cc1", CardCategory::Community, "Bank Error", "Bank error in your favor - Collect $200", CardAction::Money, Some(200)),
    card("cc2", CardCategory::Community, "Doctor Fee", "Doctor's fee - Pay $50", CardAction::Money, Some(-50)),
    card("cc3", CardCategory::Community, "Sale of Stock", "From sale of stock you get $50", CardAction::Money, Some(50)),
    card("cc4", CardCategory::Community, "Get Out of Jail", "Get out of jail free", CardAction::JailFree, None),
    card("cc5", CardCategory::Community, "Holiday Fund", "Holiday fund matures - Receive $100", CardAction::Money, Some(100)),
];

/// The fixed card list for a category
pub fn cards(category: CardCategory) -> &'static [Card] {
    match category {
        CardCategory::Chance => &CHANCE_CARDS,
        CardCategory::Community => &COMMUNITY_CARDS,
    }
}

/// Draw a card uniformly at random, with replacement
pub fn draw<R: Rng + ?Sized>(category: CardCategory, rng: &mut R) -> &'static Card {
    let pile = cards(category);
    pile.choose(rng).unwrap_or(&pile[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_draw_stays_in_category() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            assert_eq!(draw(CardCategory::Chance, &mut rng).category, CardCategory::Chance);
            assert_eq!(
                draw(CardCategory::Community, &mut rng).category,
                CardCategory::Community
            );
        }
    }

    #[test]
    fn test_draw_samples_with_replacement() {
        let mut rng = StdRng::seed_from_u64(42);
        let seen: HashSet<_> = (0..200)
            .map(|_| draw(CardCategory::Chance, &mut rng).id.clone())
            .collect();
        // Every card remains drawable; the deck never depletes
        assert_eq!(seen.len(), cards(CardCategory::Chance).len());
        assert_eq!(cards(CardCategory::Chance).len(), 5);
    }

    #[test]
    fn test_card_effects() {
        let chance = cards(CardCategory::Chance);
        assert_eq!(chance[0].effect(), CardEffect::AdvanceTo(0));
        assert_eq!(chance[1].effect(), CardEffect::Money(50));
        assert_eq!(chance[2].effect(), CardEffect::MoveBy(-3));
        assert_eq!(chance[3].effect(), CardEffect::GoToJail);
        assert_eq!(
            chance[4].effect(),
            CardEffect::Repairs {
                per_house: 25,
                per_hotel: 100
            }
        );

        let community = cards(CardCategory::Community);
        assert_eq!(community[1].effect(), CardEffect::Money(-50));
        assert_eq!(community[3].effect(), CardEffect::JailFree);
    }

    #[test]
    fn test_card_serializes_round_trip() {
        let card = &cards(CardCategory::Community)[0];
        let json = serde_json::to_string(card).unwrap();
        let back: Card = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, card);
    }
}
