//! The full card pool and local dealing helpers.
//!
//! The server owns the real deck; these are for previews and practice
//! hands that never leave the client.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::game::{CardType, KoreanCard};

pub const CONSONANT_COUNT: u32 = 15;
pub const VOWEL_COUNT: u32 = 10;
pub const POINTS: [u32; 3] = [2, 3, 4];
pub const DEFAULT_HAND_SIZE: usize = 8;

/// Every card there is: 15 consonants and 10 vowels, each at 2, 3 and 4
/// points (75 cards), consonants first.
pub fn all_cards() -> Vec<KoreanCard> {
    let kinds = [
        (CardType::Consonant, CONSONANT_COUNT),
        (CardType::Vowel, VOWEL_COUNT),
    ];
    let mut cards = Vec::with_capacity(((CONSONANT_COUNT + VOWEL_COUNT) as usize) * POINTS.len());
    for (card_type, count) in kinds {
        for n in 1..=count {
            let value = format!("{n:02}");
            for point in POINTS {
                cards.push(KoreanCard {
                    id: format!("{}_{value}_{point}", type_slug(card_type)),
                    card_type,
                    value: value.clone(),
                    point,
                });
            }
        }
    }
    cards
}

/// Shuffle in place (Fisher-Yates).
pub fn shuffle_cards<R: Rng + ?Sized>(cards: &mut [KoreanCard], rng: &mut R) {
    cards.shuffle(rng);
}

/// `count` distinct cards drawn from a freshly shuffled pool. Capped at
/// the size of the pool.
pub fn random_hand<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<KoreanCard> {
    let mut pool = all_cards();
    shuffle_cards(&mut pool, rng);
    pool.truncate(count);
    pool
}

/// Asset path of the card face, e.g. `/assets/cards/vowel_03_4.svg`.
pub fn image_path(card: &KoreanCard) -> String {
    format!(
        "/assets/cards/{}_{}_{}.svg",
        type_slug(card.card_type),
        card.value,
        card.point
    )
}

fn type_slug(card_type: CardType) -> &'static str {
    match card_type {
        CardType::Consonant => "consonant",
        CardType::Vowel => "vowel",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn pool_has_seventy_five_unique_cards() {
        let cards = all_cards();
        assert_eq!(cards.len(), 75);
        assert_eq!(cards.iter().filter(|c| c.card_type == CardType::Consonant).count(), 45);
        assert_eq!(cards.iter().filter(|c| c.card_type == CardType::Vowel).count(), 30);

        let ids: HashSet<&str> = cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), 75);

        assert_eq!(cards[0].id, "consonant_01_2");
        assert_eq!(cards[74].id, "vowel_10_4");
    }

    #[test]
    fn seeded_shuffle_is_a_reproducible_permutation() {
        let mut a = all_cards();
        let mut b = all_cards();
        shuffle_cards(&mut a, &mut StdRng::seed_from_u64(42));
        shuffle_cards(&mut b, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
        assert_ne!(a, all_cards());

        let mut sorted: Vec<String> = a.into_iter().map(|c| c.id).collect();
        sorted.sort();
        let mut expected: Vec<String> = all_cards().into_iter().map(|c| c.id).collect();
        expected.sort();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn random_hand_deals_distinct_cards() {
        let mut rng = StdRng::seed_from_u64(7);
        let hand = random_hand(DEFAULT_HAND_SIZE, &mut rng);
        assert_eq!(hand.len(), 8);
        let ids: HashSet<&str> = hand.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), 8);

        assert_eq!(random_hand(500, &mut rng).len(), 75);
        assert!(random_hand(0, &mut rng).is_empty());
    }

    #[test]
    fn image_path_follows_asset_naming() {
        let card = KoreanCard {
            id: "vowel_03_4".into(),
            card_type: CardType::Vowel,
            value: "03".into(),
            point: 4,
        };
        assert_eq!(image_path(&card), "/assets/cards/vowel_03_4.svg");
    }
}
