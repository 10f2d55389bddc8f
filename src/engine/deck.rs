//! Draw-without-replacement deck with an infinite supply.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Mixes the reshuffle counter into the seed so each pass gets its own order.
const RESHUFFLE_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// A shuffled deck over a fixed item pool.
///
/// Items are drawn without replacement. The draw that empties the deck reshuffles the
/// whole pool and clears the used set, so the deck never runs dry unless the pool is
/// empty. Shuffles are deterministic in `(seed, reshuffles)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck<T> {
    pool: Vec<T>,
    /// Pool indices still to draw; the next draw takes the last one
    remaining: Vec<usize>,
    /// Pool indices drawn since the last reshuffle
    used: BTreeSet<usize>,
    seed: u64,
    reshuffles: u64,
}

impl<T: Clone> Deck<T> {
    pub fn new(pool: Vec<T>, seed: u64) -> Self {
        let mut deck = Self {
            pool,
            remaining: Vec::new(),
            used: BTreeSet::new(),
            seed,
            reshuffles: 0,
        };
        deck.refill();
        deck
    }

    fn refill(&mut self) {
        let mut rng = ChaCha8Rng::seed_from_u64(
            self.seed ^ self.reshuffles.wrapping_mul(RESHUFFLE_STRIDE),
        );
        self.remaining = (0..self.pool.len()).collect();
        self.remaining.shuffle(&mut rng);
        self.used.clear();
    }

    /// Draw the next item. Returns `None` only for an empty pool.
    pub fn draw(&mut self) -> Option<T> {
        let index = self.remaining.pop()?;
        self.used.insert(index);
        if self.remaining.is_empty() {
            self.reshuffles += 1;
            self.refill();
        }
        self.pool.get(index).cloned()
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    pub fn used(&self) -> usize {
        self.used.len()
    }

    pub fn reshuffles(&self) -> u64 {
        self.reshuffles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn empty_pool_yields_nothing() {
        let mut deck: Deck<u32> = Deck::new(Vec::new(), 7);
        assert_eq!(deck.draw(), None);
        assert_eq!(deck.reshuffles(), 0);
    }

    #[test]
    fn same_seed_same_order() {
        let pool: Vec<u32> = (0..20).collect();
        let mut a = Deck::new(pool.clone(), 99);
        let mut b = Deck::new(pool, 99);
        let first: Vec<_> = (0..45).filter_map(|_| a.draw()).collect();
        let second: Vec<_> = (0..45).filter_map(|_| b.draw()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn single_item_pool_repeats_forever() {
        let mut deck = Deck::new(vec!["mime"], 1);
        for _ in 0..5 {
            assert_eq!(deck.draw(), Some("mime"));
            assert_eq!(deck.remaining(), 1);
            assert_eq!(deck.used(), 0);
        }
    }

    proptest! {
        #[test]
        fn never_repeats_before_exhaustion(size in 1usize..40, seed in any::<u64>()) {
            let pool: Vec<usize> = (0..size).collect();
            let mut deck = Deck::new(pool, seed);
            let mut seen = HashSet::new();
            for drawn in 0..size {
                let item = deck.draw().unwrap();
                prop_assert!(seen.insert(item), "item {} repeated", item);
                if drawn + 1 < size {
                    prop_assert_eq!(deck.used(), drawn + 1);
                }
            }
            // The emptying draw reshuffled the full pool.
            prop_assert_eq!(deck.used(), 0);
            prop_assert_eq!(deck.remaining(), size);
            prop_assert_eq!(deck.reshuffles(), 1);
        }

        #[test]
        fn each_pass_is_a_permutation(size in 1usize..20, seed in any::<u64>(), passes in 1usize..4) {
            let pool: Vec<usize> = (0..size).collect();
            let mut deck = Deck::new(pool, seed);
            for _ in 0..passes {
                let mut pass: Vec<_> = (0..size).map(|_| deck.draw().unwrap()).collect();
                pass.sort_unstable();
                prop_assert_eq!(pass, (0..size).collect::<Vec<_>>());
            }
        }
    }
}
