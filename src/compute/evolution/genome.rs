//! Genetic operators on rule tables.
//!
//! Provides random generation, crossover, and mutation operations. Every
//! operator samples moves only among the directions a pattern leaves open,
//! so its output is wall-collision-free by construction.

use rand::Rng;
use rand::seq::IteratorRandom;

use crate::compute::RuleTable;
use crate::schema::{Action, Pattern};

/// Sample a wall-respecting action for `pattern`.
fn random_action<R: Rng + ?Sized>(rng: &mut R, pattern: Pattern, max_states: usize) -> Action {
    let direction = pattern
        .open_moves()
        .choose(rng)
        .unwrap_or_else(|| pattern.default_move());
    Action::new(direction, rng.gen_range(0..max_states))
}

impl RuleTable {
    /// Generate a random table.
    ///
    /// Panics if `max_states` is zero.
    pub fn random<R: Rng + ?Sized>(max_states: usize, rng: &mut R) -> Self {
        let table = Self::build(max_states, |_, pattern| {
            random_action(rng, pattern, max_states)
        });
        debug_assert!(table.validate().is_ok());
        table
    }

    /// Refill every slot with a random wall-respecting action.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let max_states = self.max_states();
        for state in 0..max_states {
            for pattern in Pattern::ALL {
                *self.slot_mut(state, pattern) = random_action(rng, pattern, max_states);
            }
        }
        debug_assert!(self.validate().is_ok());
    }

    /// Replace exactly one randomly chosen slot.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let max_states = self.max_states();
        let pattern = Pattern::ALL[rng.gen_range(0..Pattern::COUNT)];
        let state = rng.gen_range(0..max_states);
        *self.slot_mut(state, pattern) = random_action(rng, pattern, max_states);
    }

    /// Single-point crossover on the state axis with a random split.
    pub fn crossover<R: Rng + ?Sized>(&self, other: &RuleTable, rng: &mut R) -> RuleTable {
        let split = rng.gen_range(0..self.max_states());
        self.crossover_at(other, split)
    }

    /// Take states `0..=split` from `self` and the rest from `other`.
    pub fn crossover_at(&self, other: &RuleTable, split: usize) -> RuleTable {
        debug_assert_eq!(self.max_states(), other.max_states());
        Self::build(self.max_states(), |state, pattern| {
            if state <= split {
                self.action(state, pattern)
            } else {
                other.action(state, pattern)
            }
        })
    }
}

/// Fraction of slots in which two tables disagree.
pub fn table_distance(a: &RuleTable, b: &RuleTable) -> f64 {
    let total = a.len().max(b.len());
    if total == 0 {
        return 0.0;
    }
    let same = a.rules().zip(b.rules()).filter(|(x, y)| x == y).count();
    (total - same) as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ValidationError;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn wall_safe(table: &RuleTable) -> bool {
        table.rules().all(|r| !r.pattern.blocks(r.action.direction))
    }

    #[test]
    fn test_random_table() {
        let mut rng = StdRng::seed_from_u64(42);
        let table = RuleTable::random(5, &mut rng);
        assert_eq!(table.len(), 45);
        assert!(table.validate().is_ok());
        assert!(wall_safe(&table));
    }

    #[test]
    fn test_random_is_seed_deterministic() {
        let a = RuleTable::random(5, &mut StdRng::seed_from_u64(7));
        let b = RuleTable::random(5, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_randomize_in_place() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut table = RuleTable::filler(5).unwrap();
        table.randomize(&mut rng);
        assert!(table.validate().is_ok());
        assert!(table_distance(&table, &RuleTable::filler(5).unwrap()) > 0.0);
    }

    #[test]
    fn test_mutation_touches_one_slot() {
        let mut rng = StdRng::seed_from_u64(11);
        let original = RuleTable::random(5, &mut rng);
        for _ in 0..50 {
            let mut mutated = original.clone();
            mutated.mutate(&mut rng);
            let changed = original
                .rules()
                .zip(mutated.rules())
                .filter(|(a, b)| a != b)
                .count();
            assert!(changed <= 1);
            assert!(mutated.validate().is_ok());
        }
    }

    #[test]
    fn test_crossover_split() {
        let mut rng = StdRng::seed_from_u64(5);
        let a = RuleTable::random(5, &mut rng);
        let b = RuleTable::random(5, &mut rng);
        let child = a.crossover_at(&b, 1);
        for rule in child.rules() {
            let expected = if rule.state <= 1 { &a } else { &b };
            assert_eq!(
                Ok(rule.action),
                expected.lookup(rule.state, rule.pattern)
            );
        }
    }

    #[test]
    fn test_crossover_last_split_copies_self() {
        let mut rng = StdRng::seed_from_u64(5);
        let a = RuleTable::random(5, &mut rng);
        let b = RuleTable::random(5, &mut rng);
        assert_eq!(a.crossover_at(&b, 4), a);
    }

    #[test]
    fn test_table_distance() {
        let mut rng = StdRng::seed_from_u64(42);
        let a = RuleTable::random(5, &mut rng);
        let b = a.clone();
        let c = RuleTable::random(5, &mut rng);

        assert!(table_distance(&a, &b).abs() < 1e-12);
        assert!(table_distance(&a, &c) > 0.0);
        assert!(table_distance(&a, &c) <= 1.0);
    }

    proptest! {
        #[test]
        fn prop_operators_preserve_validity(seed in any::<u64>(), states in 1usize..8) {
            let mut rng = StdRng::seed_from_u64(seed);
            let a = RuleTable::random(states, &mut rng);
            let b = RuleTable::random(states, &mut rng);

            let mut child = a.crossover(&b, &mut rng);
            prop_assert_eq!(child.len(), states * Pattern::COUNT);
            let complete = !matches!(
                child.validate(),
                Err(ValidationError::IncompleteTable { .. })
            );
            prop_assert!(complete);

            child.mutate(&mut rng);
            prop_assert!(child.validate().is_ok());
            prop_assert!(wall_safe(&child));
        }

        #[test]
        fn prop_crossover_split(seed in any::<u64>(), split in 0usize..5) {
            let mut rng = StdRng::seed_from_u64(seed);
            let a = RuleTable::random(5, &mut rng);
            let b = RuleTable::random(5, &mut rng);
            let child = a.crossover_at(&b, split);
            for rule in child.rules() {
                let parent = if rule.state <= split { &a } else { &b };
                prop_assert_eq!(parent.lookup(rule.state, rule.pattern), Ok(rule.action));
            }
        }
    }
}
