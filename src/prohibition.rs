//! Tabu prohibition: list managers, tenure, aspiration, frequency.
//!
//! A prohibition manager decides which moves a tabu runner may not apply.
//! The list-based manager keeps recently accepted moves for a randomly
//! drawn tenure and forbids their inverses; the frequency-based variant
//! additionally forbids moves that have been applied too often.

use std::collections::HashMap;
use std::hash::Hash;

use rand::{Rng, RngCore};

use crate::cost::Cost;

/// Decides whether one move undoes another. The move stored in the list is
/// the second argument.
pub trait InverseRelation<M>: Send + Sync {
    fn inverse(&self, mv: &M, listed: &M) -> bool;
}

impl<M, F> InverseRelation<M> for F
where
    F: Fn(&M, &M) -> bool + Send + Sync,
{
    fn inverse(&self, mv: &M, listed: &M) -> bool {
        self(mv, listed)
    }
}

/// The default relation: a move is its own inverse.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameMoveInverse;

impl<M: PartialEq> InverseRelation<M> for SameMoveInverse {
    fn inverse(&self, mv: &M, listed: &M) -> bool {
        mv == listed
    }
}

/// A prohibited move with the iteration at which it leaves the list.
#[derive(Debug, Clone)]
pub struct TabuItem<M> {
    pub mv: M,
    pub out_iter: u64,
}

/// The contract tabu runners rely on.
pub trait ProhibitionManager<M>: Send {
    /// Updates the tenure range used for subsequent insertions.
    fn set_tenure(&mut self, min: u64, max: u64);

    /// Inserts an accepted move, purging expired entries, drawing its
    /// tenure uniformly from the configured range and recording the
    /// reference costs for aspiration. The clock advances through
    /// [`update_iteration`](ProhibitionManager::update_iteration) only, so
    /// tenures elapse even across iterations in which no move is accepted.
    fn insert_move(
        &mut self,
        mv: M,
        mv_cost: &Cost,
        current: &Cost,
        best: &Cost,
        rng: &mut dyn RngCore,
    );

    /// Whether the move may not be applied: it is (an inverse of) a listed
    /// move and the aspiration criterion does not override.
    fn prohibited(&self, mv: &M, mv_cost: &Cost) -> bool;

    /// Purges entries whose tenure has elapsed, then advances the
    /// iteration counter.
    fn update_iteration(&mut self);

    /// Empties the list and resets the iteration counter.
    fn clean(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short human-readable summary.
    fn status(&self) -> String;
}

/// FIFO tabu list with uniformly drawn tenure and cost-based aspiration.
#[derive(Debug, Clone)]
pub struct TabuListManager<M, R = SameMoveInverse> {
    relation: R,
    min_tenure: u64,
    max_tenure: u64,
    iteration: u64,
    list: Vec<TabuItem<M>>,
    current_cost: Cost,
    best_cost: Cost,
}

impl<M: PartialEq> TabuListManager<M, SameMoveInverse> {
    /// A manager using move equality as the inverse relation.
    pub fn same_move(min_tenure: u64, max_tenure: u64) -> Self {
        TabuListManager::new(min_tenure, max_tenure, SameMoveInverse)
    }
}

impl<M, R: InverseRelation<M>> TabuListManager<M, R> {
    pub fn new(min_tenure: u64, max_tenure: u64, relation: R) -> Self {
        TabuListManager {
            relation,
            min_tenure,
            max_tenure,
            iteration: 0,
            list: Vec::new(),
            current_cost: Cost::default(),
            best_cost: Cost::default(),
        }
    }

    pub fn min_tenure(&self) -> u64 {
        self.min_tenure
    }

    pub fn max_tenure(&self) -> u64 {
        self.max_tenure
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Whether the list holds a move the candidate is an inverse of.
    pub fn list_member(&self, mv: &M) -> bool {
        self.list.iter().any(|item| self.relation.inverse(mv, &item.mv))
    }

    /// The aspiration criterion: a prohibited move is allowed anyway when
    /// applying it to the current state would improve on the best.
    pub fn aspiration(&self, _mv: &M, mv_cost: &Cost) -> bool {
        self.current_cost.clone() + mv_cost.clone() < self.best_cost
    }

    fn purge(&mut self) {
        let iteration = self.iteration;
        self.list.retain(|item| item.out_iter > iteration);
    }

    fn draw_tenure(&self, rng: &mut dyn RngCore) -> u64 {
        if self.min_tenure >= self.max_tenure {
            self.min_tenure
        } else {
            rng.random_range(self.min_tenure..=self.max_tenure)
        }
    }
}

impl<M, R> ProhibitionManager<M> for TabuListManager<M, R>
where
    M: Send,
    R: InverseRelation<M>,
{
    fn set_tenure(&mut self, min: u64, max: u64) {
        self.min_tenure = min;
        self.max_tenure = max;
    }

    fn insert_move(
        &mut self,
        mv: M,
        _mv_cost: &Cost,
        current: &Cost,
        best: &Cost,
        rng: &mut dyn RngCore,
    ) {
        self.purge();
        let tenure = self.draw_tenure(rng);
        self.list.push(TabuItem {
            mv,
            out_iter: self.iteration + tenure,
        });
        self.current_cost = current.clone();
        self.best_cost = best.clone();
    }

    fn prohibited(&self, mv: &M, mv_cost: &Cost) -> bool {
        !self.aspiration(mv, mv_cost) && self.list_member(mv)
    }

    fn update_iteration(&mut self) {
        self.purge();
        self.iteration += 1;
    }

    fn clean(&mut self) {
        self.list.clear();
        self.iteration = 0;
        self.current_cost = Cost::default();
        self.best_cost = Cost::default();
    }

    fn len(&self) -> usize {
        self.list.len()
    }

    fn status(&self) -> String {
        format!("{} < {} < {}", self.min_tenure, self.list.len(), self.max_tenure)
    }
}

/// Tabu list augmented with move frequencies: beyond the list prohibition,
/// a move applied more than `threshold` of the iterations (after a warm-up
/// of `min_iter` iterations) is also forbidden.
#[derive(Debug, Clone)]
pub struct FrequencyTabuListManager<M: Eq + Hash + Clone, R = SameMoveInverse> {
    base: TabuListManager<M, R>,
    frequency: HashMap<M, u64>,
    threshold: f64,
    min_iter: u64,
}

impl<M: Eq + Hash + Clone, R: InverseRelation<M>> FrequencyTabuListManager<M, R> {
    pub fn new(min_tenure: u64, max_tenure: u64, relation: R) -> Self {
        FrequencyTabuListManager {
            base: TabuListManager::new(min_tenure, max_tenure, relation),
            frequency: HashMap::new(),
            threshold: 0.04,
            min_iter: 100,
        }
    }

    pub fn with_threshold(mut self, threshold: f64, min_iter: u64) -> Self {
        self.threshold = threshold;
        self.min_iter = min_iter;
        self
    }

    pub fn frequency(&self, mv: &M) -> u64 {
        self.frequency.get(mv).copied().unwrap_or(0)
    }
}

impl<M, R> ProhibitionManager<M> for FrequencyTabuListManager<M, R>
where
    M: Eq + Hash + Clone + Send,
    R: InverseRelation<M>,
{
    fn set_tenure(&mut self, min: u64, max: u64) {
        self.base.set_tenure(min, max);
    }

    fn insert_move(
        &mut self,
        mv: M,
        mv_cost: &Cost,
        current: &Cost,
        best: &Cost,
        rng: &mut dyn RngCore,
    ) {
        *self.frequency.entry(mv.clone()).or_insert(0) += 1;
        self.base.insert_move(mv, mv_cost, current, best, rng);
    }

    fn prohibited(&self, mv: &M, mv_cost: &Cost) -> bool {
        if self.base.aspiration(mv, mv_cost) {
            return false;
        }
        if self.base.list_member(mv) {
            return true;
        }
        if self.base.iteration > self.min_iter {
            if let Some(&count) = self.frequency.get(mv) {
                return count as f64 / self.base.iteration as f64 > self.threshold;
            }
        }
        false
    }

    fn update_iteration(&mut self) {
        self.base.update_iteration();
    }

    fn clean(&mut self) {
        self.base.clean();
        self.frequency.clear();
    }

    fn len(&self) -> usize {
        self.base.len()
    }

    fn status(&self) -> String {
        format!("{} ({} tracked moves)", self.base.status(), self.frequency.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn flat(total: f64) -> Cost {
        Cost::new(0.0, total, vec![total])
    }

    #[test]
    fn test_inserted_move_is_prohibited_within_tenure() {
        let mut tabu: TabuListManager<u32> = TabuListManager::same_move(3, 3);
        let mut rng = rng();
        tabu.insert_move(7, &flat(1.0), &flat(10.0), &flat(5.0), &mut rng);
        for _ in 0..2 {
            // Worsening candidate: aspiration cannot override.
            assert!(tabu.prohibited(&7, &flat(2.0)));
            tabu.update_iteration();
        }
        // After max_tenure + 1 advances the entry is purged.
        tabu.update_iteration();
        tabu.update_iteration();
        assert!(!tabu.prohibited(&7, &flat(2.0)));
        assert!(tabu.is_empty());
    }

    #[test]
    fn test_aspiration_overrides_prohibition() {
        let mut tabu: TabuListManager<u32> = TabuListManager::same_move(5, 5);
        let mut rng = rng();
        tabu.insert_move(7, &flat(1.0), &flat(10.0), &flat(8.0), &mut rng);
        // current + mv_cost = 10 - 3 = 7 < best = 8: aspiration holds.
        assert!(!tabu.prohibited(&7, &flat(-3.0)));
        // current + mv_cost = 10 - 1 = 9 >= best: still tabu.
        assert!(tabu.prohibited(&7, &flat(-1.0)));
    }

    #[test]
    fn test_custom_inverse_relation() {
        // Moves are (from, to) arcs; the inverse travels backwards.
        let relation =
            |mv: &(u8, u8), listed: &(u8, u8)| mv.0 == listed.1 && mv.1 == listed.0;
        let mut tabu = TabuListManager::new(4, 4, relation);
        let mut rng = rng();
        tabu.insert_move((0, 1), &flat(1.0), &flat(3.0), &flat(1.0), &mut rng);
        assert!(tabu.prohibited(&(1, 0), &flat(1.0)));
        assert!(!tabu.prohibited(&(0, 1), &flat(1.0)));
        assert!(!tabu.prohibited(&(1, 2), &flat(1.0)));
    }

    #[test]
    fn test_tenure_drawn_within_range() {
        let mut tabu: TabuListManager<u32> = TabuListManager::same_move(2, 6);
        let mut rng = rng();
        for mv in 0..50 {
            tabu.insert_move(mv, &flat(1.0), &flat(9.0), &flat(1.0), &mut rng);
        }
        // All insertions happened at iteration 0, so out_iter is the drawn
        // tenure itself.
        for item in &tabu.list {
            assert!(
                (2..=6).contains(&item.out_iter),
                "tenure {} out of range",
                item.out_iter
            );
        }
    }

    #[test]
    fn test_clean_resets_everything() {
        let mut tabu: TabuListManager<u32> = TabuListManager::same_move(3, 3);
        let mut rng = rng();
        tabu.insert_move(1, &flat(1.0), &flat(5.0), &flat(2.0), &mut rng);
        tabu.clean();
        assert_eq!(tabu.len(), 0);
        assert_eq!(tabu.iteration(), 0);
        assert!(!tabu.prohibited(&1, &flat(1.0)));
    }

    #[test]
    fn test_status_string() {
        let mut tabu: TabuListManager<u32> = TabuListManager::same_move(1, 4);
        let mut rng = rng();
        tabu.insert_move(1, &flat(1.0), &flat(5.0), &flat(2.0), &mut rng);
        assert_eq!(tabu.status(), "1 < 1 < 4");
    }

    #[test]
    fn test_frequency_prohibition_after_warm_up() {
        let mut tabu: FrequencyTabuListManager<u32> =
            FrequencyTabuListManager::new(1, 1, SameMoveInverse).with_threshold(0.25, 10);
        let mut rng = rng();
        // Insert move 3 in a quarter of many iterations.
        for i in 0..40u64 {
            if i % 3 == 0 {
                tabu.insert_move(3, &flat(1.0), &flat(100.0), &flat(1.0), &mut rng);
            } else {
                tabu.update_iteration();
            }
        }
        // 14/40 = 0.35 > 0.25 and the warm-up has passed; even when the
        // tenure has elapsed, the move stays prohibited.
        assert!(!tabu.base.list_member(&3) || tabu.len() <= 1);
        assert!(tabu.prohibited(&3, &flat(5.0)));
        // A rarely used move is not frequency-prohibited.
        assert!(!tabu.prohibited(&9, &flat(5.0)));
    }

    #[test]
    fn test_frequency_clean_clears_map() {
        let mut tabu: FrequencyTabuListManager<u32> =
            FrequencyTabuListManager::new(1, 1, SameMoveInverse);
        let mut rng = rng();
        tabu.insert_move(3, &flat(1.0), &flat(5.0), &flat(1.0), &mut rng);
        assert_eq!(tabu.frequency(&3), 1);
        tabu.clean();
        assert_eq!(tabu.frequency(&3), 0);
    }
}
