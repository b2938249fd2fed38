//! The solution manager: state construction and full cost evaluation.

use std::sync::Arc;

use rand::RngCore;

use crate::cost::{Cost, HARD_WEIGHT};
use crate::error::Error;
use crate::model::components::CostComponent;

/// Neighborhood-independent operations on solutions.
///
/// Implementors provide state construction ([`random_state`] is mandatory,
/// greedy construction optional) and the list of registered cost
/// components; cost assembly, sampling and bound checks are provided.
///
/// [`random_state`]: SolutionManager::random_state
pub trait SolutionManager: Send + Sync {
    type Input;
    type State: Clone + Send;

    /// The registered cost components, in registration order. Component
    /// indices in [`Cost::components`] follow this order.
    fn components(&self) -> &[Arc<dyn CostComponent<Self::Input, Self::State>>];

    /// Generates a random state.
    fn random_state(&self, input: &Self::Input, rng: &mut dyn RngCore) -> Self::State;

    /// Generates a greedy state. Optional hook.
    fn greedy_state(
        &self,
        _input: &Self::Input,
        _rng: &mut dyn RngCore,
    ) -> Result<Self::State, Error> {
        Err(Error::NotImplemented("greedy_state"))
    }

    /// Greedy construction with a GRASP-style restricted candidate list:
    /// `alpha` widens the list by value, `k` caps it by rank. Defaults to
    /// plain [`greedy_state`](SolutionManager::greedy_state).
    fn greedy_state_rcl(
        &self,
        input: &Self::Input,
        _alpha: f64,
        _k: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Self::State, Error> {
        self.greedy_state(input, rng)
    }

    /// Evaluates the full cost of a state, segregating hard and soft
    /// components. When `weights` is given the result carries a weighted
    /// value `Σ wᵢ·cᵢ` with hard components additionally scaled by
    /// [`HARD_WEIGHT`]; missing weights default to 1.
    fn cost(&self, input: &Self::Input, state: &Self::State, weights: Option<&[f64]>) -> Cost {
        let ccs = self.components();
        let mut components = Vec::with_capacity(ccs.len());
        let mut violations = 0.0;
        let mut objective = 0.0;
        let mut weighted = weights.map(|_| 0.0);
        for (i, cc) in ccs.iter().enumerate() {
            let value = cc.cost(input, state);
            components.push(value);
            if cc.is_hard() {
                violations += value;
            } else {
                objective += value;
            }
            if let (Some(acc), Some(ws)) = (weighted.as_mut(), weights) {
                let scale = if cc.is_hard() { HARD_WEIGHT } else { 1.0 };
                *acc += ws.get(i).copied().unwrap_or(1.0) * scale * value;
            }
        }
        let mut cost = Cost::new(violations, objective, components);
        cost.weighted = weighted;
        cost
    }

    /// Draws `samples` random states and returns the best by cost ordering.
    /// At least one state is always drawn.
    fn sample_state(
        &self,
        input: &Self::Input,
        samples: u64,
        rng: &mut dyn RngCore,
    ) -> (Self::State, Cost) {
        let mut best = self.random_state(input, rng);
        let mut best_cost = self.cost(input, &best, None);
        for _ in 1..samples.max(1) {
            let state = self.random_state(input, rng);
            let cost = self.cost(input, &state, None);
            if cost < best_cost {
                best = state;
                best_cost = cost;
            }
        }
        (best, best_cost)
    }

    /// Whether the cost has reached the known lower bound. The default
    /// assumes zero is optimal.
    fn lower_bound_reached(&self, _input: &Self::Input, cost: &Cost) -> bool {
        cost.total == 0.0
    }

    /// Testing hook verifying the internal consistency of a state.
    fn check_consistency(&self, _input: &Self::Input, _state: &Self::State) -> bool {
        true
    }

    /// Distance between two states, for observers. Optional hook.
    fn state_distance(
        &self,
        _input: &Self::Input,
        _s1: &Self::State,
        _s2: &Self::State,
    ) -> Result<u32, Error> {
        Err(Error::NotImplemented("state_distance"))
    }
}
