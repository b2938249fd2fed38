//! Steepest and first descent: pure improvement, stop at the first local
//! minimum.

use std::sync::Arc;

use rand::RngCore;

use crate::error::{EmptyNeighborhood, Error};
use crate::explore::{NeighborhoodExplorer, Selection};
use crate::model::SolutionManager;
use crate::params::ParameterBox;
use crate::runner::base::{MoveRunner, SearchPolicy};
use crate::runner::RunState;

/// Applies the best strictly improving move of the full neighborhood until
/// none exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct SteepestDescentPolicy;

impl<SM, NE> SearchPolicy<SM, NE> for SteepestDescentPolicy
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    fn register_parameters(&self, _params: &mut ParameterBox) {}

    fn initialize(
        &mut self,
        _input: &SM::Input,
        _sm: &SM,
        _ne: &NE,
        _params: &ParameterBox,
        _run: &RunState,
        _state: &SM::State,
        _rng: &mut dyn RngCore,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn stop(&self, run: &RunState) -> bool {
        run.iteration > 0 && !run.move_found
    }

    fn select(
        &mut self,
        input: &SM::Input,
        ne: &NE,
        state: &SM::State,
        _run: &RunState,
        weights: Option<&[f64]>,
        rng: &mut dyn RngCore,
    ) -> Result<Selection<NE::Move>, EmptyNeighborhood> {
        ne.select_best(input, state, weights, rng, |_, cost, _| *cost < 0.0)
    }
}

/// Applies the first strictly improving move encountered in enumeration
/// order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstDescentPolicy;

impl<SM, NE> SearchPolicy<SM, NE> for FirstDescentPolicy
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    fn register_parameters(&self, _params: &mut ParameterBox) {}

    fn initialize(
        &mut self,
        _input: &SM::Input,
        _sm: &SM,
        _ne: &NE,
        _params: &ParameterBox,
        _run: &RunState,
        _state: &SM::State,
        _rng: &mut dyn RngCore,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn stop(&self, run: &RunState) -> bool {
        run.iteration > 0 && !run.move_found
    }

    fn select(
        &mut self,
        input: &SM::Input,
        ne: &NE,
        state: &SM::State,
        _run: &RunState,
        weights: Option<&[f64]>,
        rng: &mut dyn RngCore,
    ) -> Result<Selection<NE::Move>, EmptyNeighborhood> {
        ne.select_first(input, state, weights, rng, |_, cost, _| *cost < 0.0)
    }
}

pub type SteepestDescent<SM, NE> = MoveRunner<SM, NE, SteepestDescentPolicy>;

impl<SM, NE> MoveRunner<SM, NE, SteepestDescentPolicy>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    pub fn new(sm: Arc<SM>, ne: Arc<NE>, name: &str) -> Self {
        MoveRunner::with_policy(sm, ne, name, SteepestDescentPolicy)
    }
}

pub type FirstDescent<SM, NE> = MoveRunner<SM, NE, FirstDescentPolicy>;

impl<SM, NE> MoveRunner<SM, NE, FirstDescentPolicy>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    pub fn new(sm: Arc<SM>, ne: Arc<NE>, name: &str) -> Self {
        MoveRunner::with_policy(sm, ne, name, FirstDescentPolicy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::Runner;
    use crate::testbed::{BitFlip, BitFlipManager};

    #[test]
    fn test_steepest_descent_clears_all_ones() {
        let sm = Arc::new(BitFlipManager::new());
        let ne = Arc::new(BitFlip::new());
        let mut runner = SteepestDescent::new(sm, ne, "sd");
        runner.set_seed(42);

        let mut state = vec![true; 5];
        let best = runner.go(&5, &mut state).unwrap();

        assert_eq!(best.total, 0.0);
        assert_eq!(state, vec![false; 5]);
        // One bit cleared per iteration; the lower bound stops the loop.
        assert_eq!(runner.iteration(), 5);
        assert_eq!(runner.iteration_of_best(), 5);
    }

    #[test]
    fn test_steepest_descent_stops_at_local_minimum() {
        let sm = Arc::new(BitFlipManager::new());
        let ne = Arc::new(BitFlip::new());
        let mut runner = SteepestDescent::new(sm, ne, "sd");
        runner.set_seed(1);

        // Already optimal: the first iteration finds no improving move.
        let mut state = vec![false; 4];
        let best = runner.go(&4, &mut state).unwrap();
        assert_eq!(best.total, 0.0);
    }

    #[test]
    fn test_first_descent_clears_all_ones() {
        let sm = Arc::new(BitFlipManager::new());
        let ne = Arc::new(BitFlip::new());
        let mut runner = FirstDescent::new(sm, ne, "fd");
        runner.set_seed(42);

        let mut state = vec![true; 6];
        let best = runner.go(&6, &mut state).unwrap();
        assert_eq!(best.total, 0.0);
        assert_eq!(runner.iteration(), 6);
    }

    #[test]
    fn test_first_descent_explores_less_than_steepest() {
        let sm = Arc::new(BitFlipManager::new());
        let ne = Arc::new(BitFlip::new());

        let mut steepest = SteepestDescent::new(Arc::clone(&sm), Arc::clone(&ne), "sd");
        steepest.set_seed(42);
        let mut state = vec![true; 8];
        steepest.go(&8, &mut state).unwrap();

        let mut first = FirstDescent::new(sm, ne, "fd");
        first.set_seed(42);
        let mut state = vec![true; 8];
        first.go(&8, &mut state).unwrap();

        // First descent stops each enumeration at the first improving
        // move; steepest always scans the whole neighborhood.
        assert!(first.evaluations() < steepest.evaluations());
    }

    #[test]
    fn test_max_evaluations_caps_the_run() {
        let sm = Arc::new(BitFlipManager::new());
        let ne = Arc::new(BitFlip::new());
        let mut runner = SteepestDescent::new(sm, ne, "sd");
        runner.set_seed(42);
        runner.params_mut().set_uint("max_evaluations", 10).unwrap();

        let mut state = vec![true; 64];
        runner.go(&64, &mut state).unwrap();
        // The cap is checked between iterations; a single select may finish
        // the neighborhood it started.
        assert!(runner.evaluations() <= 64 + 10);
        assert!(runner.iteration() <= 2);
    }

    #[test]
    fn test_clone_runner_copies_parameters() {
        let sm = Arc::new(BitFlipManager::new());
        let ne = Arc::new(BitFlip::new());
        let mut runner = SteepestDescent::new(sm, ne, "sd");
        runner.params_mut().set_uint("max_evaluations", 123).unwrap();

        let clone = runner.clone_runner();
        assert_eq!(clone.params().uint("max_evaluations").unwrap(), 123);
        assert_eq!(clone.name(), "sd");
    }
}
