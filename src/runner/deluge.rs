//! Great deluge: accept anything below a falling water level.

use std::sync::Arc;

use log::trace;
use rand::RngCore;

use crate::error::{EmptyNeighborhood, Error};
use crate::explore::{NeighborhoodExplorer, Selection};
use crate::model::SolutionManager;
use crate::params::ParameterBox;
use crate::runner::base::{MoveRunner, SearchPolicy};
use crate::runner::hill::SAMPLES;
use crate::runner::RunState;

/// Accepts improving moves and moves keeping the cost under the current
/// level; the level decays geometrically every `neighbors_sampled`
/// iterations and the run stops once it falls below `min_level` times the
/// best total.
#[derive(Debug, Clone, Default)]
pub struct GreatDelugePolicy {
    initial_level: f64,
    min_level: f64,
    level_rate: f64,
    neighbors_sampled: u64,
    level: f64,
}

impl GreatDelugePolicy {
    pub fn level(&self) -> f64 {
        self.level
    }
}

impl<SM, NE> SearchPolicy<SM, NE> for GreatDelugePolicy
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    fn register_parameters(&self, params: &mut ParameterBox) {
        params.register_float("initial_level", "Initial water level");
        params.register_float("min_level", "Minimum water level");
        params.register_float("level_rate", "Water decrease factor");
        params.register_uint(
            "neighbors_sampled",
            "Number of neighbors sampled at each water level",
        );
    }

    fn initialize(
        &mut self,
        _input: &SM::Input,
        _sm: &SM,
        _ne: &NE,
        params: &ParameterBox,
        run: &RunState,
        _state: &SM::State,
        _rng: &mut dyn RngCore,
    ) -> Result<(), Error> {
        self.initial_level = params.float("initial_level")?;
        self.min_level = params.float("min_level")?;
        self.level_rate = params.float("level_rate")?;
        self.neighbors_sampled = params.uint("neighbors_sampled")?;
        if self.initial_level <= 0.0 {
            return Err(Error::incorrect("initial_level", "should be greater than zero"));
        }
        if self.min_level <= 0.0 {
            return Err(Error::incorrect("min_level", "should be greater than zero"));
        }
        if self.level_rate <= 0.0 || self.level_rate >= 1.0 {
            return Err(Error::incorrect(
                "level_rate",
                "should be a value in the interval (0, 1)",
            ));
        }
        if self.neighbors_sampled == 0 {
            return Err(Error::incorrect(
                "neighbors_sampled",
                "should be greater than zero",
            ));
        }
        self.level = self.initial_level * run.current_cost.total;
        Ok(())
    }

    fn stop(&self, run: &RunState) -> bool {
        self.level < self.min_level * run.best_cost.total
    }

    fn select(
        &mut self,
        input: &SM::Input,
        ne: &NE,
        state: &SM::State,
        run: &RunState,
        weights: Option<&[f64]>,
        rng: &mut dyn RngCore,
    ) -> Result<Selection<NE::Move>, EmptyNeighborhood> {
        let level = self.level;
        let current = run.current_cost.total;
        ne.random_first(input, state, SAMPLES, weights, rng, move |_, cost, _| {
            *cost < 0.0 || *cost <= level - current
        })
    }

    fn complete_iteration(&mut self, run: &RunState) {
        if run.iteration % self.neighbors_sampled == 0 {
            self.level *= self.level_rate;
            trace!("great deluge level lowered to {}", self.level);
        }
    }

    fn status(&self) -> Option<String> {
        Some(format!("level = {}", self.level))
    }
}

pub type GreatDeluge<SM, NE> = MoveRunner<SM, NE, GreatDelugePolicy>;

impl<SM, NE> MoveRunner<SM, NE, GreatDelugePolicy>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    pub fn new(sm: Arc<SM>, ne: Arc<NE>, name: &str) -> Self {
        MoveRunner::with_policy(sm, ne, name, GreatDelugePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::runner::Runner;
    use crate::testbed::{BitFlip, BitFlipManager};

    fn runner() -> GreatDeluge<BitFlipManager, BitFlip> {
        let mut gd = GreatDeluge::new(
            Arc::new(BitFlipManager::new()),
            Arc::new(BitFlip::new()),
            "gd",
        );
        gd.set_seed(42);
        gd.params_mut().set_float("initial_level", 1.2).unwrap();
        gd.params_mut().set_float("min_level", 0.9).unwrap();
        gd.params_mut().set_float("level_rate", 0.98).unwrap();
        gd.params_mut().set_uint("neighbors_sampled", 10).unwrap();
        gd
    }

    #[test]
    fn test_level_rate_outside_unit_interval_is_rejected() {
        let mut gd = runner();
        gd.params_mut().set_float("level_rate", 1.5).unwrap();
        let mut state = vec![true; 4];
        match gd.go(&4, &mut state) {
            Err(Error::IncorrectParameterValue { flag, .. }) => assert_eq!(flag, "level_rate"),
            other => panic!("expected IncorrectParameterValue, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_level_parameter_is_reported() {
        let mut gd = GreatDeluge::new(
            Arc::new(BitFlipManager::new()),
            Arc::new(BitFlip::new()),
            "gd",
        );
        let mut state = vec![true; 4];
        assert!(matches!(gd.go(&4, &mut state), Err(Error::ParameterNotSet(_))));
    }

    #[test]
    fn test_great_deluge_reaches_the_optimum() {
        let mut gd = runner();
        let mut state = vec![true; 10];
        let best = gd.go(&10, &mut state).unwrap();
        assert_eq!(best.total, 0.0);
    }

    #[test]
    fn test_level_starts_proportional_to_initial_cost() {
        let mut gd = runner();
        // Stop immediately by exhausting the evaluation budget.
        gd.params_mut().set_uint("max_evaluations", 1).unwrap();
        let mut state = vec![true; 10];
        gd.go(&10, &mut state).unwrap();
        // initial cost 10, initial_level 1.2 → level ≈ 12 minus at most a
        // few decay steps.
        assert!(gd.policy().level() > 10.0);
    }
}
