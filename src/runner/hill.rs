//! Hill climbing: random move selection, sideways moves allowed.

use std::sync::Arc;

use rand::RngCore;

use crate::error::{EmptyNeighborhood, Error};
use crate::explore::{NeighborhoodExplorer, Selection};
use crate::model::SolutionManager;
use crate::params::ParameterBox;
use crate::runner::base::{MoveRunner, SearchPolicy};
use crate::runner::RunState;

/// Random draws per iteration.
pub(crate) const SAMPLES: u64 = 10;

/// Samples random moves and applies the first that improves or leaves the
/// cost unchanged; stops after `max_idle_iterations` without a strict
/// improvement of the best.
#[derive(Debug, Clone, Default)]
pub struct HillClimbingPolicy {
    max_idle_iterations: u64,
}

impl<SM, NE> SearchPolicy<SM, NE> for HillClimbingPolicy
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    fn register_parameters(&self, params: &mut ParameterBox) {
        params.register_uint(
            "max_idle_iterations",
            "Total number of allowed idle iterations",
        );
    }

    fn initialize(
        &mut self,
        _input: &SM::Input,
        _sm: &SM,
        _ne: &NE,
        params: &ParameterBox,
        _run: &RunState,
        _state: &SM::State,
        _rng: &mut dyn RngCore,
    ) -> Result<(), Error> {
        self.max_idle_iterations = params.uint("max_idle_iterations")?;
        Ok(())
    }

    fn stop(&self, run: &RunState) -> bool {
        run.idle_iterations() >= self.max_idle_iterations
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
        ne.random_first(input, state, SAMPLES, weights, rng, |_, cost, _| {
            *cost <= 0.0
        })
    }
}

pub type HillClimbing<SM, NE> = MoveRunner<SM, NE, HillClimbingPolicy>;

impl<SM, NE> MoveRunner<SM, NE, HillClimbingPolicy>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    pub fn new(sm: Arc<SM>, ne: Arc<NE>, name: &str) -> Self {
        MoveRunner::with_policy(sm, ne, name, HillClimbingPolicy::default())
    }
}
