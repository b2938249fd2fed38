//! Late acceptance hill climbing: acceptance deferred against the cost
//! held a fixed number of steps earlier.

use std::sync::Arc;

use rand::RngCore;

use crate::cost::Cost;
use crate::error::{EmptyNeighborhood, Error};
use crate::explore::{EvaluatedMove, NeighborhoodExplorer, Selection};
use crate::model::SolutionManager;
use crate::params::ParameterBox;
use crate::runner::base::{MoveRunner, SearchPolicy};
use crate::runner::hill::SAMPLES;
use crate::runner::RunState;

/// Hill climbing with a circular queue of reference costs: a move is also
/// accepted when it does not worsen the cost recorded `steps` iterations
/// ago.
#[derive(Debug, Clone, Default)]
pub struct LateAcceptancePolicy {
    steps: u64,
    max_idle_iterations: u64,
    previous: Vec<Cost>,
}

impl<SM, NE> SearchPolicy<SM, NE> for LateAcceptancePolicy
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    fn register_parameters(&self, params: &mut ParameterBox) {
        params.register_uint(
            "max_idle_iterations",
            "Total number of allowed idle iterations",
        );
        params.register_uint_default("steps", "Delay (number of steps in the queue)", 10);
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
        self.max_idle_iterations = params.uint("max_idle_iterations")?;
        self.steps = params.uint("steps")?;
        if self.steps == 0 {
            return Err(Error::incorrect("steps", "should be greater than zero"));
        }
        // The queue starts filled with the initial state cost.
        self.previous = vec![run.current_cost.clone(); self.steps as usize];
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
        run: &RunState,
        weights: Option<&[f64]>,
        rng: &mut dyn RngCore,
    ) -> Result<Selection<NE::Move>, EmptyNeighborhood> {
        let slot = (run.iteration % self.steps) as usize;
        let threshold = self.previous[slot].clone() - run.current_cost.clone();
        ne.random_first(input, state, SAMPLES, weights, rng, move |_, cost, _| {
            *cost <= 0.0 || *cost <= threshold
        })
    }

    fn complete_move(
        &mut self,
        run: &RunState,
        _mv: &EvaluatedMove<NE::Move>,
        _rng: &mut dyn RngCore,
    ) {
        let slot = (run.iteration % self.steps) as usize;
        self.previous[slot] = run.best_cost.clone();
    }
}

pub type LateAcceptanceHillClimbing<SM, NE> = MoveRunner<SM, NE, LateAcceptancePolicy>;

impl<SM, NE> MoveRunner<SM, NE, LateAcceptancePolicy>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    pub fn new(sm: Arc<SM>, ne: Arc<NE>, name: &str) -> Self {
        MoveRunner::with_policy(sm, ne, name, LateAcceptancePolicy::default())
    }
}
