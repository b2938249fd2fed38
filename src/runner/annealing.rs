//! Simulated annealing: Metropolis acceptance under a geometric cooling
//! schedule, with reheating and evaluation-budgeted variants.

use std::sync::Arc;

use log::trace;
use rand::{Rng, RngCore};

use crate::error::{EmptyNeighborhood, Error};
use crate::explore::{EvaluatedMove, NeighborhoodExplorer, Selection};
use crate::model::SolutionManager;
use crate::params::ParameterBox;
use crate::runner::base::{MoveRunner, SearchPolicy};
use crate::runner::RunState;

/// Moves sampled when deriving the start temperature from the cost
/// variance (van Laarhoven–Aarts).
const START_TEMPERATURE_SAMPLES: usize = 100;

/// Plain simulated annealing.
///
/// At each iteration random moves are drawn (within the per-temperature
/// sample quota) until one passes the Metropolis criterion; the
/// temperature drops by `cooling_rate` whenever either the sampled or the
/// accepted quota for the current temperature is reached. Iterations saved
/// by the acceptance cut-off are redistributed over the remaining
/// temperatures when the run is evaluation-bounded.
#[derive(Debug, Clone, Default)]
pub struct SimulatedAnnealingPolicy {
    // parameters, cached at initialization
    start_temperature: f64,
    min_temperature: f64,
    cooling_rate: f64,
    neighbors_accepted_ratio: f64,
    max_evaluations_set: bool,
    // quotas
    max_neighbors_sampled: u64,
    max_neighbors_accepted: u64,
    current_max_neighbors_sampled: u64,
    // dynamic state
    temperature: f64,
    neighbors_sampled: u64,
    neighbors_accepted: u64,
    number_of_temperatures: u64,
    total_number_of_temperatures: u64,
}

impl SimulatedAnnealingPolicy {
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn number_of_temperatures(&self) -> u64 {
        self.number_of_temperatures
    }

    pub fn total_number_of_temperatures(&self) -> u64 {
        self.total_number_of_temperatures
    }

    fn expected_temperatures(start: f64, min: f64, cooling_rate: f64) -> u64 {
        let count = (-(start / min).ln() / cooling_rate.ln()).ceil();
        (count as u64).max(1)
    }

    /// Start temperature from the variance of the delta costs of sampled
    /// random moves.
    fn variance_start_temperature<SM, NE>(
        input: &SM::Input,
        ne: &NE,
        state: &SM::State,
        weights: Option<&[f64]>,
        rng: &mut dyn RngCore,
    ) -> Result<f64, Error>
    where
        SM: SolutionManager,
        NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
    {
        let mut deltas = Vec::with_capacity(START_TEMPERATURE_SAMPLES);
        for _ in 0..START_TEMPERATURE_SAMPLES {
            let mv = ne.random_move(input, state, rng).map_err(|_| {
                Error::Logic(
                    "cannot compute a start temperature on an empty neighborhood".to_string(),
                )
            })?;
            deltas.push(ne.delta_cost(input, state, &mv, weights).total);
        }
        let mean = deltas.iter().sum::<f64>() / deltas.len() as f64;
        let variance = deltas
            .iter()
            .map(|d| (d - mean) * (d - mean))
            .sum::<f64>()
            / deltas.len() as f64;
        Ok(variance)
    }

    #[allow(clippy::too_many_arguments)]
    fn setup<SM, NE>(
        &mut self,
        input: &SM::Input,
        ne: &NE,
        params: &ParameterBox,
        run: &RunState,
        state: &SM::State,
        weights: Option<&[f64]>,
        rng: &mut dyn RngCore,
    ) -> Result<(), Error>
    where
        SM: SolutionManager,
        NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
    {
        let compute_start = if params.is_set("compute_start_temperature") {
            params.bool("compute_start_temperature")?
        } else {
            false
        };
        self.cooling_rate = params.float("cooling_rate")?;
        if self.cooling_rate <= 0.0 || self.cooling_rate >= 1.0 {
            return Err(Error::incorrect(
                "cooling_rate",
                "should be a value in the interval (0, 1)",
            ));
        }

        let sampled_set = params.is_set("max_neighbors_sampled");
        self.max_evaluations_set = params.is_set("max_evaluations");
        if sampled_set && self.max_evaluations_set {
            return Err(Error::incorrect(
                "max_neighbors_sampled",
                "should not be set explicitly when max_evaluations is set, as it is derived",
            ));
        }
        if !sampled_set && !self.max_evaluations_set {
            return Err(Error::incorrect(
                "max_neighbors_sampled",
                "should be set when max_evaluations is not",
            ));
        }

        let accepted_set = params.is_set("max_neighbors_accepted");
        let ratio_set = params.is_set("neighbors_accepted_ratio");
        if accepted_set && ratio_set {
            return Err(Error::incorrect(
                "max_neighbors_accepted",
                "should not be set explicitly when neighbors_accepted_ratio is set, as it is derived",
            ));
        }
        self.neighbors_accepted_ratio = if ratio_set {
            params.float("neighbors_accepted_ratio")?
        } else {
            1.0
        };

        if compute_start {
            if params.is_set("start_temperature") {
                return Err(Error::incorrect(
                    "start_temperature",
                    "should not be assigned, as it is computed",
                ));
            }
            self.start_temperature =
                Self::variance_start_temperature::<SM, NE>(input, ne, state, weights, rng)?;
        } else {
            self.start_temperature = params.float("start_temperature")?;
        }
        self.min_temperature = params.float("min_temperature")?;
        if self.min_temperature <= 0.0 {
            return Err(Error::incorrect(
                "min_temperature",
                "should be greater than zero",
            ));
        }
        if self.start_temperature < self.min_temperature {
            return Err(Error::incorrect(
                "start_temperature",
                "should be greater than min_temperature",
            ));
        }

        self.temperature = self.start_temperature;
        self.total_number_of_temperatures = Self::expected_temperatures(
            self.start_temperature,
            self.min_temperature,
            self.cooling_rate,
        );
        self.max_neighbors_sampled = if self.max_evaluations_set {
            run.max_evaluations / self.total_number_of_temperatures
        } else {
            params.uint("max_neighbors_sampled")?
        };
        self.current_max_neighbors_sampled = self.max_neighbors_sampled;
        self.max_neighbors_accepted = if accepted_set {
            params.uint("max_neighbors_accepted")?
        } else {
            (self.max_neighbors_sampled as f64 * self.neighbors_accepted_ratio) as u64
        };

        self.neighbors_sampled = 0;
        self.neighbors_accepted = 0;
        self.number_of_temperatures = 1;
        Ok(())
    }

    fn cooling_needed(&self) -> bool {
        self.neighbors_sampled >= self.current_max_neighbors_sampled
            || self.neighbors_accepted >= self.max_neighbors_accepted
    }

    /// Lowers the temperature and resets the per-temperature counters.
    /// When the accepted-quota cut-off saved samples and the run is
    /// evaluation-bounded, the residual evaluations are spread over the
    /// remaining temperatures.
    fn apply_cooling(&mut self, run: &RunState, rederive_accepted: bool) {
        let residual_temperatures = self
            .total_number_of_temperatures
            .saturating_sub(self.number_of_temperatures);
        if self.max_evaluations_set
            && self.neighbors_sampled < self.current_max_neighbors_sampled
            && residual_temperatures > 0
        {
            let residual_iterations = run.max_evaluations.saturating_sub(run.evaluations);
            self.current_max_neighbors_sampled = residual_iterations / residual_temperatures;
            if rederive_accepted {
                self.max_neighbors_accepted =
                    (self.max_neighbors_sampled as f64 * self.neighbors_accepted_ratio) as u64;
            }
        }
        trace!(
            "cooling to {} (temperature {} of {})",
            self.temperature * self.cooling_rate,
            self.number_of_temperatures + 1,
            self.total_number_of_temperatures
        );
        self.temperature *= self.cooling_rate;
        self.number_of_temperatures += 1;
        self.neighbors_sampled = 0;
        self.neighbors_accepted = 0;
    }

    fn sa_select<SM, NE>(
        &mut self,
        input: &SM::Input,
        ne: &NE,
        state: &SM::State,
        weights: Option<&[f64]>,
        rng: &mut dyn RngCore,
    ) -> Result<Selection<NE::Move>, EmptyNeighborhood>
    where
        SM: SolutionManager,
        NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
    {
        let remaining = self
            .current_max_neighbors_sampled
            .saturating_sub(self.neighbors_sampled);
        let t = self.temperature;
        let selection = ne.random_first(input, state, remaining, weights, rng, move |_, cost, rng| {
            let draw: f64 = rng.random::<f64>().max(f64::EPSILON);
            *cost <= 0.0 || *cost < -t * draw.ln()
        })?;
        self.neighbors_sampled += selection.explored;
        Ok(selection)
    }

    fn sa_status(&self) -> String {
        format!(
            "T = {} ({}/{}), S/A = [{}/{} | {}/{}]",
            self.temperature,
            self.number_of_temperatures,
            self.total_number_of_temperatures,
            self.neighbors_sampled,
            self.current_max_neighbors_sampled,
            self.neighbors_accepted,
            self.max_neighbors_accepted
        )
    }
}

impl<SM, NE> SearchPolicy<SM, NE> for SimulatedAnnealingPolicy
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    fn register_parameters(&self, params: &mut ParameterBox) {
        params.register_bool(
            "compute_start_temperature",
            "Should the runner compute the initial temperature?",
        );
        params.register_float("start_temperature", "Starting temperature");
        params.register_float("min_temperature", "Final temperature");
        params.register_float("cooling_rate", "Cooling rate");
        params.register_uint(
            "max_neighbors_sampled",
            "Maximum number of neighbors sampled at each temperature",
        );
        params.register_uint(
            "max_neighbors_accepted",
            "Maximum number of neighbors accepted at each temperature",
        );
        params.register_float("neighbors_accepted_ratio", "Ratio of neighbors accepted");
    }

    fn initialize(
        &mut self,
        input: &SM::Input,
        _sm: &SM,
        ne: &NE,
        params: &ParameterBox,
        run: &RunState,
        state: &SM::State,
        rng: &mut dyn RngCore,
    ) -> Result<(), Error> {
        self.setup::<SM, NE>(input, ne, params, run, state, None, rng)
    }

    fn stop(&self, _run: &RunState) -> bool {
        self.temperature <= self.min_temperature
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
        self.sa_select::<SM, NE>(input, ne, state, weights, rng)
    }

    fn complete_move(
        &mut self,
        _run: &RunState,
        _mv: &EvaluatedMove<NE::Move>,
        _rng: &mut dyn RngCore,
    ) {
        self.neighbors_accepted += 1;
    }

    fn complete_iteration(&mut self, run: &RunState) {
        if self.cooling_needed() {
            self.apply_cooling(run, false);
        }
    }

    fn status(&self) -> Option<String> {
        Some(self.sa_status())
    }
}

pub type SimulatedAnnealing<SM, NE> = MoveRunner<SM, NE, SimulatedAnnealingPolicy>;

impl<SM, NE> MoveRunner<SM, NE, SimulatedAnnealingPolicy>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    pub fn new(sm: Arc<SM>, ne: Arc<NE>, name: &str) -> Self {
        MoveRunner::with_policy(sm, ne, name, SimulatedAnnealingPolicy::default())
    }
}

/// Simulated annealing with reheating: when cumulative evaluations cross a
/// reheat milestone the temperature jumps back to a fraction of the start
/// temperature and the per-temperature quotas are re-derived; the run
/// stops after `max_reheats` reheats.
#[derive(Debug, Clone, Default)]
pub struct SimulatedAnnealingWithReheatingPolicy {
    sa: SimulatedAnnealingPolicy,
    first_reheat_ratio: f64,
    reheat_ratio: f64,
    max_reheats: u64,
    reheats: u64,
    first_descent_evaluations: u64,
    other_descents_evaluations: u64,
}

impl SimulatedAnnealingWithReheatingPolicy {
    pub fn reheats(&self) -> u64 {
        self.reheats
    }

    pub fn temperature(&self) -> f64 {
        self.sa.temperature
    }

    fn reheat_condition(&self, run: &RunState) -> bool {
        self.max_reheats != 0
            && run.evaluations
                >= self.first_descent_evaluations + self.other_descents_evaluations * self.reheats
    }
}

impl<SM, NE> SearchPolicy<SM, NE> for SimulatedAnnealingWithReheatingPolicy
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    fn register_parameters(&self, params: &mut ParameterBox) {
        SearchPolicy::<SM, NE>::register_parameters(&self.sa, params);
        params.register_float("first_reheat_ratio", "First reheat ratio");
        params.register_float("reheat_ratio", "Reheat ratio");
        params.register_float(
            "first_descent_evaluations_share",
            "First descent cost function evaluations share",
        );
        params.register_uint("max_reheats", "Maximum number of reheats");
    }

    fn initialize(
        &mut self,
        input: &SM::Input,
        sm: &SM,
        ne: &NE,
        params: &ParameterBox,
        run: &RunState,
        state: &SM::State,
        rng: &mut dyn RngCore,
    ) -> Result<(), Error> {
        self.sa.initialize(input, sm, ne, params, run, state, rng)?;
        self.reheats = 0;
        self.max_reheats = params.uint("max_reheats")?;
        if self.max_reheats > 0 {
            if !self.sa.max_evaluations_set {
                return Err(Error::incorrect(
                    "max_reheats",
                    "reheating requires max_evaluations to be set",
                ));
            }
            if self.max_reheats > 1 {
                self.reheat_ratio = params.float("reheat_ratio")?;
                if self.reheat_ratio <= 0.0 {
                    return Err(Error::incorrect(
                        "reheat_ratio",
                        "should be greater than zero",
                    ));
                }
                self.first_reheat_ratio = if params.is_set("first_reheat_ratio") {
                    params.float("first_reheat_ratio")?
                } else {
                    self.reheat_ratio
                };
            } else {
                self.first_reheat_ratio = params.float("first_reheat_ratio")?;
            }
            if self.first_reheat_ratio <= 0.0 {
                return Err(Error::incorrect(
                    "first_reheat_ratio",
                    "should be greater than zero",
                ));
            }
            let share = params.float("first_descent_evaluations_share")?;
            if share <= 0.0 || share > 1.0 {
                return Err(Error::incorrect(
                    "first_descent_evaluations_share",
                    "should be a value in the interval (0, 1]",
                ));
            }
            self.sa.max_neighbors_sampled =
                (self.sa.max_neighbors_sampled as f64 * share).ceil() as u64;
            self.sa.current_max_neighbors_sampled = self.sa.max_neighbors_sampled;
            self.first_descent_evaluations = (run.max_evaluations as f64 * share) as u64;
            self.other_descents_evaluations = run
                .max_evaluations
                .saturating_sub(self.first_descent_evaluations)
                / self.max_reheats;
        }
        self.sa.max_neighbors_accepted =
            (self.sa.max_neighbors_sampled as f64 * self.sa.neighbors_accepted_ratio).ceil() as u64;
        Ok(())
    }

    fn stop(&self, run: &RunState) -> bool {
        if self.max_reheats == 0 {
            return SearchPolicy::<SM, NE>::stop(&self.sa, run);
        }
        self.reheats > self.max_reheats
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
        <SimulatedAnnealingPolicy as SearchPolicy<SM, NE>>::select(&mut self.sa, input, ne, state, run, weights, rng)
    }

    fn complete_move(
        &mut self,
        run: &RunState,
        mv: &EvaluatedMove<NE::Move>,
        rng: &mut dyn RngCore,
    ) {
        SearchPolicy::<SM, NE>::complete_move(&mut self.sa, run, mv, rng);
        if self.reheat_condition(run) && self.reheats <= self.max_reheats {
            if self.reheats == 0 {
                self.sa.start_temperature *= self.first_reheat_ratio;
            } else if self.max_reheats > 1 {
                self.sa.start_temperature *= self.reheat_ratio;
            }
            self.sa.total_number_of_temperatures = SimulatedAnnealingPolicy::expected_temperatures(
                self.sa.start_temperature,
                self.sa.min_temperature,
                self.sa.cooling_rate,
            );
            self.sa.max_neighbors_sampled =
                self.other_descents_evaluations / self.sa.total_number_of_temperatures;
            self.sa.current_max_neighbors_sampled = self.sa.max_neighbors_sampled;
            self.sa.max_neighbors_accepted = self.sa.max_neighbors_sampled;
            self.reheats += 1;
            self.sa.temperature = self.sa.start_temperature;
            trace!("reheat {} to temperature {}", self.reheats, self.sa.temperature);
        }
    }

    fn complete_iteration(&mut self, run: &RunState) {
        SearchPolicy::<SM, NE>::complete_iteration(&mut self.sa, run);
    }

    fn status(&self) -> Option<String> {
        Some(format!(
            "{}, reheats = {}/{}",
            self.sa.sa_status(),
            self.reheats,
            self.max_reheats
        ))
    }
}

pub type SimulatedAnnealingWithReheating<SM, NE> =
    MoveRunner<SM, NE, SimulatedAnnealingWithReheatingPolicy>;

impl<SM, NE> MoveRunner<SM, NE, SimulatedAnnealingWithReheatingPolicy>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    pub fn new(sm: Arc<SM>, ne: Arc<NE>, name: &str) -> Self {
        MoveRunner::with_policy(
            sm,
            ne,
            name,
            SimulatedAnnealingWithReheatingPolicy::default(),
        )
    }
}

/// Simulated annealing whose per-temperature quotas are derived from a
/// fixed evaluation budget and the expected number of temperatures;
/// `max_neighbors_sampled` may not be set explicitly.
#[derive(Debug, Clone, Default)]
pub struct SimulatedAnnealingEvaluationBasedPolicy {
    sa: SimulatedAnnealingPolicy,
}

impl SimulatedAnnealingEvaluationBasedPolicy {
    pub fn temperature(&self) -> f64 {
        self.sa.temperature
    }
}

impl<SM, NE> SearchPolicy<SM, NE> for SimulatedAnnealingEvaluationBasedPolicy
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    fn register_parameters(&self, params: &mut ParameterBox) {
        SearchPolicy::<SM, NE>::register_parameters(&self.sa, params);
    }

    fn initialize(
        &mut self,
        input: &SM::Input,
        sm: &SM,
        ne: &NE,
        params: &ParameterBox,
        run: &RunState,
        state: &SM::State,
        rng: &mut dyn RngCore,
    ) -> Result<(), Error> {
        if params.is_set("max_neighbors_sampled") {
            return Err(Error::incorrect(
                "max_neighbors_sampled",
                "should not be set explicitly, as it is computed",
            ));
        }
        self.sa.initialize(input, sm, ne, params, run, state, rng)
    }

    fn stop(&self, run: &RunState) -> bool {
        SearchPolicy::<SM, NE>::stop(&self.sa, run)
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
        <SimulatedAnnealingPolicy as SearchPolicy<SM, NE>>::select(&mut self.sa, input, ne, state, run, weights, rng)
    }

    fn complete_move(
        &mut self,
        run: &RunState,
        mv: &EvaluatedMove<NE::Move>,
        rng: &mut dyn RngCore,
    ) {
        SearchPolicy::<SM, NE>::complete_move(&mut self.sa, run, mv, rng);
    }

    fn complete_iteration(&mut self, run: &RunState) {
        if self.sa.cooling_needed() {
            self.sa.apply_cooling(run, true);
        }
    }

    fn status(&self) -> Option<String> {
        Some(self.sa.sa_status())
    }
}

pub type SimulatedAnnealingEvaluationBased<SM, NE> =
    MoveRunner<SM, NE, SimulatedAnnealingEvaluationBasedPolicy>;

impl<SM, NE> MoveRunner<SM, NE, SimulatedAnnealingEvaluationBasedPolicy>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    pub fn new(sm: Arc<SM>, ne: Arc<NE>, name: &str) -> Self {
        MoveRunner::with_policy(
            sm,
            ne,
            name,
            SimulatedAnnealingEvaluationBasedPolicy::default(),
        )
    }
}
