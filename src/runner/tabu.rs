//! Tabu search: best (or first, or sampled) non-prohibited move, with the
//! accepted move inserted into the prohibition manager.

use std::sync::Arc;

use rand::RngCore;

use crate::error::{EmptyNeighborhood, Error};
use crate::explore::{EvaluatedMove, NeighborhoodExplorer, Selection};
use crate::model::SolutionManager;
use crate::params::ParameterBox;
use crate::prohibition::ProhibitionManager;
use crate::runner::base::{MoveRunner, SearchPolicy};
use crate::runner::RunState;

/// State and bookkeeping shared by the tabu search variants.
#[derive(Debug, Clone)]
struct TabuCore<P> {
    tabu: P,
    max_idle_iterations: u64,
}

impl<P> TabuCore<P> {
    fn new(tabu: P) -> Self {
        TabuCore {
            tabu,
            max_idle_iterations: 0,
        }
    }
}

impl<P> TabuCore<P> {
    fn register_parameters(&self, params: &mut ParameterBox) {
        params.register_uint("max_idle_iterations", "Maximum number of idle iterations");
        params.register_uint("min_tenure", "Minimum tabu tenure");
        params.register_uint("max_tenure", "Maximum tabu tenure");
    }

    fn initialize<M>(&mut self, params: &ParameterBox) -> Result<(), Error>
    where
        P: ProhibitionManager<M>,
    {
        self.max_idle_iterations = params.uint("max_idle_iterations")?;
        let min_set = params.is_set("min_tenure");
        let max_set = params.is_set("max_tenure");
        match (min_set, max_set) {
            (true, true) => {
                let min = params.uint("min_tenure")?;
                let max = params.uint("max_tenure")?;
                if min > max {
                    return Err(Error::incorrect(
                        "min_tenure",
                        "should not exceed max_tenure",
                    ));
                }
                self.tabu.set_tenure(min, max);
            }
            (false, false) => {}
            _ => {
                return Err(Error::incorrect(
                    "min_tenure",
                    "min_tenure and max_tenure must be set together",
                ));
            }
        }
        self.tabu.clean();
        Ok(())
    }

    fn stop(&self, run: &RunState) -> bool {
        run.idle_iterations() >= self.max_idle_iterations
    }

    fn complete_move<M: Clone>(
        &mut self,
        run: &RunState,
        mv: &EvaluatedMove<M>,
        rng: &mut dyn RngCore,
    ) where
        P: ProhibitionManager<M>,
    {
        self.tabu.insert_move(
            mv.mv.clone(),
            &mv.cost,
            &run.current_cost,
            &run.best_cost,
            rng,
        );
    }

    /// The list clock follows runner iterations, so tenures elapse even
    /// when every candidate move was prohibited.
    fn complete_iteration<M>(&mut self)
    where
        P: ProhibitionManager<M>,
    {
        self.tabu.update_iteration();
    }
}

/// Classic tabu search: the best non-prohibited move of the whole
/// neighborhood, worsening or not.
#[derive(Debug, Clone)]
pub struct TabuSearchPolicy<P> {
    core: TabuCore<P>,
}

impl<P> TabuSearchPolicy<P> {
    pub fn new(tabu: P) -> Self {
        TabuSearchPolicy {
            core: TabuCore::new(tabu),
        }
    }

    pub fn prohibition_manager(&self) -> &P {
        &self.core.tabu
    }
}

impl<SM, NE, P> SearchPolicy<SM, NE> for TabuSearchPolicy<P>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
    P: ProhibitionManager<NE::Move> + Clone + Send,
{
    fn register_parameters(&self, params: &mut ParameterBox) {
        self.core.register_parameters(params);
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
        self.core.initialize::<NE::Move>(params)
    }

    fn stop(&self, run: &RunState) -> bool {
        self.core.stop(run)
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
        let tabu = &self.core.tabu;
        ne.select_best(input, state, weights, rng, |mv, cost, _| {
            !tabu.prohibited(mv, cost)
        })
    }

    fn complete_move(
        &mut self,
        run: &RunState,
        mv: &EvaluatedMove<NE::Move>,
        rng: &mut dyn RngCore,
    ) {
        self.core.complete_move(run, mv, rng);
    }

    fn complete_iteration(&mut self, _run: &RunState) {
        self.core.complete_iteration::<NE::Move>();
    }

    fn status(&self) -> Option<String> {
        Some(self.core.tabu.status())
    }
}

/// First-improvement tabu search: the first non-prohibited move in
/// enumeration order.
#[derive(Debug, Clone)]
pub struct FirstImprovementTabuSearchPolicy<P> {
    core: TabuCore<P>,
}

impl<P> FirstImprovementTabuSearchPolicy<P> {
    pub fn new(tabu: P) -> Self {
        FirstImprovementTabuSearchPolicy {
            core: TabuCore::new(tabu),
        }
    }
}

impl<SM, NE, P> SearchPolicy<SM, NE> for FirstImprovementTabuSearchPolicy<P>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
    P: ProhibitionManager<NE::Move> + Clone + Send,
{
    fn register_parameters(&self, params: &mut ParameterBox) {
        self.core.register_parameters(params);
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
        self.core.initialize::<NE::Move>(params)
    }

    fn stop(&self, run: &RunState) -> bool {
        self.core.stop(run)
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
        let tabu = &self.core.tabu;
        ne.select_first(input, state, weights, rng, |mv, cost, _| {
            !tabu.prohibited(mv, cost)
        })
    }

    fn complete_move(
        &mut self,
        run: &RunState,
        mv: &EvaluatedMove<NE::Move>,
        rng: &mut dyn RngCore,
    ) {
        self.core.complete_move(run, mv, rng);
    }

    fn complete_iteration(&mut self, _run: &RunState) {
        self.core.complete_iteration::<NE::Move>();
    }

    fn status(&self) -> Option<String> {
        Some(self.core.tabu.status())
    }
}

/// Sampled tabu search: the best non-prohibited move among `samples`
/// random draws.
#[derive(Debug, Clone)]
pub struct SampleTabuSearchPolicy<P> {
    core: TabuCore<P>,
    samples: u64,
}

impl<P> SampleTabuSearchPolicy<P> {
    pub fn new(tabu: P) -> Self {
        SampleTabuSearchPolicy {
            core: TabuCore::new(tabu),
            samples: 0,
        }
    }
}

impl<SM, NE, P> SearchPolicy<SM, NE> for SampleTabuSearchPolicy<P>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
    P: ProhibitionManager<NE::Move> + Clone + Send,
{
    fn register_parameters(&self, params: &mut ParameterBox) {
        self.core.register_parameters(params);
        params.register_uint("samples", "Number of neighbors sampled at each iteration");
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
        self.core.initialize::<NE::Move>(params)?;
        self.samples = params.uint("samples")?;
        if self.samples == 0 {
            return Err(Error::incorrect("samples", "should be greater than zero"));
        }
        Ok(())
    }

    fn stop(&self, run: &RunState) -> bool {
        self.core.stop(run)
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
        let tabu = &self.core.tabu;
        ne.random_best(input, state, self.samples, weights, rng, |mv, cost, _| {
            !tabu.prohibited(mv, cost)
        })
    }

    fn complete_move(
        &mut self,
        run: &RunState,
        mv: &EvaluatedMove<NE::Move>,
        rng: &mut dyn RngCore,
    ) {
        self.core.complete_move(run, mv, rng);
    }

    fn complete_iteration(&mut self, _run: &RunState) {
        self.core.complete_iteration::<NE::Move>();
    }

    fn status(&self) -> Option<String> {
        Some(self.core.tabu.status())
    }
}

pub type TabuSearch<SM, NE, P> = MoveRunner<SM, NE, TabuSearchPolicy<P>>;

impl<SM, NE, P> MoveRunner<SM, NE, TabuSearchPolicy<P>>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
    P: ProhibitionManager<NE::Move> + Clone + Send,
{
    pub fn new(sm: Arc<SM>, ne: Arc<NE>, name: &str, tabu: P) -> Self {
        MoveRunner::with_policy(sm, ne, name, TabuSearchPolicy::new(tabu))
    }
}

pub type FirstImprovementTabuSearch<SM, NE, P> =
    MoveRunner<SM, NE, FirstImprovementTabuSearchPolicy<P>>;

impl<SM, NE, P> MoveRunner<SM, NE, FirstImprovementTabuSearchPolicy<P>>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
    P: ProhibitionManager<NE::Move> + Clone + Send,
{
    pub fn new(sm: Arc<SM>, ne: Arc<NE>, name: &str, tabu: P) -> Self {
        MoveRunner::with_policy(sm, ne, name, FirstImprovementTabuSearchPolicy::new(tabu))
    }
}

pub type SampleTabuSearch<SM, NE, P> = MoveRunner<SM, NE, SampleTabuSearchPolicy<P>>;

impl<SM, NE, P> MoveRunner<SM, NE, SampleTabuSearchPolicy<P>>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
    P: ProhibitionManager<NE::Move> + Clone + Send,
{
    pub fn new(sm: Arc<SM>, ne: Arc<NE>, name: &str, tabu: P) -> Self {
        MoveRunner::with_policy(sm, ne, name, SampleTabuSearchPolicy::new(tabu))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prohibition::TabuListManager;
    use crate::runner::Runner;
    use crate::testbed::{jump_inverse, BitFlip, BitFlipManager, Flip, Jump, RidgeManager, RidgeWalk};

    #[test]
    fn test_tabu_search_escapes_the_oscillation() {
        // Cost landscape [3, 2, 5, 0] on a line with ±1 jumps: plain
        // descent oscillates between positions 0 and 1; the tabu list
        // forces the climb over position 2 down to the optimum.
        let input = vec![3.0, 2.0, 5.0, 0.0];
        let sm = Arc::new(RidgeManager::new());
        let ne = Arc::new(RidgeWalk::new());
        let tabu: TabuListManager<Jump, _> = TabuListManager::new(1, 1, jump_inverse);
        let mut ts = TabuSearch::new(sm, ne, "ts", tabu);
        ts.set_seed(42);
        ts.params_mut().set_uint("max_idle_iterations", 10).unwrap();

        let mut state = 0usize;
        let best = ts.go(&input, &mut state).unwrap();
        assert_eq!(best.total, 0.0);
        assert_eq!(state, 3);
        assert!(ts.iteration() <= 3, "expected escape within 3 iterations");
    }

    #[test]
    fn test_tabu_search_accepts_worsening_moves() {
        let input = vec![3.0, 2.0, 5.0, 0.0];
        let sm = Arc::new(RidgeManager::new());
        let ne = Arc::new(RidgeWalk::new());
        let tabu: TabuListManager<Jump, _> = TabuListManager::new(2, 2, jump_inverse);
        let mut ts = TabuSearch::new(sm, ne, "ts", tabu);
        ts.set_seed(7);
        ts.params_mut().set_uint("max_idle_iterations", 10).unwrap();

        let mut state = 1usize;
        // Starting at the local optimum, the first move must worsen.
        let best = ts.go(&input, &mut state).unwrap();
        assert_eq!(best.total, 0.0);
    }

    #[test]
    fn test_tenure_parameters_override_the_manager() {
        let sm = Arc::new(BitFlipManager::new());
        let ne = Arc::new(BitFlip::new());
        let tabu: TabuListManager<Flip> = TabuListManager::same_move(1, 1);
        let mut ts = TabuSearch::new(sm, ne, "ts", tabu);
        ts.set_seed(42);
        ts.params_mut().set_uint("max_idle_iterations", 20).unwrap();
        ts.params_mut().set_uint("min_tenure", 2).unwrap();
        ts.params_mut().set_uint("max_tenure", 4).unwrap();

        let mut state = vec![true; 8];
        ts.go(&8, &mut state).unwrap();
        let manager = ts.policy().prohibition_manager();
        assert_eq!(manager.min_tenure(), 2);
        assert_eq!(manager.max_tenure(), 4);
    }

    #[test]
    fn test_one_sided_tenure_is_rejected() {
        let sm = Arc::new(BitFlipManager::new());
        let ne = Arc::new(BitFlip::new());
        let tabu: TabuListManager<Flip> = TabuListManager::same_move(1, 1);
        let mut ts = TabuSearch::new(sm, ne, "ts", tabu);
        ts.params_mut().set_uint("max_idle_iterations", 20).unwrap();
        ts.params_mut().set_uint("min_tenure", 2).unwrap();
        let mut state = vec![true; 4];
        assert!(matches!(
            ts.go(&4, &mut state),
            Err(crate::error::Error::IncorrectParameterValue { .. })
        ));
    }

    #[test]
    fn test_first_improvement_variant_escapes_the_oscillation() {
        let input = vec![3.0, 2.0, 5.0, 0.0];
        let sm = Arc::new(RidgeManager::new());
        let ne = Arc::new(RidgeWalk::new());
        let tabu: TabuListManager<Jump, _> = TabuListManager::new(2, 2, jump_inverse);
        let mut ts = FirstImprovementTabuSearch::new(sm, ne, "fits", tabu);
        ts.set_seed(42);
        ts.params_mut().set_uint("max_idle_iterations", 10).unwrap();

        let mut state = 0usize;
        let best = ts.go(&input, &mut state).unwrap();
        assert_eq!(best.total, 0.0);
        assert_eq!(state, 3);
    }

    #[test]
    fn test_sample_variant_requires_samples() {
        let sm = Arc::new(BitFlipManager::new());
        let ne = Arc::new(BitFlip::new());
        let tabu: TabuListManager<Flip> = TabuListManager::same_move(1, 3);
        let mut ts = SampleTabuSearch::new(sm, ne, "sts", tabu);
        ts.params_mut().set_uint("max_idle_iterations", 50).unwrap();
        let mut state = vec![true; 4];
        assert!(matches!(
            ts.go(&4, &mut state),
            Err(crate::error::Error::ParameterNotSet(_))
        ));
    }

    #[test]
    fn test_sample_variant_reaches_the_optimum() {
        let sm = Arc::new(BitFlipManager::new());
        let ne = Arc::new(BitFlip::new());
        let tabu: TabuListManager<Flip> = TabuListManager::same_move(1, 3);
        let mut ts = SampleTabuSearch::new(sm, ne, "sts", tabu);
        ts.set_seed(42);
        ts.params_mut().set_uint("max_idle_iterations", 200).unwrap();
        ts.params_mut().set_uint("samples", 16).unwrap();

        let mut state = vec![true; 6];
        let best = ts.go(&6, &mut state).unwrap();
        assert_eq!(best.total, 0.0);
    }
}
