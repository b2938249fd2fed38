//! The shared move-runner loop and the policy contract the concrete
//! algorithms implement.

use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};

use log::debug;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::cost::Cost;
use crate::error::{EmptyNeighborhood, Error};
use crate::explore::{EvaluatedMove, NeighborhoodExplorer, Selection};
use crate::interrupt::Interrupt;
use crate::model::SolutionManager;
use crate::params::ParameterBox;
use crate::runner::{RunObserver, RunState, Runner, SharedBest};

/// The per-algorithm behavior table: how moves are selected, when the
/// search stops, and what bookkeeping follows an accepted move or a
/// completed iteration.
///
/// Policies own their algorithm parameters (registered into the runner's
/// [`ParameterBox`]) and dynamic state (temperature, level, queue, tabu
/// list). All validation happens in [`initialize`], before the first
/// iteration.
///
/// [`initialize`]: SearchPolicy::initialize
pub trait SearchPolicy<SM, NE>: Clone + Send
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    /// Registers the policy's parameters.
    fn register_parameters(&self, params: &mut ParameterBox);

    /// Reads and validates parameters and derives the initial dynamic
    /// state. Errors propagate out of `go` before any move is applied.
    #[allow(clippy::too_many_arguments)]
    fn initialize(
        &mut self,
        input: &SM::Input,
        sm: &SM,
        ne: &NE,
        params: &ParameterBox,
        run: &RunState,
        state: &SM::State,
        rng: &mut dyn RngCore,
    ) -> Result<(), Error>;

    /// The algorithm-specific stop criterion, checked between iterations
    /// (on top of the evaluation cap, the lower bound and interruption).
    fn stop(&self, run: &RunState) -> bool;

    /// Selects the move for this iteration. `Ok` with no move means the
    /// iteration stays idle; [`EmptyNeighborhood`] terminates the run.
    fn select(
        &mut self,
        input: &SM::Input,
        ne: &NE,
        state: &SM::State,
        run: &RunState,
        weights: Option<&[f64]>,
        rng: &mut dyn RngCore,
    ) -> Result<Selection<NE::Move>, EmptyNeighborhood>;

    /// Bookkeeping after an accepted move has been applied (tabu insertion,
    /// acceptance counters, queues).
    fn complete_move(
        &mut self,
        run: &RunState,
        mv: &EvaluatedMove<NE::Move>,
        rng: &mut dyn RngCore,
    ) {
        let _ = (run, mv, rng);
    }

    /// Bookkeeping at the end of every iteration, accepted or not
    /// (cooling, level decay).
    fn complete_iteration(&mut self, run: &RunState) {
        let _ = run;
    }

    /// One-line description of the dynamic state, for printing.
    fn status(&self) -> Option<String> {
        None
    }
}

/// A search runner assembled from a solution manager, a neighborhood
/// explorer and a [`SearchPolicy`].
///
/// Implements the common loop: select, apply, track the best, stop on the
/// policy criterion, the evaluation cap, the cost lower bound, or
/// interruption. The state is handed in and out of [`go`](Runner::go) by
/// mutable reference.
pub struct MoveRunner<SM, NE, P>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
    P: SearchPolicy<SM, NE>,
{
    name: String,
    sm: Arc<SM>,
    ne: Arc<NE>,
    policy: P,
    params: ParameterBox,
    weights: Option<Vec<f64>>,
    interrupt: Interrupt,
    run: RunState,
    best_state: Option<SM::State>,
    best: SharedBest<SM::State>,
    observer: Option<Arc<dyn RunObserver>>,
}

impl<SM, NE, P> MoveRunner<SM, NE, P>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
    P: SearchPolicy<SM, NE>,
{
    pub fn with_policy(sm: Arc<SM>, ne: Arc<NE>, name: &str, policy: P) -> Self {
        let mut params = ParameterBox::new(name);
        params.register_uint(
            "max_evaluations",
            "Maximum total number of cost function evaluations allowed",
        );
        params.register_uint("seed", "Random seed for a reproducible run");
        policy.register_parameters(&mut params);
        MoveRunner {
            name: name.to_string(),
            sm,
            ne,
            policy,
            params,
            weights: None,
            interrupt: Interrupt::new(),
            run: RunState::default(),
            best_state: None,
            best: Arc::new(Mutex::new(None)),
            observer: None,
        }
    }

    /// Weights applied to the cost components during delta evaluation.
    pub fn set_weights(&mut self, weights: Vec<f64>) {
        self.weights = Some(weights);
    }

    pub fn set_observer(&mut self, observer: Arc<dyn RunObserver>) {
        self.observer = Some(observer);
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.params
            .set_uint("seed", seed)
            .expect("the seed parameter is registered at construction");
    }

    /// Bookkeeping of the last (or running) search.
    pub fn run_state(&self) -> &RunState {
        &self.run
    }

    pub fn iteration(&self) -> u64 {
        self.run.iteration
    }

    pub fn iteration_of_best(&self) -> u64 {
        self.run.iteration_of_best
    }

    pub fn evaluations(&self) -> u64 {
        self.run.evaluations
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    #[cfg(feature = "tester")]
    pub fn run_state_mut(&mut self) -> &mut RunState {
        &mut self.run
    }

    fn make_rng(&self) -> Result<StdRng, Error> {
        if self.params.is_set("seed") {
            Ok(StdRng::seed_from_u64(self.params.uint("seed")?))
        } else {
            Ok(StdRng::from_os_rng())
        }
    }

    fn initialize_run(
        &mut self,
        input: &SM::Input,
        state: &SM::State,
    ) -> Result<StdRng, Error> {
        let mut rng = self.make_rng()?;
        self.run = RunState::default();
        self.run.max_evaluations = if self.params.is_set("max_evaluations") {
            self.params.uint("max_evaluations")?
        } else {
            u64::MAX
        };
        self.run.current_cost = self.sm.cost(input, state, self.weights.as_deref());
        self.run.best_cost = self.run.current_cost.clone();
        self.best_state = Some(state.clone());
        *self.best.lock().unwrap() = Some((state.clone(), self.run.best_cost.clone()));
        self.policy.initialize(
            input,
            self.sm.as_ref(),
            self.ne.as_ref(),
            &self.params,
            &self.run,
            state,
            &mut rng,
        )?;
        Ok(rng)
    }

    fn run_loop(
        &mut self,
        input: &SM::Input,
        state: &mut SM::State,
        max_steps: Option<u64>,
    ) -> Result<Cost, Error> {
        let mut rng = self.initialize_run(input, state)?;
        loop {
            if self.run.evaluations >= self.run.max_evaluations
                || self.policy.stop(&self.run)
                || self.sm.lower_bound_reached(input, &self.run.current_cost)
                || self.interrupt.stop_requested()
            {
                break;
            }
            if let Some(limit) = max_steps {
                if self.run.iteration >= limit {
                    break;
                }
            }
            self.run.iteration += 1;
            self.run.move_found = false;
            match self.policy.select(
                input,
                self.ne.as_ref(),
                state,
                &self.run,
                self.weights.as_deref(),
                &mut rng,
            ) {
                Err(EmptyNeighborhood) => break,
                Ok(selection) => {
                    self.run.evaluations += selection.explored;
                    if let Some(em) = selection.mv {
                        self.run.move_found = true;
                        self.ne.make_move(input, state, &em.mv);
                        self.run.current_cost += &em.cost;
                        self.policy.complete_move(&self.run, &em, &mut rng);
                        if self.run.current_cost < self.run.best_cost {
                            self.run.best_cost = self.run.current_cost.clone();
                            self.run.iteration_of_best = self.run.iteration;
                            self.best_state = Some(state.clone());
                            *self.best.lock().unwrap() =
                                Some((state.clone(), self.run.best_cost.clone()));
                            debug!(
                                "{}: new best {} at iteration {}",
                                self.name, self.run.best_cost, self.run.iteration
                            );
                            if let Some(observer) = &self.observer {
                                observer.on_new_best(&self.name, &self.run);
                            }
                        }
                    }
                }
            }
            self.policy.complete_iteration(&self.run);
            if let Some(observer) = &self.observer {
                observer.on_iteration(&self.name, &self.run);
            }
        }
        if let Some(best) = self.best_state.take() {
            *state = best;
        }
        Ok(self.run.best_cost.clone())
    }
}

impl<SM, NE, P> Clone for MoveRunner<SM, NE, P>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
    P: SearchPolicy<SM, NE>,
{
    /// Template cloning: copies the configuration (policy, parameter
    /// values, weights, observer) and resets everything run-specific.
    fn clone(&self) -> Self {
        MoveRunner {
            name: self.name.clone(),
            sm: Arc::clone(&self.sm),
            ne: Arc::clone(&self.ne),
            policy: self.policy.clone(),
            params: self.params.clone(),
            weights: self.weights.clone(),
            interrupt: Interrupt::new(),
            run: RunState::default(),
            best_state: None,
            best: Arc::new(Mutex::new(None)),
            observer: self.observer.clone(),
        }
    }
}

impl<SM, NE, P> Runner<SM::Input, SM::State> for MoveRunner<SM, NE, P>
where
    SM: SolutionManager + 'static,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State> + 'static,
    P: SearchPolicy<SM, NE> + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn modality(&self) -> usize {
        self.ne.modality()
    }

    fn go(&mut self, input: &SM::Input, state: &mut SM::State) -> Result<Cost, Error> {
        self.run_loop(input, state, None)
    }

    fn step(&mut self, input: &SM::Input, state: &mut SM::State, n: u64) -> Result<Cost, Error> {
        self.run_loop(input, state, Some(n))
    }

    fn interrupt_handle(&self) -> Interrupt {
        self.interrupt.clone()
    }

    fn best_handle(&self) -> SharedBest<SM::State> {
        Arc::clone(&self.best)
    }

    fn clone_runner(&self) -> Box<dyn Runner<SM::Input, SM::State>> {
        Box::new(self.clone())
    }

    fn params(&self) -> &ParameterBox {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParameterBox {
        &mut self.params
    }

    fn read_parameters(
        &mut self,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<(), Error> {
        writeln!(output, "{} -- INPUT PARAMETERS", self.name)?;
        self.params.read_from(input, output)
    }

    fn print(&self, output: &mut dyn Write) -> std::io::Result<()> {
        writeln!(output, "  {}", self.name)?;
        self.params.print(output)?;
        if let Some(status) = self.policy.status() {
            writeln!(output, "  {status}")?;
        }
        Ok(())
    }
}
