//! Solvers: orchestration of runners with initial-state construction,
//! overall timeout and restart strategies.

pub mod multi_start;
pub mod simple;
pub mod token_ring;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cost::Cost;
use crate::error::Error;
use crate::interrupt::Interrupt;
use crate::model::SolutionManager;
use crate::params::ParameterBox;
use crate::runner::SharedBest;

pub use multi_start::MultiStartSearch;
pub use simple::SimpleLocalSearch;
pub use token_ring::TokenRingSearch;

/// Outcome of a solve: the best state, its cost, the best total after each
/// round/restart, and the wall-clock time spent.
#[derive(Debug, Clone)]
pub struct SolveResult<S> {
    pub best: S,
    pub cost: Cost,
    pub cost_history: Vec<f64>,
    pub run_time: Duration,
}

/// Clonable read-side handle on a solver: returns a copy of the active
/// runner's best while a solve is running, and of the solver's best when
/// idle.
pub struct Monitor<S> {
    running: Arc<AtomicBool>,
    active_runner: Arc<AtomicUsize>,
    solver_best: SharedBest<S>,
    runner_bests: Vec<SharedBest<S>>,
}

impl<S: Clone> Monitor<S> {
    pub fn current_best(&self) -> Option<(S, Cost)> {
        if self.running.load(Ordering::Relaxed) {
            let active = self.active_runner.load(Ordering::Relaxed);
            if let Some(slot) = self.runner_bests.get(active) {
                if let Some(snapshot) = slot.lock().unwrap().clone() {
                    return Some(snapshot);
                }
            }
        }
        self.solver_best.lock().unwrap().clone()
    }
}

impl<S> Clone for Monitor<S> {
    fn clone(&self) -> Self {
        Monitor {
            running: Arc::clone(&self.running),
            active_runner: Arc::clone(&self.active_runner),
            solver_best: Arc::clone(&self.solver_best),
            runner_bests: self.runner_bests.iter().map(Arc::clone).collect(),
        }
    }
}

/// State and parameters common to every solver.
pub(crate) struct SolverCore<SM: SolutionManager> {
    pub(crate) sm: Arc<SM>,
    pub(crate) params: ParameterBox,
    pub(crate) interrupt: Interrupt,
    pub(crate) best: SharedBest<SM::State>,
    pub(crate) running: Arc<AtomicBool>,
    pub(crate) active_runner: Arc<AtomicUsize>,
}

impl<SM: SolutionManager> SolverCore<SM> {
    pub(crate) fn new(sm: Arc<SM>, name: &str) -> Self {
        let mut params = ParameterBox::new(name);
        params.register_uint_default(
            "init_trials",
            "Number of states to be tried in the initialization phase",
            1,
        );
        params.register_bool_default("random_state", "Random initial state", true);
        params.register_float("timeout", "Solver timeout in seconds (no timeout if unset)");
        params.register_uint("seed", "Random seed for a reproducible solve");
        SolverCore {
            sm,
            params,
            interrupt: Interrupt::new(),
            best: Arc::new(std::sync::Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            active_runner: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn make_rng(&self) -> Result<StdRng, Error> {
        if self.params.is_set("seed") {
            Ok(StdRng::seed_from_u64(self.params.uint("seed")?))
        } else {
            Ok(StdRng::from_os_rng())
        }
    }

    /// Builds the initial state: the best of `init_trials` random states,
    /// or a greedy state when `random_state` is disabled.
    pub(crate) fn initial_state(
        &self,
        input: &SM::Input,
        rng: &mut StdRng,
    ) -> Result<(SM::State, Cost), Error> {
        if self.params.bool("random_state")? {
            let trials = self.params.uint("init_trials")?;
            Ok(self.sm.sample_state(input, trials, rng))
        } else {
            let state = self.sm.greedy_state(input, rng)?;
            let cost = self.sm.cost(input, &state, None);
            Ok((state, cost))
        }
    }

    pub(crate) fn timeout(&self) -> Result<Option<Duration>, Error> {
        if !self.params.is_set("timeout") {
            return Ok(None);
        }
        let seconds = self.params.float("timeout")?;
        if seconds <= 0.0 {
            return Err(Error::incorrect("timeout", "should be greater than zero"));
        }
        Ok(Some(Duration::from_secs_f64(seconds)))
    }

    pub(crate) fn store_best(&self, state: &SM::State, cost: &Cost) {
        *self.best.lock().unwrap() = Some((state.clone(), cost.clone()));
    }
}
