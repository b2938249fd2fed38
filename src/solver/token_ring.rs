//! Token-ring search: runners take turns on the same trajectory.

use std::io::{BufRead, Write};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use log::debug;

use crate::cost::Cost;
use crate::error::Error;
use crate::interrupt::{Interrupt, TimeoutGuard};
use crate::model::SolutionManager;
use crate::params::ParameterBox;
use crate::runner::Runner;
use crate::solver::{Monitor, SolveResult, SolverCore};

/// Rotates over its runners, handing each the current state in turn; no
/// re-randomization between rounds. A round without strict improvement is
/// idle; the search stops at `max_idle_rounds` idle rounds or `max_rounds`
/// rounds in total.
pub struct TokenRingSearch<SM: SolutionManager> {
    name: String,
    core: SolverCore<SM>,
    runners: Vec<Box<dyn Runner<SM::Input, SM::State>>>,
    round: u64,
    idle_rounds: u64,
}

impl<SM: SolutionManager> TokenRingSearch<SM> {
    pub fn new(sm: Arc<SM>, name: &str) -> Self {
        let mut core = SolverCore::new(sm, name);
        core.params
            .register_uint_default("max_rounds", "Maximum number of rounds", u64::MAX);
        core.params.register_uint_default(
            "max_idle_rounds",
            "Maximum number of idle rounds",
            u64::MAX,
        );
        TokenRingSearch {
            name: name.to_string(),
            core,
            runners: Vec::new(),
            round: 0,
            idle_rounds: 0,
        }
    }

    pub fn add_runner(&mut self, runner: Box<dyn Runner<SM::Input, SM::State>>) {
        self.runners.push(runner);
    }

    /// Detaches a runner by name.
    pub fn remove_runner(
        &mut self,
        name: &str,
    ) -> Result<Box<dyn Runner<SM::Input, SM::State>>, Error> {
        match self.runners.iter().position(|r| r.name() == name) {
            Some(index) => Ok(self.runners.remove(index)),
            None => Err(Error::Logic(format!(
                "runner {name} was not added to solver {}",
                self.name
            ))),
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn idle_rounds(&self) -> u64 {
        self.idle_rounds
    }

    pub fn params(&self) -> &ParameterBox {
        &self.core.params
    }

    pub fn params_mut(&mut self) -> &mut ParameterBox {
        &mut self.core.params
    }

    pub fn interrupt_handle(&self) -> Interrupt {
        self.core.interrupt.clone()
    }

    /// Read-side handle; capture after all runners have been added.
    pub fn monitor(&self) -> Monitor<SM::State> {
        Monitor {
            running: Arc::clone(&self.core.running),
            active_runner: Arc::clone(&self.core.active_runner),
            solver_best: Arc::clone(&self.core.best),
            runner_bests: self.runners.iter().map(|r| r.best_handle()).collect(),
        }
    }

    pub fn solve(&mut self, input: &SM::Input) -> Result<SolveResult<SM::State>, Error> {
        let mut rng = self.core.make_rng()?;
        let (state, cost) = self.core.initial_state(input, &mut rng)?;
        self.run(input, state, cost)
    }

    pub fn resolve(
        &mut self,
        input: &SM::Input,
        initial: SM::State,
    ) -> Result<SolveResult<SM::State>, Error> {
        let cost = self.core.sm.cost(input, &initial, None);
        self.run(input, initial, cost)
    }

    fn bound(&self, flag: &str) -> Result<u64, Error> {
        let value = self.core.params.uint(flag)?;
        if value == 0 {
            return Err(Error::incorrect(flag, "should be greater than zero"));
        }
        Ok(value)
    }

    fn run(
        &mut self,
        input: &SM::Input,
        mut current: SM::State,
        current_cost: Cost,
    ) -> Result<SolveResult<SM::State>, Error> {
        let start = Instant::now();
        if self.runners.is_empty() {
            return Err(Error::Logic(format!("no runner set in solver {}", self.name)));
        }
        self.bound("max_rounds")?;
        self.bound("max_idle_rounds")?;
        let timeout = self.core.timeout()?;

        self.core.interrupt.reset();
        for runner in &self.runners {
            runner.interrupt_handle().reset();
        }
        self.core.store_best(&current, &current_cost);
        self.core.running.store(true, Ordering::Relaxed);
        let mut handles = vec![self.core.interrupt.clone()];
        handles.extend(self.runners.iter().map(|r| r.interrupt_handle()));
        let guard = timeout.map(|duration| TimeoutGuard::arm(duration, handles));

        let outcome = self.rotate(input, &mut current, current_cost);

        drop(guard);
        self.core.running.store(false, Ordering::Relaxed);
        let (best, best_cost, history) = outcome?;
        self.core.store_best(&best, &best_cost);
        Ok(SolveResult {
            best,
            cost: best_cost,
            cost_history: history,
            run_time: start.elapsed(),
        })
    }

    fn rotate(
        &mut self,
        input: &SM::Input,
        current: &mut SM::State,
        current_cost: Cost,
    ) -> Result<(SM::State, Cost, Vec<f64>), Error> {
        let max_rounds = self.core.params.uint("max_rounds")?;
        let max_idle_rounds = self.core.params.uint("max_idle_rounds")?;
        let mut best_state = current.clone();
        let mut best_cost = current_cost;
        let mut history = Vec::new();
        self.round = 0;
        self.idle_rounds = 0;
        let mut current_runner = 0usize;
        loop {
            self.core.active_runner.store(current_runner, Ordering::Relaxed);
            let cost = self.runners[current_runner].go(input, current)?;
            self.round += 1;
            self.idle_rounds += 1;
            // The non-strict comparison keeps equal-cost states for
            // diversification.
            if cost <= best_cost {
                if cost < best_cost {
                    self.idle_rounds = 0;
                }
                best_state = current.clone();
                best_cost = cost;
                self.core.store_best(&best_state, &best_cost);
            }
            history.push(best_cost.total);
            debug!(
                "{}: round {} ({} idle), best {}",
                self.name, self.round, self.idle_rounds, best_cost
            );
            current_runner = (current_runner + 1) % self.runners.len();
            if self.idle_rounds >= max_idle_rounds
                || self.round >= max_rounds
                || self.core.interrupt.stop_requested()
            {
                break;
            }
        }
        Ok((best_state, best_cost, history))
    }

    pub fn read_parameters(
        &mut self,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<(), Error> {
        writeln!(output, "{} -- INPUT PARAMETERS", self.name)?;
        self.core.params.read_from(input, output)?;
        for runner in self.runners.iter_mut() {
            runner.read_parameters(input, output)?;
        }
        Ok(())
    }

    pub fn print(&self, output: &mut dyn Write) -> std::io::Result<()> {
        writeln!(output, "Token ring solver: {}", self.name)?;
        self.core.params.print(output)?;
        if self.runners.is_empty() {
            writeln!(output, "<no runner attached>")?;
        }
        for runner in &self.runners {
            runner.print(output)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::descent::SteepestDescent;
    use crate::runner::hill::HillClimbing;
    use crate::testbed::{BitFlip, BitFlipManager};

    fn hill(seed: u64) -> Box<dyn Runner<usize, Vec<bool>>> {
        let mut hc = HillClimbing::new(
            Arc::new(BitFlipManager::with_offset()),
            Arc::new(BitFlip::new()),
            "hc",
        );
        hc.set_seed(seed);
        hc.params_mut().set_uint("max_idle_iterations", 30).unwrap();
        Box::new(hc)
    }

    fn steepest(seed: u64) -> Box<dyn Runner<usize, Vec<bool>>> {
        let mut sd = SteepestDescent::new(
            Arc::new(BitFlipManager::with_offset()),
            Arc::new(BitFlip::new()),
            "sd",
        );
        sd.set_seed(seed);
        Box::new(sd)
    }

    #[test]
    fn test_no_runner_is_a_logic_error() {
        let mut solver = TokenRingSearch::new(Arc::new(BitFlipManager::new()), "tr");
        assert!(matches!(solver.solve(&8), Err(Error::Logic(_))));
    }

    #[test]
    fn test_zero_round_bound_is_rejected() {
        let mut solver = TokenRingSearch::new(Arc::new(BitFlipManager::new()), "tr");
        solver.add_runner(hill(1));
        solver.params_mut().set_uint("max_rounds", 0).unwrap();
        assert!(matches!(
            solver.solve(&8),
            Err(Error::IncorrectParameterValue { .. })
        ));
    }

    #[test]
    fn test_rotation_counts_rounds() {
        let sm = Arc::new(BitFlipManager::with_offset());
        let mut solver = TokenRingSearch::new(sm, "tr");
        solver.params_mut().set_uint("seed", 3).unwrap();
        solver.params_mut().set_uint("max_rounds", 6).unwrap();
        solver.params_mut().set_uint("max_idle_rounds", 6).unwrap();
        solver.add_runner(hill(1));
        solver.add_runner(steepest(2));

        let result = solver.solve(&10).unwrap();
        assert!(solver.round() >= 2, "both runners should have run");
        assert!(solver.round() <= 6);
        assert_eq!(result.cost_history.len(), solver.round() as usize);
        // All soft costs are ones-count + 1 offset: the optimum is 1.
        assert_eq!(result.cost.total, 1.0);
    }

    #[test]
    fn test_history_is_non_increasing() {
        let sm = Arc::new(BitFlipManager::with_offset());
        let mut solver = TokenRingSearch::new(sm, "tr");
        solver.params_mut().set_uint("seed", 11).unwrap();
        solver.params_mut().set_uint("max_rounds", 8).unwrap();
        solver.params_mut().set_uint("max_idle_rounds", 4).unwrap();
        solver.add_runner(hill(5));
        solver.add_runner(hill(6));

        let result = solver.solve(&14).unwrap();
        for pair in result.cost_history.windows(2) {
            assert!(pair[1] <= pair[0], "best worsened across rounds: {pair:?}");
        }
    }

    #[test]
    fn test_remove_runner() {
        let mut solver = TokenRingSearch::new(Arc::new(BitFlipManager::new()), "tr");
        solver.add_runner(hill(1));
        assert!(solver.remove_runner("hc").is_ok());
        assert!(matches!(solver.remove_runner("hc"), Err(Error::Logic(_))));
    }

    #[test]
    fn test_idle_rounds_stop_the_rotation() {
        let sm = Arc::new(BitFlipManager::with_offset());
        let mut solver = TokenRingSearch::new(sm, "tr");
        solver.params_mut().set_uint("seed", 3).unwrap();
        solver.params_mut().set_uint("max_idle_rounds", 2).unwrap();
        solver.add_runner(steepest(1));
        solver.add_runner(steepest(2));

        solver.solve(&10).unwrap();
        // Steepest descent converges in the first round; afterwards every
        // round is idle.
        assert!(solver.idle_rounds() >= 2);
        assert!(solver.round() <= 4);
    }
}
