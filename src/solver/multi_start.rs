//! Multi-start search: full passes over the runners with re-randomization
//! between passes.

use std::io::{BufRead, Write};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use log::debug;
use rand::rngs::StdRng;

use crate::cost::Cost;
use crate::error::Error;
use crate::interrupt::{Interrupt, TimeoutGuard};
use crate::model::SolutionManager;
use crate::params::ParameterBox;
use crate::runner::Runner;
use crate::solver::{Monitor, SolveResult, SolverCore};

/// Runs every runner once per restart, re-randomizing the current state
/// between restarts; stops after `max_restarts` restarts or
/// `max_idle_restarts` consecutive restarts without improvement.
pub struct MultiStartSearch<SM: SolutionManager> {
    name: String,
    core: SolverCore<SM>,
    runners: Vec<Box<dyn Runner<SM::Input, SM::State>>>,
    restart: u64,
    idle_restarts: u64,
}

impl<SM: SolutionManager> MultiStartSearch<SM> {
    pub fn new(sm: Arc<SM>, name: &str) -> Self {
        let mut core = SolverCore::new(sm, name);
        core.params
            .register_uint_default("max_restarts", "Maximum number of restarts", u64::MAX);
        core.params.register_uint_default(
            "max_idle_restarts",
            "Maximum number of idle restarts",
            u64::MAX,
        );
        MultiStartSearch {
            name: name.to_string(),
            core,
            runners: Vec::new(),
            restart: 0,
            idle_restarts: 0,
        }
    }

    pub fn add_runner(&mut self, runner: Box<dyn Runner<SM::Input, SM::State>>) {
        self.runners.push(runner);
    }

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

    pub fn restart(&self) -> u64 {
        self.restart
    }

    pub fn idle_restarts(&self) -> u64 {
        self.idle_restarts
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
        self.run(input, state, cost, &mut rng)
    }

    pub fn resolve(
        &mut self,
        input: &SM::Input,
        initial: SM::State,
    ) -> Result<SolveResult<SM::State>, Error> {
        let mut rng = self.core.make_rng()?;
        let cost = self.core.sm.cost(input, &initial, None);
        self.run(input, initial, cost, &mut rng)
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
        rng: &mut StdRng,
    ) -> Result<SolveResult<SM::State>, Error> {
        let start = Instant::now();
        if self.runners.is_empty() {
            return Err(Error::Logic(format!("no runner set in solver {}", self.name)));
        }
        self.bound("max_restarts")?;
        self.bound("max_idle_restarts")?;
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

        let outcome = self.restart_loop(input, &mut current, current_cost, rng);

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

    fn restart_loop(
        &mut self,
        input: &SM::Input,
        current: &mut SM::State,
        current_cost: Cost,
        rng: &mut StdRng,
    ) -> Result<(SM::State, Cost, Vec<f64>), Error> {
        let max_restarts = self.core.params.uint("max_restarts")?;
        let max_idle_restarts = self.core.params.uint("max_idle_restarts")?;
        let mut best_state = current.clone();
        let mut best_cost = current_cost;
        let mut history = Vec::new();
        self.restart = 0;
        self.idle_restarts = 0;
        loop {
            let mut improved = false;
            for index in 0..self.runners.len() {
                if self.core.interrupt.stop_requested() {
                    break;
                }
                self.core.active_runner.store(index, Ordering::Relaxed);
                let cost = self.runners[index].go(input, current)?;
                if cost < best_cost {
                    best_state = current.clone();
                    best_cost = cost;
                    improved = true;
                    self.core.store_best(&best_state, &best_cost);
                }
            }
            self.restart += 1;
            if improved {
                self.idle_restarts = 0;
            } else {
                self.idle_restarts += 1;
            }
            history.push(best_cost.total);
            debug!(
                "{}: restart {} ({} idle), best {}",
                self.name, self.restart, self.idle_restarts, best_cost
            );
            if self.idle_restarts >= max_idle_restarts
                || self.restart >= max_restarts
                || self.core.interrupt.stop_requested()
            {
                break;
            }
            *current = self.core.sm.random_state(input, rng);
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
        writeln!(output, "Multi start solver: {}", self.name)?;
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
    use crate::runner::hill::HillClimbing;
    use crate::testbed::{BitFlip, BitFlipManager};

    fn hill(seed: u64, idle: u64) -> Box<dyn Runner<usize, Vec<bool>>> {
        let mut hc = HillClimbing::new(
            Arc::new(BitFlipManager::with_offset()),
            Arc::new(BitFlip::new()),
            "hc",
        );
        hc.set_seed(seed);
        hc.params_mut().set_uint("max_idle_iterations", idle).unwrap();
        Box::new(hc)
    }

    #[test]
    fn test_no_runner_is_a_logic_error() {
        let mut solver = MultiStartSearch::new(Arc::new(BitFlipManager::new()), "ms");
        assert!(matches!(solver.solve(&8), Err(Error::Logic(_))));
    }

    #[test]
    fn test_restarts_are_bounded_and_history_monotone() {
        let sm = Arc::new(BitFlipManager::with_offset());
        let mut solver = MultiStartSearch::new(sm, "ms");
        solver.params_mut().set_uint("seed", 4).unwrap();
        solver.params_mut().set_uint("max_restarts", 5).unwrap();
        solver.add_runner(hill(1, 20));

        let result = solver.solve(&12).unwrap();
        assert!(solver.restart() <= 5);
        assert_eq!(result.cost_history.len(), solver.restart() as usize);
        // Best cost across restarts is non-increasing.
        for pair in result.cost_history.windows(2) {
            assert!(pair[1] <= pair[0], "best worsened across restarts: {pair:?}");
        }
        assert_eq!(result.cost.total, *result.cost_history.last().unwrap());
    }

    #[test]
    fn test_template_runner_cloning_populates_the_pool() {
        let sm = Arc::new(BitFlipManager::with_offset());
        let mut template = HillClimbing::new(Arc::clone(&sm), Arc::new(BitFlip::new()), "hc");
        template.set_seed(9);
        template.params_mut().set_uint("max_idle_iterations", 100).unwrap();

        let mut solver = MultiStartSearch::new(sm, "ms");
        solver.params_mut().set_uint("seed", 4).unwrap();
        solver.params_mut().set_uint("max_restarts", 3).unwrap();
        for _ in 0..3 {
            solver.add_runner(template.clone_runner());
        }

        let result = solver.solve(&10).unwrap();
        assert_eq!(result.cost.total, 1.0);
    }

    #[test]
    fn test_idle_restarts_stop_early() {
        let sm = Arc::new(BitFlipManager::with_offset());
        let mut solver = MultiStartSearch::new(sm, "ms");
        solver.params_mut().set_uint("seed", 4).unwrap();
        solver.params_mut().set_uint("max_idle_restarts", 2).unwrap();
        solver.params_mut().set_uint("max_restarts", 50).unwrap();
        solver.add_runner(hill(2, 200));

        solver.solve(&8).unwrap();
        // The optimum (total 1 with the offset) is found within the first
        // restarts; afterwards no restart can improve.
        assert!(solver.restart() < 50);
        assert_eq!(solver.idle_restarts(), 2);
    }

    #[test]
    fn test_zero_restart_bound_is_rejected() {
        let mut solver = MultiStartSearch::new(Arc::new(BitFlipManager::new()), "ms");
        solver.add_runner(hill(1, 5));
        solver.params_mut().set_uint("max_idle_restarts", 0).unwrap();
        assert!(matches!(
            solver.solve(&8),
            Err(Error::IncorrectParameterValue { .. })
        ));
    }
}
