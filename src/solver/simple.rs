//! The simple solver: one runner, one run.

use std::io::{BufRead, Write};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use crate::cost::Cost;
use crate::error::Error;
use crate::interrupt::{Interrupt, TimeoutGuard};
use crate::model::SolutionManager;
use crate::params::ParameterBox;
use crate::runner::Runner;
use crate::solver::{Monitor, SolveResult, SolverCore};

/// Drives a single runner from a constructed (or given) initial state.
pub struct SimpleLocalSearch<SM: SolutionManager> {
    name: String,
    core: SolverCore<SM>,
    runner: Option<Box<dyn Runner<SM::Input, SM::State>>>,
}

impl<SM: SolutionManager> SimpleLocalSearch<SM> {
    pub fn new(sm: Arc<SM>, name: &str) -> Self {
        SimpleLocalSearch {
            name: name.to_string(),
            core: SolverCore::new(sm, name),
            runner: None,
        }
    }

    pub fn set_runner(&mut self, runner: Box<dyn Runner<SM::Input, SM::State>>) {
        self.runner = Some(runner);
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

    /// Read-side handle; capture after the runner has been set.
    pub fn monitor(&self) -> Monitor<SM::State> {
        Monitor {
            running: Arc::clone(&self.core.running),
            active_runner: Arc::clone(&self.core.active_runner),
            solver_best: Arc::clone(&self.core.best),
            runner_bests: self.runner.iter().map(|r| r.best_handle()).collect(),
        }
    }

    /// Constructs the initial state and runs the attached runner.
    pub fn solve(&mut self, input: &SM::Input) -> Result<SolveResult<SM::State>, Error> {
        let mut rng = self.core.make_rng()?;
        let (state, cost) = self.core.initial_state(input, &mut rng)?;
        self.run(input, state, cost)
    }

    /// Runs from a caller-provided solution.
    pub fn resolve(
        &mut self,
        input: &SM::Input,
        initial: SM::State,
    ) -> Result<SolveResult<SM::State>, Error> {
        let cost = self.core.sm.cost(input, &initial, None);
        self.run(input, initial, cost)
    }

    fn run(
        &mut self,
        input: &SM::Input,
        mut current: SM::State,
        current_cost: Cost,
    ) -> Result<SolveResult<SM::State>, Error> {
        let start = Instant::now();
        let timeout = self.core.timeout()?;
        let runner = self
            .runner
            .as_mut()
            .ok_or_else(|| Error::Logic(format!("no runner set in solver {}", self.name)))?;

        self.core.interrupt.reset();
        runner.interrupt_handle().reset();
        self.core.store_best(&current, &current_cost);
        self.core.active_runner.store(0, Ordering::Relaxed);
        self.core.running.store(true, Ordering::Relaxed);
        let guard = timeout.map(|duration| {
            TimeoutGuard::arm(
                duration,
                vec![self.core.interrupt.clone(), runner.interrupt_handle()],
            )
        });

        let outcome = runner.go(input, &mut current);

        drop(guard);
        self.core.running.store(false, Ordering::Relaxed);
        let best_cost = outcome?;
        self.core.store_best(&current, &best_cost);
        Ok(SolveResult {
            best: current,
            cost_history: vec![best_cost.total],
            cost: best_cost,
            run_time: start.elapsed(),
        })
    }

    pub fn read_parameters(
        &mut self,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<(), Error> {
        writeln!(output, "{} -- INPUT PARAMETERS", self.name)?;
        self.core.params.read_from(input, output)?;
        if let Some(runner) = self.runner.as_mut() {
            runner.read_parameters(input, output)?;
        }
        Ok(())
    }

    pub fn print(&self, output: &mut dyn Write) -> std::io::Result<()> {
        writeln!(output, "Simple solver: {}", self.name)?;
        self.core.params.print(output)?;
        match &self.runner {
            Some(runner) => runner.print(output),
            None => writeln!(output, "<no runner attached>"),
        }
    }
}
