//! Search runners: the shared iteration loop and the concrete algorithms.
//!
//! A runner executes one search strategy over a state handed in by the
//! caller (move-in/move-out: `go` mutates the state to the best one found
//! and returns its cost). All concrete runners are instances of
//! [`base::MoveRunner`] with an algorithm-specific [`base::SearchPolicy`].

pub mod annealing;
pub mod base;
pub mod deluge;
pub mod descent;
pub mod hill;
pub mod lahc;
pub mod tabu;
pub mod vnd;

use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};

use crate::cost::Cost;
use crate::error::Error;
use crate::interrupt::Interrupt;
use crate::params::ParameterBox;

/// Snapshot slot shared between a running search and concurrent readers.
/// Readers get copies; the running loop only locks while storing a new
/// best.
pub type SharedBest<S> = Arc<Mutex<Option<(S, Cost)>>>;

/// Bookkeeping of one run, visible to policies and observers.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    /// Index of the current iteration.
    pub iteration: u64,
    /// Iteration at which the best state was found.
    pub iteration_of_best: u64,
    /// Number of delta cost evaluations performed so far.
    pub evaluations: u64,
    /// Effective evaluation cap (`u64::MAX` when unbounded).
    pub max_evaluations: u64,
    /// Cost of the current state.
    pub current_cost: Cost,
    /// Cost of the best state found so far.
    pub best_cost: Cost,
    /// Whether the last iteration selected an acceptable move.
    pub move_found: bool,
}

impl RunState {
    /// Iterations elapsed since the last strict improvement.
    pub fn idle_iterations(&self) -> u64 {
        self.iteration - self.iteration_of_best
    }
}

/// Optional callbacks fired by the runner loop.
pub trait RunObserver: Send + Sync {
    fn on_iteration(&self, _runner: &str, _run: &RunState) {}
    fn on_new_best(&self, _runner: &str, _run: &RunState) {}
}

/// The object-safe runner contract solvers drive.
pub trait Runner<I, S: Clone>: Send {
    fn name(&self) -> &str;

    /// Modality of the underlying neighborhood.
    fn modality(&self) -> usize;

    /// Runs the search from (and into) `state`, returning the best cost
    /// found. `state` holds the best state on return.
    fn go(&mut self, input: &I, state: &mut S) -> Result<Cost, Error>;

    /// Like [`go`](Runner::go) but stops after at most `n` iterations.
    fn step(&mut self, input: &I, state: &mut S, n: u64) -> Result<Cost, Error>;

    /// A handle to this runner's interruption flags, safe to trigger from
    /// another thread.
    fn interrupt_handle(&self) -> Interrupt;

    /// The shared best-state snapshot slot.
    fn best_handle(&self) -> SharedBest<S>;

    /// Copy of the best state/cost seen so far, if any run has started.
    fn current_best(&self) -> Option<(S, Cost)> {
        self.best_handle().lock().unwrap().clone()
    }

    /// Clones this runner as a template: parameter values are copied,
    /// interruption flags and run bookkeeping start fresh.
    fn clone_runner(&self) -> Box<dyn Runner<I, S>>;

    fn params(&self) -> &ParameterBox;

    fn params_mut(&mut self) -> &mut ParameterBox;

    /// Prompts interactively for unset parameters.
    fn read_parameters(
        &mut self,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<(), Error>;

    /// Prints name, parameters and policy status.
    fn print(&self, output: &mut dyn Write) -> std::io::Result<()>;
}
