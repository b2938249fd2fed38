//! Domain-agnostic local search framework.
//!
//! A problem plugs in through two traits: a
//! [`SolutionManager`](model::SolutionManager) (state construction and the
//! cost function, assembled from hard and soft
//! [`CostComponent`](model::CostComponent)s) and one or more
//! [`NeighborhoodExplorer`](explore::NeighborhoodExplorer)s (move
//! enumeration, application and delta costs). Search strategies are then
//! composed from framework primitives:
//!
//! - **Runners** ([`runner`]): steepest/first descent, hill climbing, late
//!   acceptance, great deluge, simulated annealing (plain, with reheating,
//!   evaluation-budgeted), tabu search (best, first-improvement, sampled)
//!   and variable neighborhood descent. All share one iteration loop with
//!   best tracking, an evaluation cap and cooperative interruption.
//! - **Multimodal neighborhoods** ([`explore`]): union and
//!   Cartesian-product combinators over explorers.
//! - **Kickers** ([`kicker`]): compound moves of chained related steps.
//! - **Solvers** ([`solver`]): simple, token-ring and multi-start
//!   orchestration with initial-state construction and an overall timeout.
//!
//! Costs ([`cost::Cost`]) are multi-component: hard components count as
//! violations and dominate through [`cost::HARD_WEIGHT`], soft components
//! form the objective. Every configurable component exposes its settings
//! as named parameters ([`params::ParameterBox`]) addressable as
//! `prefix::flag` on a command line, as JSON, or interactively.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use localsearch::runner::{hill::HillClimbing, Runner};
//!
//! let sm = Arc::new(MyManager::new());
//! let ne = Arc::new(MyExplorer::new());
//! let mut hc = HillClimbing::new(sm, ne, "hc");
//! hc.params_mut().set_uint("max_idle_iterations", 1_000)?;
//! hc.set_seed(42);
//!
//! let mut state = my_initial_state();
//! let best_cost = hc.go(&input, &mut state)?;
//! ```

pub mod cost;
pub mod error;
pub mod explore;
pub mod interrupt;
pub mod kicker;
pub mod model;
pub mod params;
pub mod prohibition;
pub mod runner;
pub mod solver;

#[cfg(test)]
pub(crate) mod testbed;
