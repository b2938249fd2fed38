//! The neighborhood explorer contract and its composite selectors.

use std::fmt;

use rand::{Rng, RngCore};

use crate::cost::{Cost, HARD_WEIGHT};
use crate::error::EmptyNeighborhood;
use crate::model::DeltaSource;

/// A move together with its evaluated delta cost.
///
/// Acts as a cache: the cost is authoritative for applying the move to the
/// state it was evaluated against.
#[derive(Debug, Clone)]
pub struct EvaluatedMove<M> {
    pub mv: M,
    pub cost: Cost,
}

/// Outcome of a composite selector: the chosen move (None when no candidate
/// satisfied the acceptance predicate) and how many moves were evaluated.
#[derive(Debug, Clone)]
pub struct Selection<M> {
    pub mv: Option<EvaluatedMove<M>>,
    pub explored: u64,
}

/// Enumeration, sampling and application of one move type.
///
/// Implementors provide the four primitives (`first_move`, `next_move`,
/// `random_move`, `make_move`) and register delta cost components through
/// [`delta_sources`]; delta aggregation and the selectors are provided.
///
/// `first_move` and `random_move` return [`EmptyNeighborhood`] when no move
/// exists at all; runners recover from it by terminating their loop.
///
/// [`delta_sources`]: NeighborhoodExplorer::delta_sources
pub trait NeighborhoodExplorer: Send + Sync {
    type Input;
    type State: Clone + Send;
    type Move: Clone + PartialEq + fmt::Debug + Send;

    /// The first move of the neighborhood of `state`.
    fn first_move(
        &self,
        input: &Self::Input,
        state: &Self::State,
    ) -> Result<Self::Move, EmptyNeighborhood>;

    /// Advances `mv` to its successor; returns false when the enumeration
    /// wrapped around.
    fn next_move(&self, input: &Self::Input, state: &Self::State, mv: &mut Self::Move) -> bool;

    /// Draws a move uniformly from the neighborhood of `state`.
    fn random_move(
        &self,
        input: &Self::Input,
        state: &Self::State,
        rng: &mut dyn RngCore,
    ) -> Result<Self::Move, EmptyNeighborhood>;

    /// Applies `mv` to `state`.
    fn make_move(&self, input: &Self::Input, state: &mut Self::State, mv: &Self::Move);

    /// Number of composed move types (1 for a plain explorer).
    fn modality(&self) -> usize {
        1
    }

    /// The delta cost components evaluated by [`delta_cost`]. Composite
    /// explorers that override `delta_cost` directly may leave this empty.
    ///
    /// [`delta_cost`]: NeighborhoodExplorer::delta_cost
    fn delta_sources(&self) -> &[DeltaSource<Self::Input, Self::State, Self::Move>] {
        &[]
    }

    /// Aggregated delta cost of `mv`, summing every registered delta
    /// source. Recompute sources materialize the successor state once and
    /// subtract full component costs.
    fn delta_cost(
        &self,
        input: &Self::Input,
        state: &Self::State,
        mv: &Self::Move,
        weights: Option<&[f64]>,
    ) -> Cost {
        let sources = self.delta_sources();
        assert!(
            !sources.is_empty(),
            "no delta cost components registered for this neighborhood"
        );
        let mut after: Option<Self::State> = None;
        let mut components = Vec::with_capacity(sources.len());
        let mut violations = 0.0;
        let mut objective = 0.0;
        let mut weighted = weights.map(|_| 0.0);
        for (i, source) in sources.iter().enumerate() {
            let value = match source {
                DeltaSource::Analytic(delta) => delta.delta(input, state, mv),
                DeltaSource::Recompute(component) => {
                    let after = after.get_or_insert_with(|| {
                        let mut successor = state.clone();
                        self.make_move(input, &mut successor, mv);
                        successor
                    });
                    component.cost(input, after) - component.cost(input, state)
                }
            };
            components.push(value);
            if source.is_hard() {
                violations += value;
            } else {
                objective += value;
            }
            if let (Some(acc), Some(ws)) = (weighted.as_mut(), weights) {
                let scale = if source.is_hard() { HARD_WEIGHT } else { 1.0 };
                *acc += ws.get(i).copied().unwrap_or(1.0) * scale * value;
            }
        }
        let mut cost = Cost::new(violations, objective, components);
        cost.weighted = weighted;
        cost
    }

    /// Enumerates from the first move and returns the first one accepted.
    /// `Ok` with `mv: None` means the neighborhood was exhausted without an
    /// acceptable candidate.
    fn select_first<F>(
        &self,
        input: &Self::Input,
        state: &Self::State,
        weights: Option<&[f64]>,
        rng: &mut dyn RngCore,
        mut accept: F,
    ) -> Result<Selection<Self::Move>, EmptyNeighborhood>
    where
        Self: Sized,
        F: FnMut(&Self::Move, &Cost, &mut dyn RngCore) -> bool,
    {
        let mut mv = self.first_move(input, state)?;
        let mut explored = 0;
        loop {
            let cost = self.delta_cost(input, state, &mv, weights);
            explored += 1;
            if accept(&mv, &cost, rng) {
                return Ok(Selection {
                    mv: Some(EvaluatedMove { mv, cost }),
                    explored,
                });
            }
            if !self.next_move(input, state, &mut mv) {
                return Ok(Selection { mv: None, explored });
            }
        }
    }

    /// Enumerates the whole neighborhood and returns the accepted move of
    /// minimum cost; ties are broken uniformly at random by reservoir
    /// selection.
    fn select_best<F>(
        &self,
        input: &Self::Input,
        state: &Self::State,
        weights: Option<&[f64]>,
        rng: &mut dyn RngCore,
        mut accept: F,
    ) -> Result<Selection<Self::Move>, EmptyNeighborhood>
    where
        Self: Sized,
        F: FnMut(&Self::Move, &Cost, &mut dyn RngCore) -> bool,
    {
        let mut mv = self.first_move(input, state)?;
        let mut explored = 0;
        let mut best: Option<EvaluatedMove<Self::Move>> = None;
        let mut ties: u64 = 0;
        loop {
            let cost = self.delta_cost(input, state, &mv, weights);
            explored += 1;
            if accept(&mv, &cost, rng) {
                let replace = match &best {
                    None => {
                        ties = 1;
                        true
                    }
                    Some(incumbent) if cost < incumbent.cost => {
                        ties = 1;
                        true
                    }
                    Some(incumbent) if cost == incumbent.cost => {
                        ties += 1;
                        rng.random_range(0..ties) == 0
                    }
                    Some(_) => false,
                };
                if replace {
                    best = Some(EvaluatedMove {
                        mv: mv.clone(),
                        cost,
                    });
                }
            }
            if !self.next_move(input, state, &mut mv) {
                break;
            }
        }
        Ok(Selection { mv: best, explored })
    }

    /// Draws random moves until one is accepted or `samples_max` draws are
    /// exhausted (in which case `mv` is None).
    fn random_first<F>(
        &self,
        input: &Self::Input,
        state: &Self::State,
        samples_max: u64,
        weights: Option<&[f64]>,
        rng: &mut dyn RngCore,
        mut accept: F,
    ) -> Result<Selection<Self::Move>, EmptyNeighborhood>
    where
        Self: Sized,
        F: FnMut(&Self::Move, &Cost, &mut dyn RngCore) -> bool,
    {
        let mut sampled = 0;
        while sampled < samples_max {
            let mv = self.random_move(input, state, rng)?;
            let cost = self.delta_cost(input, state, &mv, weights);
            sampled += 1;
            if accept(&mv, &cost, rng) {
                return Ok(Selection {
                    mv: Some(EvaluatedMove { mv, cost }),
                    explored: sampled,
                });
            }
        }
        Ok(Selection {
            mv: None,
            explored: sampled,
        })
    }

    /// Draws `samples` random moves and returns the best accepted one, with
    /// the same reservoir tie-breaking as [`select_best`].
    ///
    /// [`select_best`]: NeighborhoodExplorer::select_best
    fn random_best<F>(
        &self,
        input: &Self::Input,
        state: &Self::State,
        samples: u64,
        weights: Option<&[f64]>,
        rng: &mut dyn RngCore,
        mut accept: F,
    ) -> Result<Selection<Self::Move>, EmptyNeighborhood>
    where
        Self: Sized,
        F: FnMut(&Self::Move, &Cost, &mut dyn RngCore) -> bool,
    {
        let mut best: Option<EvaluatedMove<Self::Move>> = None;
        let mut ties: u64 = 0;
        let mut sampled = 0;
        while sampled < samples {
            let mv = self.random_move(input, state, rng)?;
            let cost = self.delta_cost(input, state, &mv, weights);
            sampled += 1;
            if accept(&mv, &cost, rng) {
                let replace = match &best {
                    None => {
                        ties = 1;
                        true
                    }
                    Some(incumbent) if cost < incumbent.cost => {
                        ties = 1;
                        true
                    }
                    Some(incumbent) if cost == incumbent.cost => {
                        ties += 1;
                        rng.random_range(0..ties) == 0
                    }
                    Some(_) => false,
                };
                if replace {
                    best = Some(EvaluatedMove { mv, cost });
                }
            }
        }
        Ok(Selection {
            mv: best,
            explored: sampled,
        })
    }
}
