//! Cost components and their move-delta counterparts.

use std::sync::Arc;

/// One dimension of the cost function.
///
/// Hard components count as violations and dominate the aggregated total
/// through [`crate::cost::HARD_WEIGHT`]; soft components form the
/// objective. The effective contribution is `weight(input) * compute(input,
/// state)`.
pub trait CostComponent<I, S>: Send + Sync {
    fn name(&self) -> &str;

    fn is_hard(&self) -> bool;

    fn weight(&self, _input: &I) -> f64 {
        1.0
    }

    /// Raw (unweighted) cost of the state under this component.
    fn compute(&self, input: &I, state: &S) -> f64;

    /// Weighted contribution.
    fn cost(&self, input: &I, state: &S) -> f64 {
        self.weight(input) * self.compute(input, state)
    }
}

/// Analytic delta of one cost component over a move, evaluated without
/// materializing the successor state.
pub trait DeltaCostComponent<I, S, M>: Send + Sync {
    /// The cost component this delta belongs to.
    fn component(&self) -> &dyn CostComponent<I, S>;

    /// Raw cost difference induced by applying `mv` to `state`.
    fn compute_delta(&self, input: &I, state: &S, mv: &M) -> f64;

    /// Weighted delta contribution.
    fn delta(&self, input: &I, state: &S, mv: &M) -> f64 {
        self.component().weight(input) * self.compute_delta(input, state, mv)
    }
}

/// How a neighborhood explorer evaluates one component of a move's delta
/// cost.
///
/// `Recompute` is the adapter used when no analytic delta exists: the
/// explorer applies the move to a copy of the state and subtracts the full
/// component costs. Adapter-backed components are exact by construction;
/// analytic ones are the implementor's responsibility.
pub enum DeltaSource<I, S, M> {
    Analytic(Arc<dyn DeltaCostComponent<I, S, M>>),
    Recompute(Arc<dyn CostComponent<I, S>>),
}

impl<I, S, M> DeltaSource<I, S, M> {
    /// Whether the underlying component is hard.
    pub fn is_hard(&self) -> bool {
        match self {
            DeltaSource::Analytic(delta) => delta.component().is_hard(),
            DeltaSource::Recompute(component) => component.is_hard(),
        }
    }
}

impl<I, S, M> Clone for DeltaSource<I, S, M> {
    fn clone(&self) -> Self {
        match self {
            DeltaSource::Analytic(delta) => DeltaSource::Analytic(Arc::clone(delta)),
            DeltaSource::Recompute(component) => DeltaSource::Recompute(Arc::clone(component)),
        }
    }
}
