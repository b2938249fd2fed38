//! Shared fixture problems for the unit tests.
//!
//! The bit-flip domain (OneMax) exercises enumeration and analytic
//! deltas; the line-walk problem has a plateau of optima; the ridge
//! landscape hides its optimum behind a hill, which plain descent cannot
//! cross.

use std::sync::Arc;

use rand::{Rng, RngCore};

use crate::error::EmptyNeighborhood;
use crate::explore::NeighborhoodExplorer;
use crate::model::{CostComponent, DeltaCostComponent, DeltaSource, SolutionManager};

// ---- Bit-flip domain: Input = n, State = Vec<bool>, minimize ones ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Flip(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Swap(pub usize);

/// Soft component counting the set bits.
pub struct Ones;

impl CostComponent<usize, Vec<bool>> for Ones {
    fn name(&self) -> &str {
        "ones"
    }
    fn is_hard(&self) -> bool {
        false
    }
    fn compute(&self, _n: &usize, state: &Vec<bool>) -> f64 {
        state.iter().filter(|&&b| b).count() as f64
    }
}

/// Constant soft component keeping the total away from zero.
pub struct UnitOffset;

impl CostComponent<usize, Vec<bool>> for UnitOffset {
    fn name(&self) -> &str {
        "offset"
    }
    fn is_hard(&self) -> bool {
        false
    }
    fn compute(&self, _n: &usize, _state: &Vec<bool>) -> f64 {
        1.0
    }
}

pub struct OnesDelta {
    component: Arc<Ones>,
}

impl DeltaCostComponent<usize, Vec<bool>, Flip> for OnesDelta {
    fn component(&self) -> &dyn CostComponent<usize, Vec<bool>> {
        &*self.component
    }
    fn compute_delta(&self, _n: &usize, state: &Vec<bool>, mv: &Flip) -> f64 {
        if state[mv.0] {
            -1.0
        } else {
            1.0
        }
    }
}

pub struct BitFlip {
    sources: Vec<DeltaSource<usize, Vec<bool>, Flip>>,
}

impl BitFlip {
    pub fn new() -> Self {
        BitFlip {
            sources: vec![DeltaSource::Analytic(Arc::new(OnesDelta {
                component: Arc::new(Ones),
            }))],
        }
    }
}

impl NeighborhoodExplorer for BitFlip {
    type Input = usize;
    type State = Vec<bool>;
    type Move = Flip;

    fn first_move(&self, n: &usize, _state: &Vec<bool>) -> Result<Flip, EmptyNeighborhood> {
        if *n == 0 {
            Err(EmptyNeighborhood)
        } else {
            Ok(Flip(0))
        }
    }

    fn next_move(&self, n: &usize, _state: &Vec<bool>, mv: &mut Flip) -> bool {
        if mv.0 + 1 < *n {
            mv.0 += 1;
            true
        } else {
            false
        }
    }

    fn random_move(
        &self,
        n: &usize,
        _state: &Vec<bool>,
        rng: &mut dyn RngCore,
    ) -> Result<Flip, EmptyNeighborhood> {
        if *n == 0 {
            Err(EmptyNeighborhood)
        } else {
            Ok(Flip(rng.random_range(0..*n)))
        }
    }

    fn make_move(&self, _n: &usize, state: &mut Vec<bool>, mv: &Flip) {
        state[mv.0] = !state[mv.0];
    }

    fn delta_sources(&self) -> &[DeltaSource<usize, Vec<bool>, Flip>] {
        &self.sources
    }
}

/// Swapping adjacent bits never changes the ones count.
pub struct SwapOnesDelta {
    component: Arc<Ones>,
}

impl DeltaCostComponent<usize, Vec<bool>, Swap> for SwapOnesDelta {
    fn component(&self) -> &dyn CostComponent<usize, Vec<bool>> {
        &*self.component
    }
    fn compute_delta(&self, _n: &usize, _state: &Vec<bool>, _mv: &Swap) -> f64 {
        0.0
    }
}

pub struct AdjacentSwap {
    sources: Vec<DeltaSource<usize, Vec<bool>, Swap>>,
}

impl AdjacentSwap {
    pub fn new() -> Self {
        AdjacentSwap {
            sources: vec![DeltaSource::Analytic(Arc::new(SwapOnesDelta {
                component: Arc::new(Ones),
            }))],
        }
    }
}

impl NeighborhoodExplorer for AdjacentSwap {
    type Input = usize;
    type State = Vec<bool>;
    type Move = Swap;

    fn first_move(&self, n: &usize, _state: &Vec<bool>) -> Result<Swap, EmptyNeighborhood> {
        if *n < 2 {
            Err(EmptyNeighborhood)
        } else {
            Ok(Swap(0))
        }
    }

    fn next_move(&self, n: &usize, _state: &Vec<bool>, mv: &mut Swap) -> bool {
        if mv.0 + 2 < *n {
            mv.0 += 1;
            true
        } else {
            false
        }
    }

    fn random_move(
        &self,
        n: &usize,
        _state: &Vec<bool>,
        rng: &mut dyn RngCore,
    ) -> Result<Swap, EmptyNeighborhood> {
        if *n < 2 {
            Err(EmptyNeighborhood)
        } else {
            Ok(Swap(rng.random_range(0..*n - 1)))
        }
    }

    fn make_move(&self, _n: &usize, state: &mut Vec<bool>, mv: &Swap) {
        state.swap(mv.0, mv.0 + 1);
    }

    fn delta_sources(&self) -> &[DeltaSource<usize, Vec<bool>, Swap>] {
        &self.sources
    }
}

pub struct BitFlipManager {
    components: Vec<Arc<dyn CostComponent<usize, Vec<bool>>>>,
}

impl BitFlipManager {
    pub fn new() -> Self {
        BitFlipManager {
            components: vec![Arc::new(Ones)],
        }
    }

    /// Adds a constant offset so the zero lower bound is unreachable.
    pub fn with_offset() -> Self {
        BitFlipManager {
            components: vec![Arc::new(Ones), Arc::new(UnitOffset)],
        }
    }
}

impl SolutionManager for BitFlipManager {
    type Input = usize;
    type State = Vec<bool>;

    fn components(&self) -> &[Arc<dyn CostComponent<usize, Vec<bool>>>] {
        &self.components
    }

    fn random_state(&self, n: &usize, rng: &mut dyn RngCore) -> Vec<bool> {
        (0..*n).map(|_| rng.random_bool(0.5)).collect()
    }
}

// ---- Line walk: Input = (), State = i64, plateau of optima in [-3, 3] ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Step(pub i64);

pub struct PlateauDist;

impl CostComponent<(), i64> for PlateauDist {
    fn name(&self) -> &str {
        "plateau_distance"
    }
    fn is_hard(&self) -> bool {
        false
    }
    fn compute(&self, _input: &(), state: &i64) -> f64 {
        (state.abs() - 3).max(0) as f64
    }
}

/// Constant soft component over the line walk, keeping its plateau above
/// the zero lower bound.
pub struct PlateauOffset;

impl CostComponent<(), i64> for PlateauOffset {
    fn name(&self) -> &str {
        "offset"
    }
    fn is_hard(&self) -> bool {
        false
    }
    fn compute(&self, _input: &(), _state: &i64) -> f64 {
        1.0
    }
}

pub struct PlateauManager {
    components: Vec<Arc<dyn CostComponent<(), i64>>>,
}

impl PlateauManager {
    pub fn new() -> Self {
        PlateauManager {
            components: vec![Arc::new(PlateauDist)],
        }
    }

    /// Adds a constant offset so the zero lower bound is unreachable.
    pub fn with_offset() -> Self {
        PlateauManager {
            components: vec![Arc::new(PlateauDist), Arc::new(PlateauOffset)],
        }
    }
}

impl SolutionManager for PlateauManager {
    type Input = ();
    type State = i64;

    fn components(&self) -> &[Arc<dyn CostComponent<(), i64>>] {
        &self.components
    }

    fn random_state(&self, _input: &(), rng: &mut dyn RngCore) -> i64 {
        rng.random_range(-8..=8)
    }
}

pub struct LineWalk {
    sources: Vec<DeltaSource<(), i64, Step>>,
}

impl LineWalk {
    pub fn new() -> Self {
        LineWalk {
            sources: vec![DeltaSource::Recompute(Arc::new(PlateauDist))],
        }
    }
}

impl NeighborhoodExplorer for LineWalk {
    type Input = ();
    type State = i64;
    type Move = Step;

    fn first_move(&self, _input: &(), _state: &i64) -> Result<Step, EmptyNeighborhood> {
        Ok(Step(-1))
    }

    fn next_move(&self, _input: &(), _state: &i64, mv: &mut Step) -> bool {
        if mv.0 == -1 {
            *mv = Step(1);
            true
        } else {
            false
        }
    }

    fn random_move(
        &self,
        _input: &(),
        _state: &i64,
        rng: &mut dyn RngCore,
    ) -> Result<Step, EmptyNeighborhood> {
        Ok(if rng.random_bool(0.5) { Step(-1) } else { Step(1) })
    }

    fn make_move(&self, _input: &(), state: &mut i64, mv: &Step) {
        *state += mv.0;
    }

    fn delta_sources(&self) -> &[DeltaSource<(), i64, Step>] {
        &self.sources
    }
}

// ---- Ridge landscape: Input = cost table, State = position ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Jump {
    pub from: usize,
    pub to: usize,
}

/// A jump undoes another when it travels the same edge backwards.
pub fn jump_inverse(mv: &Jump, listed: &Jump) -> bool {
    mv.from == listed.to && mv.to == listed.from
}

pub struct TableCost;

impl CostComponent<Vec<f64>, usize> for TableCost {
    fn name(&self) -> &str {
        "table"
    }
    fn is_hard(&self) -> bool {
        false
    }
    fn compute(&self, table: &Vec<f64>, state: &usize) -> f64 {
        table[*state]
    }
}

pub struct RidgeManager {
    components: Vec<Arc<dyn CostComponent<Vec<f64>, usize>>>,
}

impl RidgeManager {
    pub fn new() -> Self {
        RidgeManager {
            components: vec![Arc::new(TableCost)],
        }
    }
}

impl SolutionManager for RidgeManager {
    type Input = Vec<f64>;
    type State = usize;

    fn components(&self) -> &[Arc<dyn CostComponent<Vec<f64>, usize>>] {
        &self.components
    }

    fn random_state(&self, table: &Vec<f64>, rng: &mut dyn RngCore) -> usize {
        rng.random_range(0..table.len())
    }
}

pub struct RidgeWalk {
    sources: Vec<DeltaSource<Vec<f64>, usize, Jump>>,
}

impl RidgeWalk {
    pub fn new() -> Self {
        RidgeWalk {
            sources: vec![DeltaSource::Recompute(Arc::new(TableCost))],
        }
    }
}

impl NeighborhoodExplorer for RidgeWalk {
    type Input = Vec<f64>;
    type State = usize;
    type Move = Jump;

    fn first_move(&self, table: &Vec<f64>, state: &usize) -> Result<Jump, EmptyNeighborhood> {
        let pos = *state;
        if pos > 0 {
            Ok(Jump {
                from: pos,
                to: pos - 1,
            })
        } else if pos + 1 < table.len() {
            Ok(Jump {
                from: pos,
                to: pos + 1,
            })
        } else {
            Err(EmptyNeighborhood)
        }
    }

    fn next_move(&self, table: &Vec<f64>, state: &usize, mv: &mut Jump) -> bool {
        let pos = *state;
        if pos > 0 && mv.to == pos - 1 && pos + 1 < table.len() {
            mv.to = pos + 1;
            true
        } else {
            false
        }
    }

    fn random_move(
        &self,
        table: &Vec<f64>,
        state: &usize,
        rng: &mut dyn RngCore,
    ) -> Result<Jump, EmptyNeighborhood> {
        let pos = *state;
        let mut targets = Vec::new();
        if pos > 0 {
            targets.push(pos - 1);
        }
        if pos + 1 < table.len() {
            targets.push(pos + 1);
        }
        if targets.is_empty() {
            return Err(EmptyNeighborhood);
        }
        let to = targets[rng.random_range(0..targets.len())];
        Ok(Jump { from: pos, to })
    }

    fn make_move(&self, _table: &Vec<f64>, state: &mut usize, mv: &Jump) {
        *state = mv.to;
    }

    fn delta_sources(&self) -> &[DeltaSource<Vec<f64>, usize, Jump>] {
        &self.sources
    }
}
