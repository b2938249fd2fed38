//! Multimodal neighborhoods: union and Cartesian-product combinators.
//!
//! Two explorers over the same input/state compose into a single explorer
//! whose move is a tagged pair. Higher modality is obtained by nesting
//! (`UnionExplorer::new(UnionExplorer::new(a, b), c)` has modality 3).

use std::fmt;

use rand::{Rng, RngCore};

use crate::cost::Cost;
use crate::error::EmptyNeighborhood;
use crate::explore::explorer::NeighborhoodExplorer;
use crate::prohibition::InverseRelation;

/// A set-union move: exactly one constituent is active.
#[derive(Debug, Clone, PartialEq)]
pub enum UnionMove<M1, M2> {
    Left(M1),
    Right(M2),
}

impl<M1: fmt::Display, M2: fmt::Display> fmt::Display for UnionMove<M1, M2> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnionMove::Left(m) => write!(f, "<{m}|_>"),
            UnionMove::Right(m) => write!(f, "<_|{m}>"),
        }
    }
}

/// Union of two neighborhoods: enumeration visits the left constituent
/// first, then the right; the delta cost is the active constituent's delta.
pub struct UnionExplorer<E1, E2> {
    left: E1,
    right: E2,
}

impl<E1, E2> UnionExplorer<E1, E2> {
    pub fn new(left: E1, right: E2) -> Self {
        UnionExplorer { left, right }
    }
}

impl<E1, E2> NeighborhoodExplorer for UnionExplorer<E1, E2>
where
    E1: NeighborhoodExplorer,
    E2: NeighborhoodExplorer<Input = E1::Input, State = E1::State>,
{
    type Input = E1::Input;
    type State = E1::State;
    type Move = UnionMove<E1::Move, E2::Move>;

    fn first_move(
        &self,
        input: &Self::Input,
        state: &Self::State,
    ) -> Result<Self::Move, EmptyNeighborhood> {
        match self.left.first_move(input, state) {
            Ok(mv) => Ok(UnionMove::Left(mv)),
            Err(EmptyNeighborhood) => Ok(UnionMove::Right(self.right.first_move(input, state)?)),
        }
    }

    fn next_move(&self, input: &Self::Input, state: &Self::State, mv: &mut Self::Move) -> bool {
        match mv {
            UnionMove::Left(m) => {
                if self.left.next_move(input, state, m) {
                    return true;
                }
            }
            UnionMove::Right(m) => return self.right.next_move(input, state, m),
        }
        match self.right.first_move(input, state) {
            Ok(m) => {
                *mv = UnionMove::Right(m);
                true
            }
            Err(EmptyNeighborhood) => false,
        }
    }

    fn random_move(
        &self,
        input: &Self::Input,
        state: &Self::State,
        rng: &mut dyn RngCore,
    ) -> Result<Self::Move, EmptyNeighborhood> {
        // Weight the side choice by modality so nested unions stay uniform
        // over their constituents.
        let left_modality = self.left.modality();
        let total = left_modality + self.right.modality();
        if rng.random_range(0..total) < left_modality {
            match self.left.random_move(input, state, rng) {
                Ok(mv) => Ok(UnionMove::Left(mv)),
                Err(EmptyNeighborhood) => {
                    Ok(UnionMove::Right(self.right.random_move(input, state, rng)?))
                }
            }
        } else {
            match self.right.random_move(input, state, rng) {
                Ok(mv) => Ok(UnionMove::Right(mv)),
                Err(EmptyNeighborhood) => {
                    Ok(UnionMove::Left(self.left.random_move(input, state, rng)?))
                }
            }
        }
    }

    fn make_move(&self, input: &Self::Input, state: &mut Self::State, mv: &Self::Move) {
        match mv {
            UnionMove::Left(m) => self.left.make_move(input, state, m),
            UnionMove::Right(m) => self.right.make_move(input, state, m),
        }
    }

    fn modality(&self) -> usize {
        self.left.modality() + self.right.modality()
    }

    fn delta_cost(
        &self,
        input: &Self::Input,
        state: &Self::State,
        mv: &Self::Move,
        weights: Option<&[f64]>,
    ) -> Cost {
        match mv {
            UnionMove::Left(m) => self.left.delta_cost(input, state, m, weights),
            UnionMove::Right(m) => self.right.delta_cost(input, state, m, weights),
        }
    }
}

/// A Cartesian-product move: both constituents are active; the second is
/// defined relative to the state after the first.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductMove<M1, M2>(pub M1, pub M2);

impl<M1: fmt::Display, M2: fmt::Display> fmt::Display for ProductMove<M1, M2> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}*{}>", self.0, self.1)
    }
}

/// Cartesian product of two neighborhoods: enumeration nests the second
/// explorer's loop inside the first with full backtracking; the composite
/// applies both moves and its delta is the sum of the per-step deltas.
pub struct ProductExplorer<E1, E2> {
    first: E1,
    second: E2,
}

impl<E1, E2> ProductExplorer<E1, E2> {
    pub fn new(first: E1, second: E2) -> Self {
        ProductExplorer { first, second }
    }
}

impl<E1, E2> ProductExplorer<E1, E2>
where
    E1: NeighborhoodExplorer,
    E2: NeighborhoodExplorer<Input = E1::Input, State = E1::State>,
{
    fn intermediate(&self, input: &E1::Input, state: &E1::State, mv: &E1::Move) -> E1::State {
        let mut mid = state.clone();
        self.first.make_move(input, &mut mid, mv);
        mid
    }
}

impl<E1, E2> NeighborhoodExplorer for ProductExplorer<E1, E2>
where
    E1: NeighborhoodExplorer,
    E2: NeighborhoodExplorer<Input = E1::Input, State = E1::State>,
{
    type Input = E1::Input;
    type State = E1::State;
    type Move = ProductMove<E1::Move, E2::Move>;

    fn first_move(
        &self,
        input: &Self::Input,
        state: &Self::State,
    ) -> Result<Self::Move, EmptyNeighborhood> {
        let mut outer = self.first.first_move(input, state)?;
        loop {
            let mid = self.intermediate(input, state, &outer);
            match self.second.first_move(input, &mid) {
                Ok(inner) => return Ok(ProductMove(outer, inner)),
                Err(EmptyNeighborhood) => {
                    if !self.first.next_move(input, state, &mut outer) {
                        return Err(EmptyNeighborhood);
                    }
                }
            }
        }
    }

    fn next_move(&self, input: &Self::Input, state: &Self::State, mv: &mut Self::Move) -> bool {
        let mid = self.intermediate(input, state, &mv.0);
        if self.second.next_move(input, &mid, &mut mv.1) {
            return true;
        }
        // Inner neighborhood wrapped: advance the outer move and restart
        // the inner enumeration on the new intermediate state.
        loop {
            if !self.first.next_move(input, state, &mut mv.0) {
                return false;
            }
            let mid = self.intermediate(input, state, &mv.0);
            match self.second.first_move(input, &mid) {
                Ok(inner) => {
                    mv.1 = inner;
                    return true;
                }
                Err(EmptyNeighborhood) => continue,
            }
        }
    }

    fn random_move(
        &self,
        input: &Self::Input,
        state: &Self::State,
        rng: &mut dyn RngCore,
    ) -> Result<Self::Move, EmptyNeighborhood> {
        let outer = self.first.random_move(input, state, rng)?;
        let mid = self.intermediate(input, state, &outer);
        let inner = self.second.random_move(input, &mid, rng)?;
        Ok(ProductMove(outer, inner))
    }

    fn make_move(&self, input: &Self::Input, state: &mut Self::State, mv: &Self::Move) {
        self.first.make_move(input, state, &mv.0);
        self.second.make_move(input, state, &mv.1);
    }

    fn modality(&self) -> usize {
        self.first.modality() + self.second.modality()
    }

    fn delta_cost(
        &self,
        input: &Self::Input,
        state: &Self::State,
        mv: &Self::Move,
        weights: Option<&[f64]>,
    ) -> Cost {
        let mut delta = self.first.delta_cost(input, state, &mv.0, weights);
        let mid = self.intermediate(input, state, &mv.0);
        delta += &self.second.delta_cost(input, &mid, &mv.1, weights);
        delta
    }
}

/// Inverse relation over union moves: holds when the active constituents
/// are on the same side and the constituent relation holds; moves of
/// different types are never inverses.
pub struct UnionInverse<R1, R2>(pub R1, pub R2);

impl<M1, M2, R1, R2> InverseRelation<UnionMove<M1, M2>> for UnionInverse<R1, R2>
where
    R1: InverseRelation<M1>,
    R2: InverseRelation<M2>,
{
    fn inverse(&self, a: &UnionMove<M1, M2>, b: &UnionMove<M1, M2>) -> bool {
        match (a, b) {
            (UnionMove::Left(x), UnionMove::Left(y)) => self.0.inverse(x, y),
            (UnionMove::Right(x), UnionMove::Right(y)) => self.1.inverse(x, y),
            _ => false,
        }
    }
}

/// Inverse relation over product moves: holds only when every constituent
/// pair is inverse.
pub struct ProductInverse<R1, R2>(pub R1, pub R2);

impl<M1, M2, R1, R2> InverseRelation<ProductMove<M1, M2>> for ProductInverse<R1, R2>
where
    R1: InverseRelation<M1>,
    R2: InverseRelation<M2>,
{
    fn inverse(&self, a: &ProductMove<M1, M2>, b: &ProductMove<M1, M2>) -> bool {
        self.0.inverse(&a.0, &b.0) && self.1.inverse(&a.1, &b.1)
    }
}
