//! Kicker: sequences of related moves applied as one compound
//! perturbation, for intensification and diversification.
//!
//! A kick of length `k` is built by chaining `k` moves, each generated on
//! the state produced by its predecessor and subject to an optional
//! relatedness predicate. Enumeration is exhaustive with explicit
//! backtracking; sampling draws random moves per position and rotates
//! until a related one is found.

use std::sync::Arc;

use rand::{Rng, RngCore};

use crate::cost::Cost;
use crate::error::EmptyNeighborhood;
use crate::explore::NeighborhoodExplorer;
use crate::model::SolutionManager;

/// One position of a kick: the move, its (lazily evaluated) delta cost and
/// the state after applying it.
#[derive(Debug, Clone)]
pub struct KickStep<S, M> {
    pub mv: M,
    pub cost: Option<Cost>,
    pub state: S,
}

/// An ordered sequence of chained moves.
pub type Kick<S, M> = Vec<KickStep<S, M>>;

type RelatedFn<I, S, M> = Arc<dyn Fn(&I, &S, &M, &M) -> bool + Send + Sync>;

/// Generates and evaluates kicks over one neighborhood explorer.
pub struct Kicker<SM, NE>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    sm: Arc<SM>,
    ne: Arc<NE>,
    related: Option<RelatedFn<SM::Input, SM::State, NE::Move>>,
    compute_delta: bool,
}

impl<SM, NE> Clone for Kicker<SM, NE>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    fn clone(&self) -> Self {
        Kicker {
            sm: Arc::clone(&self.sm),
            ne: Arc::clone(&self.ne),
            related: self.related.clone(),
            compute_delta: self.compute_delta,
        }
    }
}

impl<SM, NE> Kicker<SM, NE>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    pub fn new(sm: Arc<SM>, ne: Arc<NE>) -> Self {
        Kicker {
            sm,
            ne,
            related: None,
            compute_delta: true,
        }
    }

    /// Restricts consecutive kick moves to related pairs. The predicate
    /// sees the state between the two moves. Without a predicate all moves
    /// are related.
    pub fn set_related<F>(&mut self, related: F)
    where
        F: Fn(&SM::Input, &SM::State, &NE::Move, &NE::Move) -> bool + Send + Sync + 'static,
    {
        self.related = Some(Arc::new(related));
    }

    /// Move-only convenience form of [`set_related`](Kicker::set_related).
    pub fn set_related_moves<F>(&mut self, related: F)
    where
        F: Fn(&NE::Move, &NE::Move) -> bool + Send + Sync + 'static,
    {
        self.related = Some(Arc::new(move |_, _, prev, next| related(prev, next)));
    }

    /// Chooses between the fast path (sum of per-step deltas) and the
    /// authoritative one (full cost of the end state minus the start).
    pub fn set_compute_delta(&mut self, compute_delta: bool) {
        self.compute_delta = compute_delta;
    }

    pub fn modality(&self) -> usize {
        self.ne.modality()
    }

    fn is_related(
        &self,
        input: &SM::Input,
        between: &SM::State,
        prev: &NE::Move,
        next: &NE::Move,
    ) -> bool {
        match &self.related {
            Some(related) => related(input, between, prev, next),
            None => true,
        }
    }

    fn base_state(&self, start: &SM::State, kick: &[KickStep<SM::State, NE::Move>], cur: usize) -> SM::State {
        if cur == 0 {
            start.clone()
        } else {
            kick[cur - 1].state.clone()
        }
    }

    /// Relatedness of a candidate at position `cur` against its
    /// predecessor; vacuous at position 0.
    fn related_at(
        &self,
        input: &SM::Input,
        kick: &[KickStep<SM::State, NE::Move>],
        cur: usize,
        base: &SM::State,
        mv: &NE::Move,
    ) -> bool {
        if cur == 0 {
            return true;
        }
        self.is_related(input, base, &kick[cur - 1].mv, mv)
    }

    fn apply(
        &self,
        input: &SM::Input,
        base: &SM::State,
        mv: NE::Move,
    ) -> KickStep<SM::State, NE::Move> {
        let mut state = base.clone();
        self.ne.make_move(input, &mut state, &mv);
        KickStep {
            mv,
            cost: None,
            state,
        }
    }

    /// Builds the lexicographically first kick of the given length.
    fn first_kick(
        &self,
        length: usize,
        input: &SM::Input,
        start: &SM::State,
    ) -> Result<Kick<SM::State, NE::Move>, EmptyNeighborhood> {
        let mut kick: Kick<SM::State, NE::Move> = Vec::with_capacity(length);
        let mut backtracking = false;
        loop {
            let cur = kick.len();
            if cur == length && !backtracking {
                return Ok(kick);
            }
            if backtracking {
                // Advance the deepest placed move; drop it when its
                // neighborhood is exhausted.
                let Some(step) = kick.pop() else {
                    return Err(EmptyNeighborhood);
                };
                let cur = kick.len();
                let base = self.base_state(start, &kick, cur);
                let mut mv = step.mv;
                loop {
                    if !self.ne.next_move(input, &base, &mut mv) {
                        break; // stay backtracking, pop the next one
                    }
                    if self.related_at(input, &kick, cur, &base, &mv) {
                        kick.push(self.apply(input, &base, mv));
                        backtracking = false;
                        break;
                    }
                }
            } else {
                let base = self.base_state(start, &kick, cur);
                match self.ne.first_move(input, &base) {
                    Err(EmptyNeighborhood) => backtracking = true,
                    Ok(mut mv) => loop {
                        if self.related_at(input, &kick, cur, &base, &mv) {
                            kick.push(self.apply(input, &base, mv));
                            break;
                        }
                        if !self.ne.next_move(input, &base, &mut mv) {
                            backtracking = true;
                            break;
                        }
                    },
                }
            }
        }
    }

    /// Advances `kick` to its successor; false when the enumeration is
    /// complete. Steps regenerated on the way get their cached cost
    /// invalidated.
    fn next_kick(
        &self,
        input: &SM::Input,
        start: &SM::State,
        kick: &mut Kick<SM::State, NE::Move>,
    ) -> bool {
        let length = kick.len();
        let mut backtracking = true;
        loop {
            let cur = kick.len();
            if cur == length && !backtracking {
                return true;
            }
            if backtracking {
                let Some(step) = kick.pop() else {
                    return false;
                };
                let cur = kick.len();
                let base = self.base_state(start, kick, cur);
                let mut mv = step.mv;
                loop {
                    if !self.ne.next_move(input, &base, &mut mv) {
                        break;
                    }
                    if self.related_at(input, kick, cur, &base, &mv) {
                        kick.push(self.apply(input, &base, mv));
                        backtracking = false;
                        break;
                    }
                }
            } else {
                let base = self.base_state(start, kick, cur);
                match self.ne.first_move(input, &base) {
                    Err(EmptyNeighborhood) => backtracking = true,
                    Ok(mut mv) => loop {
                        if self.related_at(input, kick, cur, &base, &mv) {
                            kick.push(self.apply(input, &base, mv));
                            break;
                        }
                        if !self.ne.next_move(input, &base, &mut mv) {
                            backtracking = true;
                            break;
                        }
                    },
                }
            }
        }
    }

    /// Draws one random kick: a random move per position, rotated through
    /// the neighborhood (wrapping around) until a related one turns up;
    /// a full rotation backtracks.
    fn random_kick(
        &self,
        length: usize,
        input: &SM::Input,
        start: &SM::State,
        rng: &mut dyn RngCore,
    ) -> Result<Kick<SM::State, NE::Move>, EmptyNeighborhood> {
        let mut kick: Kick<SM::State, NE::Move> = Vec::with_capacity(length);
        // First draw per position, kept across backtracks to detect a full
        // rotation.
        let mut initial: Vec<Option<NE::Move>> = vec![None; length];
        let mut backtracking = false;
        loop {
            let cur = kick.len();
            if cur == length && !backtracking {
                return Ok(kick);
            }
            if backtracking {
                let Some(step) = kick.pop() else {
                    return Err(EmptyNeighborhood);
                };
                let cur = kick.len();
                let base = self.base_state(start, &kick, cur);
                let mut mv = step.mv;
                let mut exhausted = false;
                loop {
                    if !self.ne.next_move(input, &base, &mut mv) {
                        match self.ne.first_move(input, &base) {
                            Ok(first) => mv = first,
                            Err(EmptyNeighborhood) => {
                                exhausted = true;
                                break;
                            }
                        }
                    }
                    if initial[cur].as_ref() == Some(&mv) {
                        exhausted = true;
                        break;
                    }
                    if self.related_at(input, &kick, cur, &base, &mv) {
                        kick.push(self.apply(input, &base, mv));
                        backtracking = false;
                        break;
                    }
                }
                if exhausted {
                    continue; // keep backtracking
                }
            } else {
                let base = self.base_state(start, &kick, cur);
                match self.ne.random_move(input, &base, rng) {
                    Err(EmptyNeighborhood) => backtracking = true,
                    Ok(mut mv) => {
                        if initial[cur].is_none() {
                            initial[cur] = Some(mv.clone());
                        }
                        let mut exhausted = false;
                        while !self.related_at(input, &kick, cur, &base, &mv) {
                            if !self.ne.next_move(input, &base, &mut mv) {
                                match self.ne.first_move(input, &base) {
                                    Ok(first) => mv = first,
                                    Err(EmptyNeighborhood) => {
                                        exhausted = true;
                                        break;
                                    }
                                }
                            }
                            if initial[cur].as_ref() == Some(&mv) {
                                exhausted = true;
                                break;
                            }
                        }
                        if exhausted {
                            backtracking = true;
                        } else {
                            kick.push(self.apply(input, &base, mv));
                        }
                    }
                }
            }
        }
    }

    /// Total delta of the kick; per-step deltas are cached in the steps.
    fn kick_cost(
        &self,
        input: &SM::Input,
        start: &SM::State,
        kick: &mut Kick<SM::State, NE::Move>,
    ) -> Cost {
        if self.compute_delta {
            let mut total = Cost::zero(0);
            for i in 0..kick.len() {
                if kick[i].cost.is_none() {
                    let before = self.base_state(start, kick, i);
                    kick[i].cost = Some(self.ne.delta_cost(input, &before, &kick[i].mv, None));
                }
                if let Some(cost) = &kick[i].cost {
                    total += cost;
                }
            }
            total
        } else {
            match kick.last() {
                Some(last) => {
                    self.sm.cost(input, &last.state, None) - self.sm.cost(input, start, None)
                }
                None => Cost::zero(0),
            }
        }
    }

    /// First kick with a strictly negative total delta, or `None` when the
    /// enumeration finds no improving kick.
    pub fn select_first(
        &self,
        length: usize,
        input: &SM::Input,
        state: &SM::State,
    ) -> Result<Option<(Kick<SM::State, NE::Move>, Cost)>, EmptyNeighborhood> {
        let mut kick = self.first_kick(length, input, state)?;
        loop {
            let cost = self.kick_cost(input, state, &mut kick);
            if cost < 0.0 {
                return Ok(Some((kick, cost)));
            }
            if !self.next_kick(input, state, &mut kick) {
                return Ok(None);
            }
        }
    }

    /// Exhaustive minimum over all kicks, ties broken uniformly at random.
    pub fn select_best(
        &self,
        length: usize,
        input: &SM::Input,
        state: &SM::State,
        rng: &mut dyn RngCore,
    ) -> Result<(Kick<SM::State, NE::Move>, Cost), EmptyNeighborhood> {
        let mut kick = self.first_kick(length, input, state)?;
        let mut best: Option<(Kick<SM::State, NE::Move>, Cost)> = None;
        let mut ties: u64 = 0;
        loop {
            let cost = self.kick_cost(input, state, &mut kick);
            let replace = match &best {
                None => {
                    ties = 1;
                    true
                }
                Some((_, incumbent)) if cost < *incumbent => {
                    ties = 1;
                    true
                }
                Some((_, incumbent)) if cost == *incumbent => {
                    ties += 1;
                    rng.random_range(0..ties) == 0
                }
                Some(_) => false,
            };
            if replace {
                best = Some((kick.clone(), cost));
            }
            if !self.next_kick(input, state, &mut kick) {
                break;
            }
        }
        best.ok_or(EmptyNeighborhood)
    }

    /// One random kick with its total delta.
    pub fn select_random(
        &self,
        length: usize,
        input: &SM::Input,
        state: &SM::State,
        rng: &mut dyn RngCore,
    ) -> Result<(Kick<SM::State, NE::Move>, Cost), EmptyNeighborhood> {
        let mut kick = self.random_kick(length, input, state, rng)?;
        let cost = self.kick_cost(input, state, &mut kick);
        Ok((kick, cost))
    }

    /// Applies a kick: the state becomes the last step's state.
    pub fn make_kick(
        &self,
        _input: &SM::Input,
        state: &mut SM::State,
        kick: &Kick<SM::State, NE::Move>,
    ) {
        if let Some(last) = kick.last() {
            *state = last.state.clone();
        }
    }
}
