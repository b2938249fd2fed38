//! Variable neighborhood descent over kicks of growing length.

use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};

use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cost::Cost;
use crate::error::{EmptyNeighborhood, Error};
use crate::explore::NeighborhoodExplorer;
use crate::interrupt::Interrupt;
use crate::kicker::Kicker;
use crate::model::SolutionManager;
use crate::params::ParameterBox;
use crate::runner::{RunState, Runner, SharedBest};

/// Systematic descent through kick neighborhoods of length 1 to `max_k`:
/// the best kick of the current length is applied when improving (and the
/// length resets to 1); otherwise the length grows, and the run stops once
/// no length yields an improvement.
pub struct VariableNeighborhoodDescent<SM, NE>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    name: String,
    sm: Arc<SM>,
    kicker: Kicker<SM, NE>,
    params: ParameterBox,
    interrupt: Interrupt,
    run: RunState,
    best: SharedBest<SM::State>,
}

impl<SM, NE> VariableNeighborhoodDescent<SM, NE>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    pub fn new(sm: Arc<SM>, ne: Arc<NE>, name: &str) -> Self {
        let mut params = ParameterBox::new(name);
        params.register_uint("max_k", "Maximum kick length");
        params.register_uint("seed", "Random seed for a reproducible run");
        VariableNeighborhoodDescent {
            name: name.to_string(),
            sm: Arc::clone(&sm),
            kicker: Kicker::new(sm, ne),
            params,
            interrupt: Interrupt::new(),
            run: RunState::default(),
            best: Arc::new(Mutex::new(None)),
        }
    }

    /// Restricts consecutive kick moves, see [`Kicker::set_related`].
    pub fn set_related<F>(&mut self, related: F)
    where
        F: Fn(&SM::Input, &SM::State, &NE::Move, &NE::Move) -> bool + Send + Sync + 'static,
    {
        self.kicker.set_related(related);
    }

    pub fn run_state(&self) -> &RunState {
        &self.run
    }

    fn run_loop(
        &mut self,
        input: &SM::Input,
        state: &mut SM::State,
        max_steps: Option<u64>,
    ) -> Result<Cost, Error> {
        let mut rng = if self.params.is_set("seed") {
            StdRng::seed_from_u64(self.params.uint("seed")?)
        } else {
            StdRng::from_os_rng()
        };
        let max_k = self.params.uint("max_k")?;
        if max_k == 0 {
            return Err(Error::incorrect("max_k", "should be greater than zero"));
        }
        self.run = RunState::default();
        self.run.max_evaluations = u64::MAX;
        self.run.current_cost = self.sm.cost(input, state, None);
        self.run.best_cost = self.run.current_cost.clone();
        let mut best_state = state.clone();
        *self.best.lock().unwrap() = Some((best_state.clone(), self.run.best_cost.clone()));

        let mut k = 1usize;
        loop {
            if self.interrupt.stop_requested()
                || self.sm.lower_bound_reached(input, &self.run.current_cost)
            {
                break;
            }
            if let Some(limit) = max_steps {
                if self.run.iteration >= limit {
                    break;
                }
            }
            match self.kicker.select_best(k, input, state, &mut rng) {
                Err(EmptyNeighborhood) => break,
                Ok((kick, cost)) => {
                    self.run.iteration += 1;
                    if cost < 0.0 {
                        self.kicker.make_kick(input, state, &kick);
                        self.run.current_cost += &cost;
                        if self.run.current_cost < self.run.best_cost {
                            self.run.best_cost = self.run.current_cost.clone();
                            self.run.iteration_of_best = self.run.iteration;
                            best_state = state.clone();
                            *self.best.lock().unwrap() =
                                Some((best_state.clone(), self.run.best_cost.clone()));
                            debug!(
                                "{}: new best {} with kick length {}",
                                self.name, self.run.best_cost, k
                            );
                        }
                        k = 1;
                    } else {
                        k += 1;
                        if k as u64 > max_k {
                            break;
                        }
                    }
                }
            }
        }
        *state = best_state;
        Ok(self.run.best_cost.clone())
    }
}

impl<SM, NE> Clone for VariableNeighborhoodDescent<SM, NE>
where
    SM: SolutionManager,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State>,
{
    fn clone(&self) -> Self {
        VariableNeighborhoodDescent {
            name: self.name.clone(),
            sm: Arc::clone(&self.sm),
            kicker: self.kicker.clone(),
            params: self.params.clone(),
            interrupt: Interrupt::new(),
            run: RunState::default(),
            best: Arc::new(Mutex::new(None)),
        }
    }
}

impl<SM, NE> Runner<SM::Input, SM::State> for VariableNeighborhoodDescent<SM, NE>
where
    SM: SolutionManager + 'static,
    NE: NeighborhoodExplorer<Input = SM::Input, State = SM::State> + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn modality(&self) -> usize {
        self.kicker.modality()
    }

    fn go(&mut self, input: &SM::Input, state: &mut SM::State) -> Result<Cost, Error> {
        self.run_loop(input, state, None)
    }

    fn step(&mut self, input: &SM::Input, state: &mut SM::State, n: u64) -> Result<Cost, Error> {
        self.run_loop(input, state, Some(n))
    }

    fn interrupt_handle(&self) -> Interrupt {
        self.interrupt.clone()
    }

    fn best_handle(&self) -> SharedBest<SM::State> {
        Arc::clone(&self.best)
    }

    fn clone_runner(&self) -> Box<dyn Runner<SM::Input, SM::State>> {
        Box::new(self.clone())
    }

    fn params(&self) -> &ParameterBox {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParameterBox {
        &mut self.params
    }

    fn read_parameters(
        &mut self,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<(), Error> {
        writeln!(output, "{} -- INPUT PARAMETERS", self.name)?;
        self.params.read_from(input, output)
    }

    fn print(&self, output: &mut dyn Write) -> std::io::Result<()> {
        writeln!(output, "  {}", self.name)?;
        self.params.print(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testbed::{BitFlip, BitFlipManager};

    fn vnd() -> VariableNeighborhoodDescent<BitFlipManager, BitFlip> {
        VariableNeighborhoodDescent::new(
            Arc::new(BitFlipManager::new()),
            Arc::new(BitFlip::new()),
            "vnd",
        )
    }

    #[test]
    fn test_max_k_is_required() {
        let mut runner = vnd();
        let mut state = vec![true; 4];
        assert!(matches!(
            runner.go(&4, &mut state),
            Err(Error::ParameterNotSet(_))
        ));
    }

    #[test]
    fn test_zero_max_k_is_rejected() {
        let mut runner = vnd();
        runner.params_mut().set_uint("max_k", 0).unwrap();
        let mut state = vec![true; 4];
        assert!(matches!(
            runner.go(&4, &mut state),
            Err(Error::IncorrectParameterValue { .. })
        ));
    }

    #[test]
    fn test_descent_reaches_the_optimum() {
        let mut runner = vnd();
        runner.params_mut().set_uint("max_k", 2).unwrap();
        runner.params_mut().set_uint("seed", 42).unwrap();
        let mut state = vec![true; 6];
        let best = runner.go(&6, &mut state).unwrap();
        assert_eq!(best.total, 0.0);
        assert_eq!(state, vec![false; 6]);
    }

    #[test]
    fn test_stops_when_no_kick_length_improves() {
        // Already optimal: k grows to max_k, then the run stops. The
        // offset keeps the lower bound unreachable, so termination comes
        // from the exhausted kick lengths.
        let sm = Arc::new(BitFlipManager::with_offset());
        let mut runner = VariableNeighborhoodDescent::new(sm, Arc::new(BitFlip::new()), "vnd");
        runner.params_mut().set_uint("max_k", 3).unwrap();
        runner.params_mut().set_uint("seed", 42).unwrap();
        let mut state = vec![false; 4];
        let best = runner.go(&4, &mut state).unwrap();
        assert_eq!(best.total, 1.0);
        assert_eq!(state, vec![false; 4]);
        assert_eq!(runner.run_state().iteration, 3);
    }
}
