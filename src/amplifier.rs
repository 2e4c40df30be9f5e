use num_bigint::BigInt;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::machine::{Machine, State};

/// How the stages of a [`Circuit`] are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wiring {
    /// Stage *i* feeds stage *i+1*; the last stage's output leaves the circuit.
    Series,
    /// As `Series`, but the last stage also feeds the first.
    Feedback,
}

/// A chain of machines running the same program, each primed with its own
/// phase setting.
///
/// Scheduling is round-robin: every round runs each stage until it blocks
/// for input or halts, forwarding its outputs to the next stage as they
/// appear. The circuit finishes when every stage has halted.
pub struct Circuit {
    stages: Vec<Machine>,
    wiring: Wiring,
}

impl Circuit {
    pub fn new<T: Clone + Into<BigInt>>(program: &[T], phases: &[i64], wiring: Wiring) -> Self {
        let stages = phases
            .iter()
            .map(|&phase| {
                let mut m = Machine::new(program);
                m.feed(phase);
                m
            })
            .collect();
        Self { stages, wiring }
    }

    /// Inject `signal` into the first stage and run to completion.
    /// Returns the last value the last stage emitted before halting.
    pub fn run(&mut self, signal: impl Into<BigInt>) -> Result<BigInt> {
        let n = self.stages.len();
        if n == 0 {
            return Err(Error::NoSignal);
        }
        self.stages[0].feed(signal);

        let mut last = None;
        for round in 1.. {
            let mut progressed = false;
            for i in 0..n {
                let was_halted = self.stages[i].is_halted();
                let outputs = self.stages[i].run_until_blocked()?;
                progressed |= !outputs.is_empty() || was_halted != self.stages[i].is_halted();
                trace!(round, stage = i, emitted = outputs.len(), state = ?self.stages[i].state());

                for value in outputs {
                    if i + 1 < n {
                        self.stages[i + 1].feed(value);
                    } else {
                        if self.wiring == Wiring::Feedback {
                            self.stages[0].feed(value.clone());
                        }
                        last = Some(value);
                    }
                }
            }

            if self.stages.iter().all(|s| s.state() == State::Halted) {
                debug!(rounds = round, signal = ?last, "circuit halted");
                break;
            }
            if !progressed {
                return Err(Error::Deadlock);
            }
        }
        last.ok_or(Error::NoSignal)
    }
}

/// Run `program` as a series chain, one stage per phase.
pub fn chain<T>(program: &[T], phases: &[i64], signal: impl Into<BigInt>) -> Result<BigInt>
where
    T: Clone + Into<BigInt>,
{
    Circuit::new(program, phases, Wiring::Series).run(signal)
}

/// Run `program` as a feedback loop, one stage per phase.
pub fn feedback_loop<T>(program: &[T], phases: &[i64], signal: impl Into<BigInt>) -> Result<BigInt>
where
    T: Clone + Into<BigInt>,
{
    Circuit::new(program, phases, Wiring::Feedback).run(signal)
}

/// Try every ordering of `phase_set` (in parallel) and return the highest
/// final signal along with the ordering producing it.
pub fn best_phases<T>(
    program: &[T],
    phase_set: &[i64],
    wiring: Wiring,
    signal: impl Into<BigInt>,
) -> Result<(BigInt, Vec<i64>)>
where
    T: Clone + Into<BigInt> + Sync,
{
    let signal = signal.into();
    let results = permutations(phase_set)
        .into_par_iter()
        .map(|phases| {
            let out = Circuit::new(program, &phases, wiring).run(signal.clone())?;
            Ok((out, phases))
        })
        .collect::<Result<Vec<_>>>()?;

    let best = results
        .into_iter()
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .ok_or(Error::NoSignal)?;
    debug!(signal = %best.0, phases = ?best.1, "best phase setting");
    Ok(best)
}

/// All orderings of `items`, lexicographic in input position.
pub fn permutations(items: &[i64]) -> Vec<Vec<i64>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let first = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, first);
            out.push(tail);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERIES_A: [i64; 17] = [3, 15, 3, 16, 1002, 16, 10, 16, 1, 16, 15, 15, 4, 15, 99, 0, 0];

    const SERIES_B: [i64; 25] = [
        3, 23, 3, 24, 1002, 24, 10, 24, 1002, 23, -1, 23, 101, 5, 23, 23, 1, 24, 23, 23, 4, 23,
        99, 0, 0,
    ];

    const FEEDBACK_A: [i64; 29] = [
        3, 26, 1001, 26, -4, 26, 3, 27, 1002, 27, 2, 27, 1, 27, 26, 27, 4, 27, 1001, 28, -1, 28,
        1005, 28, 6, 99, 0, 0, 5,
    ];

    const FEEDBACK_B: [i64; 57] = [
        3, 52, 1001, 52, -5, 52, 3, 53, 1, 52, 56, 54, 1007, 54, 5, 55, 1005, 55, 26, 1001, 54,
        -5, 54, 1105, 1, 12, 1, 53, 54, 53, 1008, 54, 0, 55, 1001, 55, 1, 55, 2, 53, 55, 53, 4,
        53, 1001, 56, -1, 56, 1005, 56, 6, 99, 0, 0, 0, 0, 10,
    ];

    #[test]
    fn series_chain() {
        assert_eq!(chain(&SERIES_A, &[4, 3, 2, 1, 0], 0).unwrap(), BigInt::from(43210));
        assert_eq!(chain(&SERIES_B, &[0, 1, 2, 3, 4], 0).unwrap(), BigInt::from(54321));
    }

    #[test]
    fn best_series() {
        let (signal, phases) = best_phases(&SERIES_A, &[0, 1, 2, 3, 4], Wiring::Series, 0).unwrap();
        assert_eq!(signal, BigInt::from(43210));
        assert_eq!(phases, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn feedback() {
        let a = feedback_loop(&FEEDBACK_A, &[9, 8, 7, 6, 5], 0).unwrap();
        assert_eq!(a, BigInt::from(139629729));
        let b = feedback_loop(&FEEDBACK_B, &[9, 7, 8, 5, 6], 0).unwrap();
        assert_eq!(b, BigInt::from(18216));
    }

    #[test]
    fn best_feedback() {
        let (signal, phases) =
            best_phases(&FEEDBACK_A, &[5, 6, 7, 8, 9], Wiring::Feedback, 0).unwrap();
        assert_eq!(signal, BigInt::from(139629729));
        assert_eq!(phases, vec![9, 8, 7, 6, 5]);
    }

    #[test]
    fn signal_beyond_64_bits() {
        // Each stage multiplies the incoming signal by its phase.
        let program = [3, 11, 3, 12, 2, 11, 12, 12, 4, 12, 99, 0, 0];
        let signal = BigInt::from(u64::MAX);
        let out = chain(&program, &[2, 3], signal.clone()).unwrap();
        assert_eq!(out, signal * 6);
    }

    #[test]
    fn no_output_is_no_signal() {
        assert!(matches!(chain(&[3, 0, 3, 0, 99], &[1], 0), Err(Error::NoSignal)));
        assert!(matches!(chain(&[99], &[], 0), Err(Error::NoSignal)));
    }

    #[test]
    fn starved_stage_is_deadlock() {
        assert!(matches!(chain(&[3, 0, 3, 0, 3, 0, 99], &[1], 0), Err(Error::Deadlock)));
    }

    #[test]
    fn stage_errors_propagate() {
        let err = chain(&[3, 0, 3, 0, 42], &[1, 2], 0).unwrap_err();
        assert!(matches!(err, Error::InvalidOpcode { address: 4, .. }));
    }

    #[test]
    fn permutation_count_and_order() {
        let perms = permutations(&[1, 2, 3]);
        assert_eq!(
            perms,
            vec![
                vec![1, 2, 3],
                vec![1, 3, 2],
                vec![2, 1, 3],
                vec![2, 3, 1],
                vec![3, 1, 2],
                vec![3, 2, 1],
            ]
        );
        assert_eq!(permutations(&[0, 1, 2, 3, 4]).len(), 120);
        assert_eq!(permutations(&[]), vec![Vec::<i64>::new()]);
    }
}
