//! Randomised local search with restarts and a wall-clock cutoff.
//!
//! The kernel keeps a complete assignment, the number of satisfying
//! literals per clause, and the set of currently unsatisfied clauses. One
//! step picks an unsatisfied clause uniformly at random and flips one of its
//! variables: a zero-break variable if the clause has one, otherwise with
//! probability `noise` a random variable of the clause and with probability
//! `1 - noise` the one with the fewest broken clauses. Ties go to the
//! smallest variable index so that a fixed seed reproduces the same walk.

use crate::cnf::{ClauseRef, Formula};
use crate::lits::{Lit, Var};
use crate::sink::{Solution, SolutionSet};
use crate::stats::WalkStats;
use crate::StopToken;
use fixedbitset::FixedBitSet;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct WalkSatParams {
    /// Flips per restart.
    pub max_steps: u64,
    /// Probability of a random walk move when no free flip exists.
    pub noise: f64,
    /// Assignments leaving at most this many clauses unsatisfied count as
    /// solutions.
    pub target_unsat: u32,
    /// RNG seed; 0 seeds from OS entropy.
    pub seed: u64,
    /// Wall-clock budget. Zero means: return at the first solution.
    pub cutoff: Duration,
}

impl Default for WalkSatParams {
    fn default() -> Self {
        WalkSatParams {
            max_steps: 10_000,
            noise: 0.5,
            target_unsat: 0,
            seed: 0,
            cutoff: Duration::ZERO,
        }
    }
}

pub struct WalkOutcome {
    pub solutions: SolutionSet,
    pub stats: WalkStats,
    pub elapsed: Duration,
    pub interrupted: bool,
}

/// Set of clause references with O(1) membership toggle and O(1) uniform
/// draw, as an index-position vector pair.
struct UnsatSet {
    items: Vec<ClauseRef>,
    positions: Vec<usize>,
}

const ABSENT: usize = usize::MAX;

impl UnsatSet {
    fn new(num_clauses: usize) -> UnsatSet {
        UnsatSet {
            items: Vec::new(),
            positions: vec![ABSENT; num_clauses],
        }
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn get(&self, index: usize) -> ClauseRef {
        self.items[index]
    }

    fn insert(&mut self, cl: ClauseRef) {
        if self.positions[cl.index()] == ABSENT {
            self.positions[cl.index()] = self.items.len();
            self.items.push(cl);
        }
    }

    fn remove(&mut self, cl: ClauseRef) {
        let pos = self.positions[cl.index()];
        if pos != ABSENT {
            let last = *self.items.last().unwrap();
            self.items.swap_remove(pos);
            self.positions[last.index()] = pos;
            self.positions[cl.index()] = ABSENT;
        }
    }

    fn clear(&mut self) {
        for cl in self.items.drain(..) {
            self.positions[cl.index()] = ABSENT;
        }
    }
}

pub struct WalkSat {
    formula: Arc<Formula>,
    params: WalkSatParams,
    rng: SmallRng,
    values: Vec<bool>,
    sat_count: Vec<u32>,
    unsat: UnsatSet,
    /// Empty clauses can never be satisfied or flipped; they are a fixed
    /// offset on the unsatisfied count rather than members of the set.
    empty_unsat: u32,
    pub stats: WalkStats,
}

impl WalkSat {
    pub fn new(formula: Arc<Formula>, params: WalkSatParams) -> WalkSat {
        assert!(
            (0.0..=1.0).contains(&params.noise),
            "walk probability must be within [0, 1]"
        );
        let rng = if params.seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(params.seed)
        };
        let num_clauses = formula.num_clauses();
        let empty_unsat = formula
            .clauses()
            .filter(|&cl| formula.clause(cl).is_empty())
            .count() as u32;
        WalkSat {
            values: vec![false; formula.num_vars() as usize],
            sat_count: vec![0; num_clauses],
            unsat: UnsatSet::new(num_clauses),
            empty_unsat,
            params,
            rng,
            stats: WalkStats::default(),
            formula,
        }
    }

    /// Runs the walk until the deadline, or until the first solution when no
    /// cutoff was given.
    pub fn run(&mut self, stop: &StopToken) -> WalkOutcome {
        let start = Instant::now();
        let deadline = (self.params.cutoff > Duration::ZERO).then(|| start + self.params.cutoff);
        let mut solutions = SolutionSet::new();
        let mut interrupted = false;
        let mut steps_since_restart = 0u64;

        self.randomize();
        loop {
            if stop.is_stopped() {
                interrupted = true;
                break;
            }
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    break;
                }
            }
            if self.num_unsat() <= self.params.target_unsat {
                if solutions.insert(self.snapshot()) {
                    self.stats.solutions += 1;
                    tracing::debug!(unsat = self.num_unsat(), "assignment meets target");
                }
                if deadline.is_none() {
                    break;
                }
                if self.unsat.is_empty() {
                    // nothing left to flip towards: restart to look for
                    // other solutions until the deadline
                    self.restart();
                    steps_since_restart = 0;
                    continue;
                }
            } else if self.unsat.is_empty() {
                // only empty clauses are unsatisfied: the target is
                // unreachable under any assignment
                break;
            }
            if steps_since_restart >= self.params.max_steps {
                self.restart();
                steps_since_restart = 0;
                continue;
            }
            let cl = self.unsat.get(self.rng.gen_range(0..self.unsat.len()));
            let var = self.pick_flip_var(cl);
            self.flip(var);
            steps_since_restart += 1;
            self.stats.steps += 1;
        }

        WalkOutcome {
            solutions,
            stats: self.stats.clone(),
            elapsed: start.elapsed(),
            interrupted,
        }
    }

    fn num_unsat(&self) -> u32 {
        self.empty_unsat + self.unsat.len() as u32
    }

    fn restart(&mut self) {
        self.randomize();
        self.stats.restarts += 1;
    }

    /// Draws a fresh random assignment and rebuilds the satisfaction
    /// bookkeeping in one pass over the formula.
    fn randomize(&mut self) {
        for v in self.values.iter_mut() {
            *v = self.rng.gen();
        }
        let formula = self.formula.clone();
        self.unsat.clear();
        for cl in formula.clauses() {
            let lits = formula.clause(cl);
            let n = lits.iter().filter(|&&l| self.lit_true(l)).count() as u32;
            self.sat_count[cl.index()] = n;
            if n == 0 && !lits.is_empty() {
                self.unsat.insert(cl);
            }
        }
    }

    fn lit_true(&self, lit: Lit) -> bool {
        self.values[lit.var().index()] == lit.is_positive()
    }

    /// The literal of `var` that currently holds.
    fn true_lit(&self, var: Var) -> Lit {
        var.lit(self.values[var.index()])
    }

    /// Number of clauses kept satisfied only by `var`, which flipping it
    /// would break.
    fn break_count(&self, var: Var) -> u32 {
        self.formula
            .occurrences(self.true_lit(var))
            .iter()
            .filter(|&&cl| self.sat_count[cl.index()] == 1)
            .count() as u32
    }

    /// Selects the variable of `cl` to flip. Clause literals are stored in
    /// ascending variable order, so keeping the first minimum breaks ties by
    /// smallest index.
    fn pick_flip_var(&mut self, cl: ClauseRef) -> Var {
        let formula = self.formula.clone();
        let lits = formula.clause(cl);
        debug_assert!(!lits.is_empty());
        let mut min_var = lits[0].var();
        let mut min_break = u32::MAX;
        for &l in lits {
            let b = self.break_count(l.var());
            if b < min_break {
                min_break = b;
                min_var = l.var();
            }
        }
        if min_break == 0 {
            return min_var;
        }
        if self.rng.gen_bool(self.params.noise) {
            lits[self.rng.gen_range(0..lits.len())].var()
        } else {
            min_var
        }
    }

    fn flip(&mut self, var: Var) {
        let now_false = self.true_lit(var);
        self.values[var.index()] = !self.values[var.index()];
        let now_true = self.true_lit(var);
        for &cl in self.formula.occurrences(now_true) {
            self.sat_count[cl.index()] += 1;
            if self.sat_count[cl.index()] == 1 {
                self.unsat.remove(cl);
            }
        }
        for &cl in self.formula.occurrences(now_false) {
            self.sat_count[cl.index()] -= 1;
            if self.sat_count[cl.index()] == 0 {
                self.unsat.insert(cl);
            }
        }
        self.stats.flips += 1;
    }

    fn snapshot(&self) -> Solution {
        let mut bits = FixedBitSet::with_capacity(self.values.len());
        for (i, &v) in self.values.iter().enumerate() {
            if v {
                bits.insert(i);
            }
        }
        debug_assert_eq!(self.num_unsat(), self.formula.unsat_count(&bits));
        Solution::new(bits, self.num_unsat())
    }
}
