use crate::lits::{Lit, Var};
use fixedbitset::FixedBitSet;
use itertools::Itertools;
use std::collections::HashSet;
use std::fmt::{Debug, Display, Error, Formatter};

/// A complete assignment together with the number of clauses it leaves
/// unsatisfied. Solutions compare by assignment bit pattern.
#[derive(Clone, PartialEq)]
pub struct Solution {
    values: FixedBitSet,
    num_unsat: u32,
}

impl Solution {
    pub fn new(values: FixedBitSet, num_unsat: u32) -> Solution {
        Solution { values, num_unsat }
    }

    pub fn num_unsat(&self) -> u32 {
        self.num_unsat
    }

    pub fn num_vars(&self) -> u32 {
        self.values.len() as u32
    }

    pub fn value(&self, var: Var) -> bool {
        self.values.contains(var.index())
    }

    pub fn literals(&self) -> impl Iterator<Item = Lit> + '_ {
        (0..self.values.len()).map(move |i| Var::from_index(i).lit(self.values.contains(i)))
    }

    /// Deduplication key: the positions of the true variables.
    fn key(&self) -> Box<[usize]> {
        self.values.ones().collect()
    }
}

impl Display for Solution {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        if self.values.len() > 0 {
            write!(f, "{} ", self.literals().format(" "))?;
        }
        write!(f, "0")
    }
}

impl Debug for Solution {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        write!(f, "Solution({} @ {})", self, self.num_unsat)
    }
}

/// Deduplicated aggregation of solutions.
///
/// Every distinct assignment is counted; retained solutions are capped by
/// `retain_limit` when one is given. The search itself cannot emit the same
/// assignment twice under smallest-index branching, but the sink does not
/// rely on that, and merged sets from several workers or ranks can overlap.
pub struct SolutionSet {
    seen: HashSet<Box<[usize]>>,
    solutions: Vec<Solution>,
    retain_limit: Option<usize>,
}

impl SolutionSet {
    pub fn new() -> SolutionSet {
        SolutionSet::with_retain_limit(None)
    }

    pub fn with_retain_limit(retain_limit: Option<usize>) -> SolutionSet {
        SolutionSet {
            seen: HashSet::new(),
            solutions: Vec::new(),
            retain_limit,
        }
    }

    /// Records a solution. Returns true if the assignment was new.
    pub fn insert(&mut self, solution: Solution) -> bool {
        if !self.seen.insert(solution.key()) {
            return false;
        }
        if self.retain_limit.map_or(true, |max| self.solutions.len() < max) {
            self.solutions.push(solution);
        }
        true
    }

    /// Number of distinct assignments recorded, including any beyond the
    /// retention limit.
    pub fn num_distinct(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Retained solutions, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Solution> {
        self.solutions.iter()
    }

    pub fn merge(&mut self, other: SolutionSet) {
        for sol in other.solutions {
            self.insert(sol);
        }
    }
}

impl Default for SolutionSet {
    fn default() -> Self {
        SolutionSet::new()
    }
}
