//! Bounded-unsat SAT solving over CNF formulas, two ways:
//!
//! - [`dpll`]: exact, complete enumeration of every assignment leaving at
//!   most `max_unsat` clauses unsatisfied, parallelised over a
//!   work-stealing pool of threads and optionally over cooperating
//!   processes behind a [`dpll::Transport`].
//! - [`walksat`]: incomplete randomised local search with restarts and a
//!   wall-clock cutoff.
//!
//! Both emit deduplicated [`sink::Solution`]s. Formulas are loaded from
//! DIMACS text via [`cnf::dimacs`] and shared read-only between workers.

pub mod assignment;
pub mod cnf;
pub mod dpll;
pub mod engine;
pub mod lits;
pub mod params;
pub mod sink;
pub mod stats;
pub mod walksat;

pub use cnf::dimacs::ParseError;
pub use cnf::Formula;
pub use dpll::{DpllParams, SolveReport, TransportError};
pub use lits::{Lit, Var};
pub use sink::{Solution, SolutionSet};
pub use walksat::{WalkOutcome, WalkSat, WalkSatParams};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cooperative stop flag. Workers check it at every propagation
/// fixpoint and every walk step; setting it surfaces whatever was gathered
/// so far as partial results.
#[derive(Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> StopToken {
        StopToken::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        // advisory flag: checks are frequent and nothing is published
        // through it, so relaxed ordering is enough
        self.0.load(Ordering::Relaxed)
    }
}

/// Failures a solve can surface. An unsatisfiable formula is not one of
/// them: it is an ordinary empty outcome.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("solve interrupted before completion")]
    Cancelled,
}
