//! Exact bounded-unsat enumeration: depth-first DPLL search whose branches
//! are redistributed over a work-stealing worker pool, and optionally over
//! cooperating processes.

pub mod branch;
pub mod distrib;
pub(crate) mod pool;

pub use branch::BranchItem;
pub use distrib::{
    solve_with_transport, ChannelTransport, Message, TokenColour, Transport, TransportError,
};

use crate::cnf::Formula;
use crate::sink::SolutionSet;
use crate::stats::SearchStats;
use crate::StopToken;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct DpllParams {
    /// Assignments falsifying up to this many clauses are enumerated.
    pub max_unsat: u32,
    /// Worker threads; 0 picks the hardware concurrency.
    pub num_workers: usize,
    /// Cap on retained solutions; distinct solutions beyond it are still
    /// counted.
    pub retain_limit: Option<usize>,
    /// Stop as soon as one solution is known instead of enumerating.
    pub stop_on_first: bool,
}

impl Default for DpllParams {
    fn default() -> Self {
        DpllParams {
            max_unsat: 0,
            num_workers: 0,
            retain_limit: None,
            stop_on_first: false,
        }
    }
}

impl DpllParams {
    pub(crate) fn resolved_workers(&self) -> usize {
        if self.num_workers == 0 {
            num_cpus::get()
        } else {
            self.num_workers
        }
    }
}

/// Outcome of a solve. An empty solution set is the `Unsatisfiable` result;
/// `interrupted` marks a cooperative stop, in which case the solutions are
/// the partial results gathered so far.
pub struct SolveReport {
    pub solutions: SolutionSet,
    pub stats: SearchStats,
    pub interrupted: bool,
    pub elapsed: Duration,
}

/// Enumerates every assignment leaving at most `max_unsat` clauses
/// unsatisfied, using an intra-process worker pool.
pub fn solve(formula: &Arc<Formula>, params: &DpllParams, stop: &StopToken) -> SolveReport {
    let start = Instant::now();
    let shared = pool::Shared::new(
        formula.clone(),
        params.max_unsat,
        params.resolved_workers(),
        stop.clone(),
        Box::new(pool::LocalOnly),
    );
    let outcome = pool::run(
        shared,
        vec![BranchItem::root()],
        params.retain_limit,
        params.stop_on_first,
    );
    let report = SolveReport {
        solutions: outcome.solutions,
        stats: outcome.stats,
        interrupted: outcome.interrupted,
        elapsed: start.elapsed(),
    };
    tracing::info!(
        solutions = report.solutions.num_distinct(),
        decisions = report.stats.decisions,
        propagations = report.stats.propagations,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "enumeration finished"
    );
    report
}
