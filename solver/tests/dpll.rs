//! End-to-end enumeration scenarios for the DPLL solver.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use sweepsat::cnf::dimacs;
use sweepsat::{DpllParams, SolveReport, StopToken};

fn solve(input: &str, max_unsat: u32, workers: usize) -> SolveReport {
    let formula = Arc::new(dimacs::parse(input).unwrap());
    let params = DpllParams {
        max_unsat,
        num_workers: workers,
        ..DpllParams::default()
    };
    sweepsat::dpll::solve(&formula, &params, &StopToken::new())
}

/// Solutions as printable literal lines, order-independent.
fn solution_lines(report: &SolveReport) -> BTreeSet<String> {
    report.solutions.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_single_unit_clause() {
    let report = solve("p cnf 1 1\n1 0\n", 0, 1);
    assert_eq!(solution_lines(&report), BTreeSet::from(["1 0".to_string()]));
}

#[test]
fn test_exclusive_pair() {
    let report = solve("p cnf 2 2\n1 2 0\n-1 -2 0\n", 0, 1);
    assert_eq!(
        solution_lines(&report),
        BTreeSet::from(["1 -2 0".to_string(), "-1 2 0".to_string()])
    );
}

#[test]
fn test_tautology_dropped_at_load() {
    // the only clause is a tautology: all four assignments remain
    let report = solve("p cnf 2 1\n1 -1 0\n", 0, 1);
    assert_eq!(report.solutions.num_distinct(), 4);
}

#[test]
fn test_budget_of_one_admits_every_assignment() {
    // each assignment violates at most one of the two clauses
    let report = solve("p cnf 3 2\n1 2 0\n-1 -2 0\n", 1, 1);
    assert_eq!(report.solutions.num_distinct(), 8);
    assert!(report.solutions.iter().all(|s| s.num_unsat() <= 1));
}

#[test]
fn test_pigeonhole_unsatisfiable() {
    // three pigeons into two holes, var (i, j) = 2 * i + j
    let php = "p cnf 6 9\n\
               1 2 0\n3 4 0\n5 6 0\n\
               -1 -3 0\n-1 -5 0\n-3 -5 0\n\
               -2 -4 0\n-2 -6 0\n-4 -6 0\n";
    let report = solve(php, 0, 2);
    assert!(report.solutions.is_empty());
    assert!(!report.interrupted);
}

#[test]
fn test_empty_formula_admits_everything() {
    for max_unsat in [0, 2] {
        let report = solve("p cnf 3 0\n", max_unsat, 1);
        assert_eq!(report.solutions.num_distinct(), 8);
    }
}

#[test]
fn test_empty_clause() {
    let input = "p cnf 2 1\n0\n";
    assert!(solve(input, 0, 1).solutions.is_empty());
    assert_eq!(solve(input, 1, 1).solutions.num_distinct(), 4);
}

#[test]
fn test_single_variable_both_polarities() {
    let report = solve("p cnf 1 0\n", 0, 1);
    assert_eq!(
        solution_lines(&report),
        BTreeSet::from(["1 0".to_string(), "-1 0".to_string()])
    );
}

#[test]
fn test_solution_set_independent_of_thread_count() {
    let input = common::planted_3sat(12, 40, 20240817);
    let baseline = solution_lines(&solve(&input, 1, 1));
    assert!(!baseline.is_empty());
    for workers in [2, 4, 8] {
        let set = solution_lines(&solve(&input, 1, workers));
        assert_eq!(set, baseline, "diverged with {workers} workers");
    }
}

#[test]
fn test_bound_soundness_and_completeness_by_exhaustion() {
    // brute-force cross-check on a small instance
    let input = "p cnf 4 3\n1 2 0\n-2 3 0\n-1 -4 0\n";
    let formula = Arc::new(dimacs::parse(input).unwrap());
    for max_unsat in 0..3u32 {
        let report = solve(input, max_unsat, 2);
        let expected = brute_force_count(&formula, max_unsat);
        assert_eq!(
            report.solutions.num_distinct(),
            expected,
            "wrong count at max_unsat={max_unsat}"
        );
        assert!(report.solutions.iter().all(|s| s.num_unsat() <= max_unsat));
    }
}

fn brute_force_count(formula: &sweepsat::Formula, max_unsat: u32) -> usize {
    let n = formula.num_vars() as usize;
    (0..1usize << n)
        .filter(|&mask| {
            let mut bits = fixedbitset::FixedBitSet::with_capacity(n);
            for i in 0..n {
                bits.set(i, mask & (1 << i) != 0);
            }
            formula.unsat_count(&bits) <= max_unsat
        })
        .count()
}

#[test]
fn test_cancellation_surfaces_partial_results() {
    let stop = StopToken::new();
    stop.stop();
    let formula = Arc::new(dimacs::parse("p cnf 10 0\n").unwrap());
    let report = sweepsat::dpll::solve(&formula, &DpllParams::default(), &stop);
    assert!(report.interrupted);
    assert!(report.solutions.num_distinct() < 1 << 10);
}
