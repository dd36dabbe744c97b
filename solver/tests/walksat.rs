//! End-to-end Walk-SAT scenarios, seeded for determinism.

mod common;

use std::sync::Arc;
use std::time::Duration;
use sweepsat::cnf::dimacs;
use sweepsat::{StopToken, WalkSat, WalkSatParams};

#[test]
fn test_random_3sat_at_threshold_ratio() {
    // 50 variables at clause ratio 4.2, planted satisfiable; one walk with
    // restarts finds an assignment well within the cutoff
    let input = common::planted_3sat(50, 210, 424_242);
    let formula = Arc::new(dimacs::parse(&input).unwrap());
    let params = WalkSatParams {
        max_steps: 10_000,
        noise: 0.5,
        target_unsat: 0,
        seed: 1,
        cutoff: Duration::from_secs(5),
    };
    let mut walk = WalkSat::new(formula, params);
    let outcome = walk.run(&StopToken::new());
    assert!(
        outcome.solutions.num_distinct() >= 1,
        "no satisfying assignment found within the cutoff"
    );
    assert!(outcome.solutions.iter().all(|s| s.num_unsat() == 0));
}

#[test]
fn test_target_bound_is_respected() {
    let input = common::planted_3sat(20, 85, 99);
    let formula = Arc::new(dimacs::parse(&input).unwrap());
    let params = WalkSatParams {
        max_steps: 2_000,
        target_unsat: 2,
        seed: 5,
        ..WalkSatParams::default()
    };
    let mut walk = WalkSat::new(formula, params);
    let outcome = walk.run(&StopToken::new());
    assert!(outcome.solutions.iter().all(|s| s.num_unsat() <= 2));
}

#[test]
fn test_cutoff_collects_several_solutions() {
    // a loose formula has many distinct solutions; with a deadline the walk
    // keeps going after the first one
    let formula = Arc::new(dimacs::parse("p cnf 6 2\n1 2 3 0\n-4 -5 0\n").unwrap());
    let params = WalkSatParams {
        max_steps: 50,
        seed: 77,
        cutoff: Duration::from_millis(300),
        ..WalkSatParams::default()
    };
    let mut walk = WalkSat::new(formula, params);
    let outcome = walk.run(&StopToken::new());
    assert!(outcome.solutions.num_distinct() > 1);
    assert!(outcome.stats.restarts > 0);
}

#[test]
fn test_cancellation() {
    let stop = StopToken::new();
    stop.stop();
    let formula = Arc::new(dimacs::parse("p cnf 3 1\n1 2 3 0\n").unwrap());
    let mut walk = WalkSat::new(formula, WalkSatParams::default());
    let outcome = walk.run(&stop);
    assert!(outcome.interrupted);
}
