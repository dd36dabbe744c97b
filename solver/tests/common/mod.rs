use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fmt::Write as _;

/// Generates a random 3-SAT instance in DIMACS text with a planted
/// satisfying assignment, so that satisfiability is guaranteed and a fixed
/// seed keeps CI deterministic.
#[allow(dead_code)]
pub fn planted_3sat(num_vars: usize, num_clauses: usize, seed: u64) -> String {
    assert!(num_vars >= 3);
    let mut rng = SmallRng::seed_from_u64(seed);
    let hidden: Vec<bool> = (0..num_vars).map(|_| rng.gen()).collect();

    let mut out = String::new();
    writeln!(out, "p cnf {} {}", num_vars, num_clauses).unwrap();
    for _ in 0..num_clauses {
        let mut vars = [0usize; 3];
        vars[0] = rng.gen_range(0..num_vars);
        loop {
            vars[1] = rng.gen_range(0..num_vars);
            if vars[1] != vars[0] {
                break;
            }
        }
        loop {
            vars[2] = rng.gen_range(0..num_vars);
            if vars[2] != vars[0] && vars[2] != vars[1] {
                break;
            }
        }
        let mut polarities = [rng.gen::<bool>(), rng.gen(), rng.gen()];
        if !vars
            .iter()
            .zip(polarities)
            .any(|(&v, p)| hidden[v] == p)
        {
            // keep the clause satisfied under the planted assignment
            let fix = rng.gen_range(0..3);
            polarities[fix] = hidden[vars[fix]];
        }
        for (&v, p) in vars.iter().zip(polarities) {
            let lit = (v + 1) as i64;
            write!(out, "{} ", if p { lit } else { -lit }).unwrap();
        }
        out.push_str("0\n");
    }
    out
}
