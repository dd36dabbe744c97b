use anyhow::{ensure, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use structopt::StructOpt;
use sweepsat::cnf::dimacs;
use sweepsat::{StopToken, WalkSat, WalkSatParams};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "walk-sat",
    about = "Randomised local search for assignments meeting an unsat target"
)]
struct Opt {
    /// DIMACS CNF input file.
    file: PathBuf,
    /// Flips before the assignment is re-randomised.
    max_steps: u64,
    /// Probability of a random walk move.
    #[structopt(default_value = "0.5")]
    p: f64,
    /// Number of clauses a solution may leave unsatisfied.
    #[structopt(default_value = "0")]
    unsat: u32,
    /// RNG seed; 0 seeds from OS entropy.
    #[structopt(default_value = "0")]
    seed: u64,
    /// Wall-clock budget in seconds; 0 stops at the first solution.
    #[structopt(default_value = "0")]
    cutoff_time: f64,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    ensure!(
        (0.0..=1.0).contains(&opt.p),
        "walk probability must be within [0, 1], got {}",
        opt.p
    );
    ensure!(
        opt.cutoff_time >= 0.0,
        "cutoff_time must be non-negative, got {}",
        opt.cutoff_time
    );

    let input = std::fs::read_to_string(&opt.file)
        .with_context(|| format!("cannot read {}", opt.file.display()))?;
    let formula = Arc::new(dimacs::parse(&input).context("malformed DIMACS input")?);

    let params = WalkSatParams {
        max_steps: opt.max_steps,
        noise: opt.p,
        target_unsat: opt.unsat,
        seed: opt.seed,
        cutoff: Duration::from_secs_f64(opt.cutoff_time),
    };
    let mut walk = WalkSat::new(formula, params);
    let outcome = walk.run(&StopToken::new());

    if outcome.solutions.is_empty() {
        println!("no solution within cutoff");
    } else {
        for sol in outcome.solutions.iter() {
            println!("{} {}", sol.num_unsat(), sol);
        }
    }
    Ok(())
}
