use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use structopt::StructOpt;
use sweepsat::cnf::dimacs;
use sweepsat::{DpllParams, StopToken};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "dpll-sat",
    about = "Enumerates every assignment leaving at most max_unsat clauses unsatisfied"
)]
struct Opt {
    /// DIMACS CNF input file.
    file: PathBuf,
    /// Number of clauses an emitted assignment may leave unsatisfied.
    #[structopt(default_value = "0")]
    max_unsat: u32,
    /// Worker threads; 0 lets the solver choose.
    #[structopt(default_value = "0")]
    n_threads: usize,
    /// Verbosity: 0 solutions only, 1 adds statistics, 2 adds debug logging.
    #[structopt(default_value = "0")]
    verbose: u8,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    init_logging(opt.verbose);

    let input = std::fs::read_to_string(&opt.file)
        .with_context(|| format!("cannot read {}", opt.file.display()))?;
    let formula = Arc::new(dimacs::parse(&input).context("malformed DIMACS input")?);

    let params = DpllParams {
        max_unsat: opt.max_unsat,
        num_workers: opt.n_threads,
        ..DpllParams::default()
    };
    let report = sweepsat::dpll::solve(&formula, &params, &StopToken::new());

    for sol in report.solutions.iter() {
        println!("{} {}", sol.num_unsat(), sol);
    }
    if opt.verbose >= 1 {
        eprintln!("solutions             : {:<12}", report.solutions.num_distinct());
        eprintln!("{}", report.stats);
        eprintln!("CPU time              : {:.3} s", report.elapsed.as_secs_f64());
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::filter::LevelFilter;
    let level = match verbose {
        0 | 1 => LevelFilter::WARN,
        _ => LevelFilter::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}
