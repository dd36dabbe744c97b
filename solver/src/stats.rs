use std::fmt::{Display, Error, Formatter};

/// Counters accumulated by the DPLL search, per worker and summed at the
/// end of a solve.
#[derive(Debug, Default, Clone)]
pub struct SearchStats {
    pub decisions: u64,
    pub propagations: u64,
    /// Clauses detected with every literal false.
    pub falsified: u64,
    /// Nodes abandoned because the falsified count exceeded the budget.
    pub bound_hits: u64,
    pub solutions: u64,
    /// Branches shipped to a peer rank.
    pub sheds: u64,
    /// Branches taken from another worker's deque or received from a peer
    /// rank.
    pub steals: u64,
}

impl SearchStats {
    pub fn merge(&mut self, other: &SearchStats) {
        self.decisions += other.decisions;
        self.propagations += other.propagations;
        self.falsified += other.falsified;
        self.bound_hits += other.bound_hits;
        self.solutions += other.solutions;
        self.sheds += other.sheds;
        self.steals += other.steals;
    }
}

impl Display for SearchStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        writeln!(f, "decisions             : {:<12}", self.decisions)?;
        writeln!(f, "propagations          : {:<12}", self.propagations)?;
        writeln!(f, "falsified clauses     : {:<12}", self.falsified)?;
        writeln!(f, "bound hits            : {:<12}", self.bound_hits)?;
        writeln!(f, "solutions             : {:<12}", self.solutions)?;
        writeln!(f, "branches shed         : {:<12}", self.sheds)?;
        write!(f, "branches stolen       : {:<12}", self.steals)
    }
}

/// Counters accumulated by the Walk-SAT kernel.
#[derive(Debug, Default, Clone)]
pub struct WalkStats {
    pub steps: u64,
    pub flips: u64,
    pub restarts: u64,
    pub solutions: u64,
}

impl Display for WalkStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        writeln!(f, "steps                 : {:<12}", self.steps)?;
        writeln!(f, "flips                 : {:<12}", self.flips)?;
        writeln!(f, "restarts              : {:<12}", self.restarts)?;
        write!(f, "solutions             : {:<12}", self.solutions)
    }
}
