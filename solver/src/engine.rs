use crate::assignment::Assignment;
use crate::cnf::{ClauseRef, Formula};
use crate::lits::{Lit, Var, VarValue};
use crate::sink::Solution;
use crate::stats::SearchStats;
use std::collections::VecDeque;
use std::sync::Arc;

/// Status of propagation to fixpoint. Propagation never fails: exceeding the
/// falsified-clause budget is an ordinary status, not an error.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Propagation {
    Ok,
    BoundExceeded,
}

enum WatchAction {
    /// The clause stays watched as it is.
    Keep,
    /// Move the watch in `slot` to the literal at `new_pos`.
    Move { slot: usize, new_pos: u32, watch: Lit },
    /// The clause is unit on this literal.
    Unit(Lit),
    /// Every literal of the clause is false.
    Falsified,
}

/// Per-worker search state: assignment, two-watched-literal index and
/// falsified-clause accounting over a shared immutable formula.
///
/// Unlike a plain SAT engine, a clause with every literal false is not a
/// dead end here: it is counted, and the search only stops once the count
/// exceeds `max_unsat`. A unit clause forces its remaining literal only when
/// the budget is exhausted; with slack left, leaving the clause unsatisfied
/// is still a legal completion and the branch must stay reachable.
pub struct Searcher {
    formula: Arc<Formula>,
    max_unsat: u32,
    assignment: Assignment,
    /// Decision literals of the current node, in order. This is the replay
    /// recipe from which branch work items are derived.
    path: Vec<Lit>,
    /// For each literal `p` (by dense index), the clauses to revisit when
    /// `p` becomes true: those currently watching `!p`.
    watches: Vec<Vec<ClauseRef>>,
    /// Positions of the two watched literals within each clause.
    watched: Vec<[u32; 2]>,
    falsified: Vec<bool>,
    falsified_log: Vec<ClauseRef>,
    /// One mark per decision level: length of `falsified_log` at the time
    /// the level was opened.
    falsified_marks: Vec<usize>,
    num_unsat: u32,
    queue: VecDeque<Lit>,
    /// Reused buffer for the watch list being walked, so that clauses can
    /// re-register themselves while we iterate.
    work_buffer: Vec<ClauseRef>,
    pub stats: SearchStats,
}

impl Searcher {
    pub fn new(formula: Arc<Formula>, max_unsat: u32) -> Searcher {
        let num_lits = formula.num_vars() as usize * 2;
        let num_clauses = formula.num_clauses();
        let mut s = Searcher {
            assignment: Assignment::new(formula.num_vars()),
            max_unsat,
            path: Vec::new(),
            watches: vec![Vec::new(); num_lits],
            watched: vec![[0, 0]; num_clauses],
            falsified: vec![false; num_clauses],
            falsified_log: Vec::new(),
            falsified_marks: Vec::new(),
            num_unsat: 0,
            queue: VecDeque::new(),
            work_buffer: Vec::new(),
            stats: SearchStats::default(),
            formula,
        };
        s.init_watches();
        s
    }

    /// Sets up the watch index and performs the eager root work: empty
    /// clauses are counted immediately, and with no slack left, input unit
    /// clauses are enqueued for the first propagation.
    fn init_watches(&mut self) {
        let formula = self.formula.clone();
        for cl in formula.clauses() {
            let lits = formula.clause(cl);
            match lits.len() {
                0 => self.mark_falsified(cl),
                1 => {
                    self.watched[cl.index()] = [0, 0];
                    self.watches[(!lits[0]).index()].push(cl);
                }
                _ => {
                    self.watched[cl.index()] = [0, 1];
                    self.watches[(!lits[0]).index()].push(cl);
                    self.watches[(!lits[1]).index()].push(cl);
                }
            }
        }
        if self.num_unsat >= self.max_unsat {
            // no slack: unit input clauses are forced
            for cl in formula.clauses() {
                let lits = formula.clause(cl);
                if lits.len() == 1 && !self.enqueue(lits[0]) {
                    self.mark_falsified(cl);
                }
            }
        }
    }

    pub fn max_unsat(&self) -> u32 {
        self.max_unsat
    }

    pub fn num_unsat(&self) -> u32 {
        self.num_unsat
    }

    fn slack(&self) -> u32 {
        self.max_unsat.saturating_sub(self.num_unsat)
    }

    pub fn all_assigned(&self) -> bool {
        self.assignment.all_assigned()
    }

    /// Smallest-index unset variable (the fixed branching rule).
    pub fn next_unset_var(&self) -> Option<Var> {
        self.assignment.next_unset_var()
    }

    /// Decision literals of the current node.
    pub fn path(&self) -> &[Lit] {
        &self.path
    }

    fn mark_falsified(&mut self, cl: ClauseRef) {
        if !self.falsified[cl.index()] {
            self.falsified[cl.index()] = true;
            self.falsified_log.push(cl);
            self.num_unsat += 1;
            self.stats.falsified += 1;
        }
    }

    /// Makes the literal true and schedules it for propagation.
    /// Returns false if its complement already holds.
    fn enqueue(&mut self, lit: Lit) -> bool {
        match self.assignment.lit_value(lit) {
            VarValue::True => true,
            VarValue::False => false,
            VarValue::Unset => {
                self.assignment.set(lit);
                self.queue.push_back(lit);
                true
            }
        }
    }

    fn push_level(&mut self, decision: Lit) {
        self.assignment.mark_decision();
        self.falsified_marks.push(self.falsified_log.len());
        self.path.push(decision);
    }

    /// Opens a new decision level on an unset variable.
    pub fn decide(&mut self, decision: Lit) {
        debug_assert!(!self.assignment.is_set(decision.var()));
        self.push_level(decision);
        self.assignment.set(decision);
        self.queue.push_back(decision);
        self.stats.decisions += 1;
    }

    /// Unwinds to the given decision level, restoring the falsified count.
    /// Watch positions are backtrack-stable and are left untouched.
    pub fn backtrack_to(&mut self, level: usize) {
        debug_assert!(level <= self.path.len());
        if level == self.path.len() {
            return;
        }
        self.assignment.backtrack_to(level);
        let mark = self.falsified_marks[level];
        for cl in self.falsified_log.drain(mark..) {
            self.falsified[cl.index()] = false;
            self.num_unsat -= 1;
        }
        self.falsified_marks.truncate(level);
        self.path.truncate(level);
        self.queue.clear();
    }

    /// Repositions the searcher on the node described by a decision
    /// sequence: rewinds to the longest common prefix with the current path
    /// and replays the remaining decisions, propagating after each.
    ///
    /// Returns `BoundExceeded` when the node (hence its whole subtree) is
    /// over budget, including the case of a decision whose variable was
    /// already forced to the opposite polarity.
    pub fn establish(&mut self, decisions: &[Lit]) -> Propagation {
        let common = self
            .path
            .iter()
            .zip(decisions)
            .take_while(|(a, b)| a == b)
            .count();
        self.backtrack_to(common);
        if self.propagate() == Propagation::BoundExceeded {
            return Propagation::BoundExceeded;
        }
        for &d in &decisions[common..] {
            match self.assignment.lit_value(d) {
                VarValue::False => return Propagation::BoundExceeded,
                VarValue::True => self.push_level(d),
                VarValue::Unset => {
                    self.decide(d);
                    if self.propagate() == Propagation::BoundExceeded {
                        return Propagation::BoundExceeded;
                    }
                }
            }
        }
        Propagation::Ok
    }

    /// Boolean constraint propagation to fixpoint, breadth first. The order
    /// of forced assignments within a burst follows the watch-list order.
    pub fn propagate(&mut self) -> Propagation {
        if self.num_unsat > self.max_unsat {
            self.queue.clear();
            self.stats.bound_hits += 1;
            return Propagation::BoundExceeded;
        }
        while let Some(p) = self.queue.pop_front() {
            self.work_buffer.clear();
            std::mem::swap(&mut self.work_buffer, &mut self.watches[p.index()]);
            let n = self.work_buffer.len();
            for i in 0..n {
                let cl = self.work_buffer[i];
                self.stats.propagations += 1;
                self.propagate_clause(cl, p);
                if self.num_unsat > self.max_unsat {
                    // restore the watches we did not get to
                    for j in i + 1..n {
                        let rest = self.work_buffer[j];
                        self.watches[p.index()].push(rest);
                    }
                    self.queue.clear();
                    self.stats.bound_hits += 1;
                    return Propagation::BoundExceeded;
                }
            }
        }
        Propagation::Ok
    }

    /// Revisits one clause after `p` became true (the clause watches `!p`).
    fn propagate_clause(&mut self, cl: ClauseRef, p: Lit) {
        let action = self.examine_clause(cl, p);
        match action {
            WatchAction::Keep => self.watches[p.index()].push(cl),
            WatchAction::Move {
                slot,
                new_pos,
                watch,
            } => {
                self.watched[cl.index()][slot] = new_pos;
                self.watches[(!watch).index()].push(cl);
            }
            WatchAction::Unit(forced) => {
                self.watches[p.index()].push(cl);
                if self.slack() == 0 {
                    let ok = self.enqueue(forced);
                    debug_assert!(ok, "unit literal was unset when examined");
                }
            }
            WatchAction::Falsified => {
                self.watches[p.index()].push(cl);
                self.mark_falsified(cl);
            }
        }
    }

    fn examine_clause(&self, cl: ClauseRef, p: Lit) -> WatchAction {
        let lits = self.formula.clause(cl);
        let [w0, w1] = self.watched[cl.index()];
        let false_lit = !p;
        let slot = if lits[w0 as usize] == false_lit { 0 } else { 1 };
        debug_assert_eq!(lits[self.watched[cl.index()][slot] as usize], false_lit);
        let other = lits[self.watched[cl.index()][1 - slot] as usize];

        if other != false_lit && self.assignment.lit_value(other) == VarValue::True {
            return WatchAction::Keep;
        }
        for (i, &l) in lits.iter().enumerate() {
            if i as u32 == w0 || i as u32 == w1 {
                continue;
            }
            if self.assignment.lit_value(l) != VarValue::False {
                return WatchAction::Move {
                    slot,
                    new_pos: i as u32,
                    watch: l,
                };
            }
        }
        if other != false_lit && self.assignment.lit_value(other) == VarValue::Unset {
            WatchAction::Unit(other)
        } else {
            WatchAction::Falsified
        }
    }

    /// Captures the current complete assignment as a solution.
    pub fn snapshot(&self) -> Solution {
        debug_assert!(self.all_assigned());
        let values = self.assignment.to_bitset();
        debug_assert_eq!(
            self.num_unsat,
            self.formula.unsat_count(&values),
            "falsified accounting diverged from the formula"
        );
        Solution::new(values, self.num_unsat)
    }

    #[cfg(test)]
    fn lit_value(&self, lit: Lit) -> VarValue {
        self.assignment.lit_value(lit)
    }

    /// Checks the watched-literal invariant: every clause is satisfied, has
    /// two non-false watches, is unit, or is counted as falsified.
    #[cfg(test)]
    fn check_invariants(&self) {
        for cl in self.formula.clauses() {
            let lits = self.formula.clause(cl);
            let satisfied = lits
                .iter()
                .any(|&l| self.assignment.lit_value(l) == VarValue::True);
            let unassigned = lits
                .iter()
                .filter(|&&l| self.assignment.lit_value(l) == VarValue::Unset)
                .count();
            let all_false = !satisfied && unassigned == 0;
            assert_eq!(
                all_false,
                self.falsified[cl.index()],
                "clause {cl} accounting is wrong"
            );
        }
        assert_eq!(
            self.num_unsat as usize,
            self.falsified.iter().filter(|&&f| f).count()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formula(num_vars: u32, clauses: &[&[i32]]) -> Arc<Formula> {
        Arc::new(Formula::new(
            num_vars,
            clauses
                .iter()
                .map(|c| c.iter().map(|&i| Lit::from_dimacs(i).unwrap()).collect()),
        ))
    }

    fn lit(i: i32) -> Lit {
        Lit::from_dimacs(i).unwrap()
    }

    #[test]
    fn test_propagation_chain() {
        let f = formula(3, &[&[-1, 2], &[-2, 3]]);
        let mut s = Searcher::new(f, 0);
        assert_eq!(s.propagate(), Propagation::Ok);
        s.decide(lit(1));
        assert_eq!(s.propagate(), Propagation::Ok);
        assert_eq!(s.lit_value(lit(2)), VarValue::True);
        assert_eq!(s.lit_value(lit(3)), VarValue::True);
        assert!(s.all_assigned());
        s.check_invariants();
    }

    #[test]
    fn test_root_units_conflict() {
        let f = formula(1, &[&[1], &[-1]]);
        let mut s = Searcher::new(f, 0);
        assert_eq!(s.propagate(), Propagation::BoundExceeded);
    }

    #[test]
    fn test_unit_not_forced_with_slack() {
        let f = formula(1, &[&[1]]);
        let mut s = Searcher::new(f, 1);
        assert_eq!(s.propagate(), Propagation::Ok);
        // with slack, the unit clause does not force its literal
        assert_eq!(s.next_unset_var(), Some(Var::from_index(0)));
        // violating it is a legal use of the budget
        s.decide(lit(-1));
        assert_eq!(s.propagate(), Propagation::Ok);
        assert_eq!(s.num_unsat(), 1);
        s.check_invariants();
    }

    #[test]
    fn test_falsified_counted_once_and_restored() {
        let f = formula(2, &[&[1, 2]]);
        let mut s = Searcher::new(f, 1);
        s.decide(lit(-1));
        assert_eq!(s.propagate(), Propagation::Ok);
        s.decide(lit(-2));
        assert_eq!(s.propagate(), Propagation::Ok);
        assert_eq!(s.num_unsat(), 1);
        s.check_invariants();
        s.backtrack_to(1);
        assert_eq!(s.num_unsat(), 0);
        s.check_invariants();
    }

    #[test]
    fn test_empty_clause_consumes_budget() {
        let f = formula(1, &[&[]]);
        let over = Searcher::new(f.clone(), 0);
        assert_eq!(over.num_unsat(), 1);
        let mut within = Searcher::new(f, 1);
        assert_eq!(within.propagate(), Propagation::Ok);
        assert_eq!(within.num_unsat(), 1);
    }

    #[test]
    fn test_establish_replays_decisions() {
        let f = formula(3, &[&[-1, 2]]);
        let mut s = Searcher::new(f, 0);
        assert_eq!(s.establish(&[lit(1), lit(3)]), Propagation::Ok);
        assert_eq!(s.lit_value(lit(2)), VarValue::True);
        assert_eq!(s.path(), &[lit(1), lit(3)]);
        assert!(s.all_assigned());
        // switching to a sibling rewinds only past the divergence point
        assert_eq!(s.establish(&[lit(1), lit(-3)]), Propagation::Ok);
        assert_eq!(s.lit_value(lit(2)), VarValue::True);
        assert_eq!(s.lit_value(lit(3)), VarValue::False);
        s.check_invariants();
    }

    #[test]
    fn test_establish_prunes_contradicted_decision() {
        // with no slack, deciding 1 forces 2; the sibling branch deciding -2
        // afterwards is over budget by construction
        let f = formula(2, &[&[-1, 2]]);
        let mut s = Searcher::new(f, 0);
        assert_eq!(s.establish(&[lit(1)]), Propagation::Ok);
        assert_eq!(s.establish(&[lit(1), lit(-2)]), Propagation::BoundExceeded);
    }

    #[test]
    fn test_snapshot_counts_match() {
        let f = formula(2, &[&[1, 2], &[-1, -2]]);
        let mut s = Searcher::new(f, 2);
        assert_eq!(s.establish(&[lit(1), lit(2)]), Propagation::Ok);
        let sol = s.snapshot();
        assert_eq!(sol.num_unsat(), 1);
    }
}
