use crate::lits::{Lit, Var, VarValue};
use fixedbitset::FixedBitSet;

/// A partial assignment with its trail.
///
/// The trail records assigned literals in assignment order. Level marks
/// store the trail length at the time each decision was taken: entries at a
/// mark are decisions, entries after it within the same level are forced by
/// propagation. The number of marks is the current decision level.
#[derive(Clone)]
pub struct Assignment {
    values: Vec<VarValue>,
    trail: Vec<Lit>,
    level_marks: Vec<usize>,
}

impl Assignment {
    pub fn new(num_vars: u32) -> Assignment {
        Assignment {
            values: vec![VarValue::Unset; num_vars as usize],
            trail: Vec::with_capacity(num_vars as usize),
            level_marks: Vec::new(),
        }
    }

    pub fn num_vars(&self) -> u32 {
        self.values.len() as u32
    }

    pub fn value(&self, var: Var) -> VarValue {
        self.values[var.index()]
    }

    pub fn lit_value(&self, lit: Lit) -> VarValue {
        if lit.is_positive() {
            self.value(lit.var())
        } else {
            !self.value(lit.var())
        }
    }

    pub fn is_set(&self, var: Var) -> bool {
        self.value(var).is_set()
    }

    /// Makes the literal true and records it on the trail.
    pub fn set(&mut self, lit: Lit) {
        debug_assert!(!self.is_set(lit.var()));
        self.values[lit.var().index()] = VarValue::from_bool(lit.is_positive());
        self.trail.push(lit);
    }

    pub fn decision_level(&self) -> usize {
        self.level_marks.len()
    }

    /// Opens a new decision level. The next `set` is the decision literal.
    pub fn mark_decision(&mut self) {
        self.level_marks.push(self.trail.len());
    }

    /// Unwinds the trail until the decision level is `level`.
    pub fn backtrack_to(&mut self, level: usize) {
        debug_assert!(level <= self.decision_level());
        if level == self.decision_level() {
            return;
        }
        let mark = self.level_marks[level];
        for &lit in &self.trail[mark..] {
            self.values[lit.var().index()] = VarValue::Unset;
        }
        self.trail.truncate(mark);
        self.level_marks.truncate(level);
    }

    pub fn num_assigned(&self) -> usize {
        self.trail.len()
    }

    pub fn all_assigned(&self) -> bool {
        self.trail.len() == self.values.len()
    }

    pub fn trail(&self) -> &[Lit] {
        &self.trail
    }

    /// Smallest-index unset variable, the fixed branching rule.
    pub fn next_unset_var(&self) -> Option<Var> {
        self.values
            .iter()
            .position(|v| !v.is_set())
            .map(Var::from_index)
    }

    /// The assignment as one bit per variable (bit set = variable true).
    /// Only meaningful once all variables are assigned.
    pub fn to_bitset(&self) -> FixedBitSet {
        let mut bits = FixedBitSet::with_capacity(self.values.len());
        for (i, v) in self.values.iter().enumerate() {
            if *v == VarValue::True {
                bits.insert(i);
            }
        }
        bits
    }
}
