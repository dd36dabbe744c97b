use crate::lits::Lit;
use smallvec::SmallVec;

/// A suspended search frontier: the decision-literal sequence leading to a
/// node whose subtree has not been explored yet. Together with the shared
/// formula and the unsat budget, it uniquely determines that subtree, so a
/// branch can be resumed by any worker, in any process, by replay.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BranchItem {
    decisions: SmallVec<[Lit; 16]>,
}

impl BranchItem {
    /// The whole search tree.
    pub fn root() -> BranchItem {
        BranchItem {
            decisions: SmallVec::new(),
        }
    }

    /// The sibling branch taken when backtracking over `decision` at the end
    /// of `prefix`.
    pub fn child(prefix: &[Lit], decision: Lit) -> BranchItem {
        let mut decisions: SmallVec<[Lit; 16]> = SmallVec::from_slice(prefix);
        decisions.push(decision);
        BranchItem { decisions }
    }

    pub fn decisions(&self) -> &[Lit] {
        &self.decisions
    }

    /// Depth of the frontier node; shallow items dominate subtree volume.
    pub fn depth(&self) -> usize {
        self.decisions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_extends_prefix() {
        let l1 = Lit::from_dimacs(1).unwrap();
        let l2 = Lit::from_dimacs(-2).unwrap();
        let root = BranchItem::root();
        assert_eq!(root.depth(), 0);
        let child = BranchItem::child(root.decisions(), l1);
        let grandchild = BranchItem::child(child.decisions(), l2);
        assert_eq!(grandchild.decisions(), &[l1, l2]);
        assert_eq!(grandchild.depth(), 2);
    }
}
