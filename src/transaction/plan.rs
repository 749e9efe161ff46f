// src/transaction/plan.rs

//! Executor-facing view of a transaction

use super::order::dependency_predecessors;
use super::{StepType, Transaction, TransactionMode};
use crate::universe::{SolvableId, Universe};
use serde::Serialize;

/// Everything an executor needs to carry out one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub id: SolvableId,
    pub step_type: StepType,
    /// Replacement of an outgoing step
    pub newer: Option<SolvableId>,
    /// Packages an incoming step replaces
    pub olders: Vec<SolvableId>,
    /// Steps that must finish before this one starts
    pub after: Vec<SolvableId>,
}

impl Transaction {
    /// Describe every step in the current sequence
    ///
    /// Call [`order`](Self::order) first; `after` holds regardless, so
    /// executors may run steps in parallel once their predecessors are done.
    pub fn plan(&self, universe: &Universe, mode: TransactionMode) -> Vec<PlannedStep> {
        self.assert_universe(universe);
        if !self.ordered {
            tracing::warn!("Planning an unordered transaction");
        }

        let mut preds = dependency_predecessors(universe, &self.steps);
        self.steps
            .iter()
            .map(|&id| PlannedStep {
                id,
                step_type: self.step_type(universe, id, mode),
                newer: self.step_newer(universe, id),
                olders: self.step_olders(universe, id),
                after: preds
                    .remove(&id)
                    .map(|set| set.into_iter().collect())
                    .unwrap_or_default(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Decision;
    use crate::transaction::OrderFlags;
    use crate::universe::PackageRecord;

    #[test]
    fn test_plan_carries_linkage_and_predecessors() {
        let mut universe = Universe::new();
        let installed = universe.add_repo("installed", "installed", 0);
        universe.set_installed_repo(installed);
        let forge = universe.add_repo("forge", "forge", 1);

        let old_lib = universe.add_record(installed, &PackageRecord::new("lib", "1.0")).unwrap();
        let lib = universe.add_record(forge, &PackageRecord::new("lib", "2.0")).unwrap();
        let app = universe
            .add_record(forge, &PackageRecord::new("app", "1.0").with_depends(["lib >=2"]))
            .unwrap();

        let mut tx = Transaction::from_solvables(
            &universe,
            [Decision::Install(app), Decision::Install(lib), Decision::Remove(old_lib)],
        );
        tx.order(&universe, OrderFlags::default()).unwrap();
        let plan = tx.plan(&universe, TransactionMode::default());

        assert_eq!(plan.len(), 3);
        assert_eq!(plan.iter().map(|p| p.id).collect::<Vec<_>>(), tx.steps());

        let app_step = plan.iter().find(|p| p.id == app).unwrap();
        assert_eq!(app_step.step_type, StepType::Install);
        assert_eq!(app_step.after, vec![lib]);

        let lib_step = plan.iter().find(|p| p.id == lib).unwrap();
        assert_eq!(lib_step.step_type, StepType::Upgrade);
        assert_eq!(lib_step.olders, vec![old_lib]);

        let old_step = plan.iter().find(|p| p.id == old_lib).unwrap();
        assert_eq!(old_step.step_type, StepType::Ignore);
        assert_eq!(old_step.newer, Some(lib));
        assert!(old_step.after.is_empty());
    }

    #[test]
    fn test_plan_serializes() {
        let mut universe = Universe::new();
        let repo = universe.add_repo("forge", "forge", 0);
        let a = universe.add_record(repo, &PackageRecord::new("a", "1.0")).unwrap();
        let mut tx = Transaction::from_solvables(&universe, [Decision::Install(a)]);
        tx.order(&universe, OrderFlags::default()).unwrap();

        let json = serde_json::to_value(tx.plan(&universe, TransactionMode::default())).unwrap();
        assert_eq!(json[0]["step_type"], "install");
        assert_eq!(json[0]["id"], a.index() as u64);
        assert!(json[0]["newer"].is_null());
    }
}
