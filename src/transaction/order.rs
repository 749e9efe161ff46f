// src/transaction/order.rs

//! Dependency-respecting step order
//!
//! Edges only connect steps moving in the same direction:
//!
//! - incoming `A` requires something incoming `B` provides: `B` before `A`
//! - outgoing `A` requires something outgoing `B` provides: `A` before `B`
//!
//! The order is Kahn's algorithm over those edges. Among ready steps the one
//! with the smallest key wins, so the same transaction always orders the same
//! way. The key is, in priority order: outgoing before incoming (with
//! `removals_first`), unrequested before requested and then request order
//! (with `defer_requested`), repository (with `group_by_repo`), step id.

use super::Transaction;
use crate::error::{Error, ErrorCode, Result};
use crate::universe::{RepoId, SolvableId, Universe};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Named ordering variants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderFlags {
    /// Keep steps from the same repository together where dependencies allow
    pub group_by_repo: bool,
    /// Run requested packages last in their dependency chain, in request order
    pub defer_requested: bool,
    /// Run outgoing steps before incoming ones where dependencies allow
    pub removals_first: bool,
}

impl OrderFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group_by_repo(mut self, on: bool) -> Self {
        self.group_by_repo = on;
        self
    }

    pub fn with_defer_requested(mut self, on: bool) -> Self {
        self.defer_requested = on;
        self
    }

    pub fn with_removals_first(mut self, on: bool) -> Self {
        self.removals_first = on;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct OrderKey {
    incoming: bool,
    deferred: bool,
    request_index: usize,
    repo: Option<RepoId>,
    id: SolvableId,
}

/// Index of steps by the names they can satisfy
fn provider_index<'a>(
    universe: &'a Universe,
    steps: &[SolvableId],
) -> HashMap<&'a str, Vec<SolvableId>> {
    let mut index: HashMap<&str, Vec<SolvableId>> = HashMap::new();
    for &id in steps {
        let solvable = universe.solvable(id);
        index.entry(solvable.name.as_str()).or_default().push(id);
        for provided in &solvable.provides {
            index.entry(provided.as_str()).or_default().push(id);
        }
    }
    index
}

/// Predecessors of every step: the steps that must complete before it
pub(crate) fn dependency_predecessors(
    universe: &Universe,
    steps: &[SolvableId],
) -> BTreeMap<SolvableId, BTreeSet<SolvableId>> {
    let mut preds: BTreeMap<SolvableId, BTreeSet<SolvableId>> =
        steps.iter().map(|&id| (id, BTreeSet::new())).collect();

    let (incoming, outgoing): (Vec<SolvableId>, Vec<SolvableId>) = steps
        .iter()
        .copied()
        .partition(|&id| !universe.solvable(id).installed);

    for (group, reversed) in [(&incoming, false), (&outgoing, true)] {
        let providers = provider_index(universe, group);
        for &dependent in group.iter() {
            for dep in &universe.solvable(dependent).requires {
                let Some(candidates) = providers.get(dep.name.as_str()) else {
                    continue;
                };
                for &provider in candidates {
                    if provider == dependent || !dep.matches(universe.solvable(provider)) {
                        continue;
                    }
                    let (before, after) = if reversed {
                        (dependent, provider)
                    } else {
                        (provider, dependent)
                    };
                    if let Some(set) = preds.get_mut(&after) {
                        set.insert(before);
                    }
                }
            }
        }
    }

    preds
}

impl Transaction {
    /// Put the steps in a dependency-respecting, deterministic order
    ///
    /// On a dependency cycle nothing changes and an `internal_failure` error
    /// is returned with the blocked step ids (`Vec<SolvableId>`) as payload.
    pub fn order(&mut self, universe: &Universe, flags: OrderFlags) -> Result<()> {
        self.assert_universe(universe);

        let preds = dependency_predecessors(universe, &self.steps);
        let request_index: HashMap<SolvableId, usize> = self
            .requested
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i))
            .collect();

        let key_of = |id: SolvableId| {
            let solvable = universe.solvable(id);
            let requested = request_index.get(&id).copied();
            let deferred = flags.defer_requested && requested.is_some();
            OrderKey {
                incoming: flags.removals_first && !solvable.installed,
                deferred,
                request_index: if deferred { requested.unwrap_or(0) } else { 0 },
                repo: flags.group_by_repo.then_some(solvable.repo),
                id,
            }
        };

        let mut successors: BTreeMap<SolvableId, Vec<SolvableId>> = BTreeMap::new();
        let mut pending: BTreeMap<SolvableId, usize> = BTreeMap::new();
        let mut edges = 0;
        for (&step, before) in &preds {
            pending.insert(step, before.len());
            edges += before.len();
            for &b in before {
                successors.entry(b).or_default().push(step);
            }
        }

        let mut ready: BTreeSet<OrderKey> = pending
            .iter()
            .filter(|&(_, &n)| n == 0)
            .map(|(&id, _)| key_of(id))
            .collect();
        let mut sequence = Vec::with_capacity(self.steps.len());

        while let Some(key) = ready.pop_first() {
            sequence.push(key.id);
            for &next in successors.get(&key.id).into_iter().flatten() {
                if let Some(n) = pending.get_mut(&next) {
                    *n -= 1;
                    if *n == 0 {
                        ready.insert(key_of(next));
                    }
                }
            }
        }

        if sequence.len() != self.steps.len() {
            let blocked: Vec<SolvableId> = pending
                .iter()
                .filter(|&(_, &n)| n > 0)
                .map(|(&id, _)| id)
                .collect();
            let names: Vec<String> = blocked
                .iter()
                .map(|&id| universe.solvable(id).to_string())
                .collect();
            return Err(Error::with_payload(
                format!("Dependency cycle among steps: {}", names.join(", ")),
                ErrorCode::InternalFailure,
                blocked,
            ));
        }

        debug!(
            steps = sequence.len(),
            edges,
            ?flags,
            "Ordered transaction"
        );
        self.steps = sequence;
        self.ordered = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Decision;
    use crate::universe::PackageRecord;

    fn position(steps: &[SolvableId], id: SolvableId) -> usize {
        steps.iter().position(|&s| s == id).unwrap()
    }

    #[test]
    fn test_install_dependencies_first() {
        let mut universe = Universe::new();
        let repo = universe.add_repo("forge", "forge", 0);
        let app = universe
            .add_record(repo, &PackageRecord::new("app", "1.0").with_depends(["lib >=2"]))
            .unwrap();
        let lib = universe.add_record(repo, &PackageRecord::new("lib", "2.1")).unwrap();

        let mut tx = Transaction::from_solvables(&universe, [Decision::Install(app), Decision::Install(lib)]);
        tx.order(&universe, OrderFlags::default()).unwrap();

        assert_eq!(tx.steps(), &[lib, app]);
    }

    #[test]
    fn test_removal_dependents_first() {
        let mut universe = Universe::new();
        let installed = universe.add_repo("installed", "installed", 0);
        universe.set_installed_repo(installed);
        let lib = universe.add_record(installed, &PackageRecord::new("lib", "2.1")).unwrap();
        let app = universe
            .add_record(installed, &PackageRecord::new("app", "1.0").with_depends(["lib"]))
            .unwrap();

        let mut tx = Transaction::from_solvables(&universe, [Decision::Remove(lib), Decision::Remove(app)]);
        tx.order(&universe, OrderFlags::default()).unwrap();

        assert_eq!(tx.steps(), &[app, lib]);
    }

    #[test]
    fn test_unsatisfied_constraint_adds_no_edge() {
        let mut universe = Universe::new();
        let repo = universe.add_repo("forge", "forge", 0);
        let lib = universe.add_record(repo, &PackageRecord::new("lib", "1.0")).unwrap();
        let app = universe
            .add_record(repo, &PackageRecord::new("app", "1.0").with_depends(["lib >=2"]))
            .unwrap();

        let mut tx = Transaction::from_solvables(&universe, [Decision::Install(app), Decision::Install(lib)]);
        tx.order(&universe, OrderFlags::default()).unwrap();
        assert_eq!(tx.steps(), &[lib, app]);

        let preds = dependency_predecessors(&universe, tx.steps());
        assert!(preds[&app].is_empty());
    }

    #[test]
    fn test_provides_creates_edge() {
        let mut universe = Universe::new();
        let repo = universe.add_repo("forge", "forge", 0);
        let app = universe
            .add_record(repo, &PackageRecord::new("app", "1.0").with_depends(["libssl"]))
            .unwrap();
        let openssl = universe
            .add_record(repo, &PackageRecord::new("openssl", "3.0").with_provides(["libssl"]))
            .unwrap();

        let mut tx = Transaction::from_solvables(&universe, [Decision::Install(app), Decision::Install(openssl)]);
        tx.order(&universe, OrderFlags::default()).unwrap();
        assert_eq!(tx.steps(), &[openssl, app]);
    }

    #[test]
    fn test_ties_break_by_id_and_repeat_identically() {
        let mut universe = Universe::new();
        let repo = universe.add_repo("forge", "forge", 0);
        let ids: Vec<SolvableId> = ["e", "d", "c", "b", "a"]
            .iter()
            .map(|n| universe.add_record(repo, &PackageRecord::new(*n, "1.0")).unwrap())
            .collect();

        let mut tx = Transaction::from_solvables(&universe, ids.iter().rev().map(|&id| Decision::Install(id)));
        tx.order(&universe, OrderFlags::default()).unwrap();
        let first = tx.steps().to_vec();
        tx.order(&universe, OrderFlags::default()).unwrap();

        assert_eq!(first, ids);
        assert_eq!(tx.steps(), first.as_slice());
    }

    #[test]
    fn test_defer_requested_keeps_request_order() {
        let mut universe = Universe::new();
        let repo = universe.add_repo("forge", "forge", 0);
        let lib = universe.add_record(repo, &PackageRecord::new("lib", "1.0")).unwrap();
        let tool = universe.add_record(repo, &PackageRecord::new("tool", "1.0")).unwrap();
        let app = universe
            .add_record(repo, &PackageRecord::new("app", "1.0").with_depends(["lib"]))
            .unwrap();
        let helper = universe.add_record(repo, &PackageRecord::new("helper", "1.0")).unwrap();

        let mut tx = Transaction::from_solvables(
            &universe,
            [
                Decision::Install(tool),
                Decision::Install(app),
            ],
        );
        // lib and helper come in as dependencies, not requests
        let mut full = Transaction::from_solver(
            &universe,
            &crate::resolver::Solution::new(
                &universe,
                vec![
                    Decision::Install(tool),
                    Decision::Install(app),
                    Decision::Install(lib),
                    Decision::Install(helper),
                ],
                vec![tool, app],
            ),
        );

        full.order(&universe, OrderFlags::new().with_defer_requested(true)).unwrap();
        assert_eq!(full.steps(), &[lib, helper, tool, app]);

        tx.order(&universe, OrderFlags::new().with_defer_requested(true)).unwrap();
        assert_eq!(tx.steps(), &[tool, app]);
    }

    #[test]
    fn test_removals_first_and_group_by_repo() {
        let mut universe = Universe::new();
        let installed = universe.add_repo("installed", "installed", 0);
        universe.set_installed_repo(installed);
        let beta = universe.add_repo("beta", "beta", 0);
        let alpha = universe.add_repo("alpha", "alpha", 0);

        let x = universe.add_record(beta, &PackageRecord::new("x", "1.0")).unwrap();
        let y = universe.add_record(alpha, &PackageRecord::new("y", "1.0")).unwrap();
        let z = universe.add_record(beta, &PackageRecord::new("z", "1.0")).unwrap();
        let gone = universe.add_record(installed, &PackageRecord::new("gone", "1.0")).unwrap();

        let decisions = [
            Decision::Install(x),
            Decision::Install(y),
            Decision::Install(z),
            Decision::Remove(gone),
        ];

        let mut plain = Transaction::from_solvables(&universe, decisions);
        plain.order(&universe, OrderFlags::default()).unwrap();
        assert_eq!(plain.steps(), &[x, y, z, gone]);

        let mut flagged = Transaction::from_solvables(&universe, decisions);
        flagged
            .order(
                &universe,
                OrderFlags::new().with_removals_first(true).with_group_by_repo(true),
            )
            .unwrap();
        assert_eq!(flagged.steps(), &[gone, x, z, y]);
    }

    #[test]
    fn test_cycle_is_internal_failure() {
        let mut universe = Universe::new();
        let repo = universe.add_repo("forge", "forge", 0);
        let a = universe
            .add_record(repo, &PackageRecord::new("a", "1.0").with_depends(["b"]))
            .unwrap();
        let b = universe
            .add_record(repo, &PackageRecord::new("b", "1.0").with_depends(["a"]))
            .unwrap();
        let free = universe.add_record(repo, &PackageRecord::new("free", "1.0")).unwrap();

        let mut tx = Transaction::from_solvables(
            &universe,
            [Decision::Install(free), Decision::Install(b), Decision::Install(a)],
        );
        let before = tx.steps().to_vec();
        let err = tx.order(&universe, OrderFlags::default()).unwrap_err();

        assert_eq!(err.code(), ErrorCode::InternalFailure);
        assert_eq!(err.payload::<Vec<SolvableId>>(), Some(&vec![a, b]));
        assert_eq!(tx.steps(), before.as_slice());
        assert!(!tx.is_ordered());
    }

    #[test]
    fn test_install_and_removal_chains_together() {
        let mut universe = Universe::new();
        let installed = universe.add_repo("installed", "installed", 0);
        universe.set_installed_repo(installed);
        let forge = universe.add_repo("forge", "forge", 0);

        let old_lib = universe.add_record(installed, &PackageRecord::new("lib", "1.0")).unwrap();
        let old_app = universe
            .add_record(installed, &PackageRecord::new("app", "1.0").with_depends(["lib"]))
            .unwrap();
        let app = universe
            .add_record(forge, &PackageRecord::new("app", "2.0").with_depends(["lib >=2"]))
            .unwrap();
        let lib = universe.add_record(forge, &PackageRecord::new("lib", "2.0")).unwrap();

        let mut tx = Transaction::from_solvables(
            &universe,
            [
                Decision::Install(app),
                Decision::Install(lib),
                Decision::Remove(old_app),
                Decision::Remove(old_lib),
            ],
        );
        tx.order(&universe, OrderFlags::default()).unwrap();
        let steps = tx.steps();

        assert!(position(steps, lib) < position(steps, app));
        assert!(position(steps, old_app) < position(steps, old_lib));
    }
}
