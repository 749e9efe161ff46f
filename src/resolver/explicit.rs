// src/resolver/explicit.rs

//! Candidate selection without dependency completion

use super::{Conflict, Decision, Job, Request, Solution, Solver};
use crate::universe::{SolvableId, Universe};
use std::collections::BTreeMap;
use tracing::debug;

/// Solver that installs the best candidate for each install job and removes
/// what remove jobs name
///
/// A chosen package replaces installed packages of the same name (unless
/// several versions may coexist) and installed packages it obsoletes.
#[derive(Debug, Clone, Default)]
pub struct ExplicitSolver {
    multi_version: bool,
}

impl ExplicitSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_multi_version(mut self, on: bool) -> Self {
        self.multi_version = on;
        self
    }
}

impl Solver for ExplicitSolver {
    fn solve(
        &mut self,
        universe: &Universe,
        request: &Request,
    ) -> Result<Solution, Vec<Conflict>> {
        let mut conflicts = Vec::new();
        let mut decisions = Vec::new();
        let mut requested = Vec::new();
        // name -> (chosen id, constraints that led there)
        let mut chosen: BTreeMap<String, (SolvableId, Vec<(String, String)>)> = BTreeMap::new();

        for job in request.jobs() {
            match job {
                Job::Install(dep) => {
                    let Some(id) = universe.best_candidate(dep) else {
                        let available: Vec<String> = universe
                            .by_name(&dep.name)
                            .iter()
                            .filter(|&&id| !universe.solvable(id).installed)
                            .map(|&id| universe.solvable(id).version.to_string())
                            .collect();
                        conflicts.push(if available.is_empty() {
                            Conflict::MissingPackage {
                                package: dep.name.clone(),
                                required_by: vec!["request".to_string()],
                            }
                        } else {
                            Conflict::NoMatchingVersion {
                                package: dep.name.clone(),
                                constraint: dep.constraint.to_string(),
                                available,
                            }
                        });
                        continue;
                    };

                    let entry = chosen
                        .entry(dep.name.clone())
                        .or_insert_with(|| (id, Vec::new()));
                    entry.1.push(("request".to_string(), dep.constraint.to_string()));
                    if entry.0 != id && !self.multi_version {
                        conflicts.push(Conflict::ConflictingConstraints {
                            package: dep.name.clone(),
                            constraints: entry.1.clone(),
                        });
                        continue;
                    }
                    if requested.contains(&id) {
                        continue;
                    }

                    let solvable = universe.solvable(id);
                    debug!("Selected {} for {}", solvable, dep);
                    decisions.push(Decision::Install(id));
                    requested.push(id);

                    for (installed_id, installed) in universe.solvables().filter(|(_, s)| s.installed) {
                        let same_name = installed.name == solvable.name && !self.multi_version;
                        if same_name || solvable.obsoletes_name(&installed.name) {
                            decisions.push(Decision::Remove(installed_id));
                        }
                    }
                }
                Job::Remove(name) => {
                    let installed = universe.installed_by_name(name);
                    if installed.is_empty() {
                        conflicts.push(Conflict::NotInstalled {
                            package: name.clone(),
                        });
                        continue;
                    }
                    decisions.extend(installed.into_iter().map(Decision::Remove));
                }
            }
        }

        if !conflicts.is_empty() {
            return Err(conflicts);
        }

        Ok(Solution::new(universe, decisions, requested))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::PackageRecord;

    struct Fixture {
        universe: Universe,
        python_installed: SolvableId,
        vim: SolvableId,
        python_312: SolvableId,
        neovim: SolvableId,
    }

    fn fixture() -> Fixture {
        let mut universe = Universe::new();
        let installed = universe.add_repo("installed", "installed", 0);
        universe.set_installed_repo(installed);
        let forge = universe.add_repo("forge/noarch", "forge", 1);

        let python_installed = universe
            .add_record(installed, &PackageRecord::new("python", "3.11.9"))
            .unwrap();
        let vim = universe.add_record(installed, &PackageRecord::new("vim", "9.1")).unwrap();
        universe.add_record(forge, &PackageRecord::new("python", "3.11.9")).unwrap();
        let python_312 = universe.add_record(forge, &PackageRecord::new("python", "3.12.4")).unwrap();
        let neovim = universe
            .add_record(forge, &PackageRecord::new("neovim", "0.10").with_obsoletes(["vim"]))
            .unwrap();

        Fixture {
            universe,
            python_installed,
            vim,
            python_312,
            neovim,
        }
    }

    #[test]
    fn test_install_replaces_same_name() {
        let f = fixture();
        let request = Request::new().install("python 3.12.*").unwrap();
        let solution = ExplicitSolver::new().solve(&f.universe, &request).unwrap();

        assert_eq!(solution.universe_id(), f.universe.id());
        assert_eq!(solution.requested(), &[f.python_312]);
        assert_eq!(
            solution.decisions(),
            &[Decision::Install(f.python_312), Decision::Remove(f.python_installed)]
        );
    }

    #[test]
    fn test_multi_version_keeps_installed() {
        let f = fixture();
        let request = Request::new().install("python").unwrap();
        let solution = ExplicitSolver::new()
            .with_multi_version(true)
            .solve(&f.universe, &request)
            .unwrap();
        assert_eq!(solution.decisions(), &[Decision::Install(f.python_312)]);
    }

    #[test]
    fn test_obsoletes_removes_other_name() {
        let f = fixture();
        let request = Request::new().install("neovim").unwrap();
        let solution = ExplicitSolver::new().solve(&f.universe, &request).unwrap();
        assert_eq!(
            solution.decisions(),
            &[Decision::Install(f.neovim), Decision::Remove(f.vim)]
        );
    }

    #[test]
    fn test_conflicts_reported_together() {
        let f = fixture();
        let request = Request::new()
            .install("python 3.13.*")
            .unwrap()
            .install("ruby")
            .unwrap()
            .remove("emacs");
        let conflicts = ExplicitSolver::new().solve(&f.universe, &request).unwrap_err();

        assert_eq!(conflicts.len(), 3);
        assert!(matches!(&conflicts[0], Conflict::NoMatchingVersion { available, .. } if available.len() == 2));
        assert!(matches!(&conflicts[1], Conflict::MissingPackage { package, .. } if package == "ruby"));
        assert_eq!(
            conflicts[2],
            Conflict::NotInstalled {
                package: "emacs".to_string()
            }
        );
    }

    #[test]
    fn test_incompatible_requests_conflict() {
        let f = fixture();
        let request = Request::new()
            .install("python 3.11.*")
            .unwrap()
            .install("python 3.12.*")
            .unwrap();
        let conflicts = ExplicitSolver::new().solve(&f.universe, &request).unwrap_err();
        assert!(matches!(&conflicts[0], Conflict::ConflictingConstraints { constraints, .. } if constraints.len() == 2));
    }
}
