// src/transaction/mod.rs

//! Transactions: the steps that move an environment to its solved state
//!
//! A [`Transaction`] is built from solver decisions (or an explicit decision
//! set) and stays bound to the universe it was built against. Every query
//! takes that universe again and panics when handed a different one: mixing
//! universes is a programming error, not something a user can cause.
//!
//! A new (not installed) package with an install decision becomes an incoming
//! step; an installed package with a remove decision becomes an outgoing step.
//! An incoming step *replaces* the outgoing steps that share its name or that
//! it obsoletes; [`Transaction::step_newer`] and [`Transaction::step_olders`]
//! expose that linkage.
//!
//! Step types are derived on every call from the linkage and the caller's
//! [`TransactionMode`]; nothing is cached on the step.
//!
//! # Lifecycle
//!
//! ```text
//! Solution ──from_solver──▶ Transaction (unordered) ──order──▶ Transaction (ordered)
//!                                 │                                   │
//!                                 └──────── classify / plan ◀─────────┘
//! ```
//!
//! Before [`Transaction::order`] the step sequence is in ascending id order,
//! which callers must not rely on.

mod classify;
mod order;
mod plan;
mod step;

pub use classify::{ClassGroup, Classification, Summary};
pub use order::OrderFlags;
pub use plan::PlannedStep;
pub use step::{StepType, TransactionMode};

use crate::resolver::{Decision, Solution};
use crate::universe::{SolvableId, Universe, UniverseId};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// A set of steps bound to one universe
///
/// Cloning deep-copies the step set; the clone can be ordered independently.
#[derive(Debug, Clone)]
pub struct Transaction {
    universe: UniverseId,
    steps: Vec<SolvableId>,
    members: BTreeSet<SolvableId>,
    requested: Vec<SolvableId>,
    /// incoming step -> outgoing steps it replaces
    olders: BTreeMap<SolvableId, Vec<SolvableId>>,
    /// outgoing step -> incoming steps replacing it
    newers: BTreeMap<SolvableId, Vec<SolvableId>>,
    ordered: bool,
}

impl Transaction {
    /// Build a transaction from a completed solve
    ///
    /// # Panics
    ///
    /// Panics if `solution` was computed against another universe.
    pub fn from_solver(universe: &Universe, solution: &Solution) -> Self {
        assert_eq!(
            solution.universe_id(),
            universe.id(),
            "solution belongs to {} but {} was given",
            solution.universe_id(),
            universe.id()
        );
        Self::build(universe, solution.decisions(), solution.requested())
    }

    /// Build a transaction straight from explicit decisions, without solving
    ///
    /// No dependency completion happens; the caller supplies a consistent set.
    /// Install decisions count as requested, in the order given.
    ///
    /// # Panics
    ///
    /// Panics if a decision names an id the universe did not issue.
    pub fn from_solvables<I>(universe: &Universe, decisions: I) -> Self
    where
        I: IntoIterator<Item = Decision>,
    {
        let decisions: Vec<Decision> = decisions.into_iter().collect();
        let requested: Vec<SolvableId> = decisions
            .iter()
            .filter(|d| d.is_install())
            .map(|d| d.id())
            .collect();
        Self::build(universe, &decisions, &requested)
    }

    fn build(universe: &Universe, decisions: &[Decision], requested: &[SolvableId]) -> Self {
        let mut incoming = BTreeSet::new();
        let mut outgoing = BTreeSet::new();

        for &decision in decisions {
            let id = decision.id();
            assert!(
                universe.contains(id),
                "{} is not a solvable of {}",
                id,
                universe.id()
            );
            let installed = universe.solvable(id).installed;
            match decision {
                Decision::Install(_) if !installed => {
                    incoming.insert(id);
                }
                Decision::Remove(_) if installed => {
                    outgoing.insert(id);
                }
                _ => {}
            }
        }

        let mut outgoing_by_name: HashMap<&str, Vec<SolvableId>> = HashMap::new();
        for &id in &outgoing {
            outgoing_by_name
                .entry(universe.solvable(id).name.as_str())
                .or_default()
                .push(id);
        }

        let mut olders: BTreeMap<SolvableId, Vec<SolvableId>> = BTreeMap::new();
        let mut newers: BTreeMap<SolvableId, Vec<SolvableId>> = BTreeMap::new();
        for &id in &incoming {
            let solvable = universe.solvable(id);
            let mut replaced: Vec<SolvableId> = std::iter::once(solvable.name.as_str())
                .chain(solvable.obsoletes.iter().map(String::as_str))
                .filter_map(|name| outgoing_by_name.get(name))
                .flatten()
                .copied()
                .collect();
            if replaced.is_empty() {
                continue;
            }
            replaced.sort_unstable();
            replaced.dedup();
            for &old in &replaced {
                newers.entry(old).or_default().push(id);
            }
            olders.insert(id, replaced);
        }

        let members: BTreeSet<SolvableId> = incoming.union(&outgoing).copied().collect();
        let mut seen = BTreeSet::new();
        let requested: Vec<SolvableId> = requested
            .iter()
            .copied()
            .filter(|id| members.contains(id) && seen.insert(*id))
            .collect();

        debug!(
            incoming = incoming.len(),
            outgoing = outgoing.len(),
            replacements = olders.len(),
            "Built transaction for {}",
            universe.id()
        );

        Self {
            universe: universe.id(),
            steps: members.iter().copied().collect(),
            members,
            requested,
            olders,
            newers,
            ordered: false,
        }
    }

    fn assert_universe(&self, universe: &Universe) {
        assert_eq!(
            self.universe,
            universe.id(),
            "transaction belongs to {} but {} was given",
            self.universe,
            universe.id()
        );
    }

    fn assert_step(&self, step: SolvableId) {
        assert!(
            self.members.contains(&step),
            "{} is not a step of this transaction",
            step
        );
    }

    pub fn universe_id(&self) -> UniverseId {
        self.universe
    }

    /// Number of steps
    pub fn size(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps in the current sequence
    pub fn steps(&self) -> &[SolvableId] {
        &self.steps
    }

    pub fn iter(&self) -> impl Iterator<Item = SolvableId> + '_ {
        self.steps.iter().copied()
    }

    pub fn contains(&self, step: SolvableId) -> bool {
        self.members.contains(&step)
    }

    /// Whether the sequence is the result of [`order`](Self::order)
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Steps the user asked for, in request order
    pub fn requested(&self) -> &[SolvableId] {
        &self.requested
    }

    /// Incoming step replacing the outgoing `step`, if any
    ///
    /// When several incoming steps replace it, the lowest id is reported.
    pub fn step_newer(&self, universe: &Universe, step: SolvableId) -> Option<SolvableId> {
        self.assert_universe(universe);
        self.assert_step(step);
        self.newers.get(&step).and_then(|n| n.first().copied())
    }

    /// Outgoing steps replaced by the incoming `step`, in ascending id order
    pub fn step_olders(&self, universe: &Universe, step: SolvableId) -> Vec<SolvableId> {
        self.assert_universe(universe);
        self.assert_step(step);
        self.olders.get(&step).cloned().unwrap_or_default()
    }

    /// Same-name linkage does not count when several versions may coexist
    fn linked<'a>(
        &'a self,
        universe: &'a Universe,
        step: SolvableId,
        links: &'a BTreeMap<SolvableId, Vec<SolvableId>>,
        mode: TransactionMode,
    ) -> impl Iterator<Item = SolvableId> + 'a {
        let name = &universe.solvable(step).name;
        links
            .get(&step)
            .into_iter()
            .flatten()
            .copied()
            .filter(move |&other| !mode.multi_version || &universe.solvable(other).name != name)
    }

    /// Derive the type of `step` under `mode`
    ///
    /// Incoming steps: no replaced package → install; a replaced package of
    /// the same name → upgrade, downgrade or reinstall by the universe's
    /// comparator (reinstall collapses to ignore under `ignore_satisfied`);
    /// only packages of other names → obsoletes.
    ///
    /// Outgoing steps: no replacement → erase; otherwise ignore, unless
    /// `show_replaced` asks for the replacement's type (obsoletes when the
    /// names differ).
    pub fn step_type(&self, universe: &Universe, step: SolvableId, mode: TransactionMode) -> StepType {
        self.assert_universe(universe);
        self.assert_step(step);

        let solvable = universe.solvable(step);
        if !solvable.installed {
            let olders: Vec<SolvableId> = self.linked(universe, step, &self.olders, mode).collect();
            if olders.is_empty() {
                return StepType::Install;
            }
            return match olders
                .iter()
                .find(|&&old| universe.solvable(old).name == solvable.name)
            {
                Some(&same) => match universe.compare(step, same) {
                    Ordering::Greater => StepType::Upgrade,
                    Ordering::Less => StepType::Downgrade,
                    Ordering::Equal if mode.ignore_satisfied => StepType::Ignore,
                    Ordering::Equal => StepType::Reinstall,
                },
                None => StepType::Obsoletes,
            };
        }

        match self.linked(universe, step, &self.newers, mode).next() {
            None => StepType::Erase,
            Some(_) if !mode.show_replaced => StepType::Ignore,
            Some(newer) if universe.solvable(newer).name != solvable.name => StepType::Obsoletes,
            Some(newer) => self.step_type(universe, newer, mode),
        }
    }
}
