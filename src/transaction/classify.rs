// src/transaction/classify.rs

//! Grouped classification for reporting
//!
//! Steps are grouped by type and provenance: the channel a package comes
//! from and the channel it goes to. An install has no "from", an erase no
//! "to"; a replacement goes from the replaced package's channel to the new
//! package's channel. Steps that classify as `ignore` are left out.

use super::{StepType, Transaction, TransactionMode};
use crate::universe::{SolvableId, Universe};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Steps sharing a type and provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassGroup {
    pub step_type: StepType,
    pub from_channel: Option<String>,
    pub to_channel: Option<String>,
    /// In transaction order
    pub steps: Vec<SolvableId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    groups: Vec<ClassGroup>,
}

impl Classification {
    /// Groups sorted by type, then source channel, then target channel
    pub fn groups(&self) -> &[ClassGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn count(&self, step_type: StepType) -> usize {
        self.groups
            .iter()
            .filter(|g| g.step_type == step_type)
            .map(|g| g.steps.len())
            .sum()
    }

    /// Every step of one type across all groups
    pub fn steps(&self, step_type: StepType) -> Vec<SolvableId> {
        self.groups
            .iter()
            .filter(|g| g.step_type == step_type)
            .flat_map(|g| g.steps.iter().copied())
            .collect()
    }

    pub fn summary(&self) -> Summary {
        Summary {
            install: self.count(StepType::Install),
            erase: self.count(StepType::Erase),
            reinstall: self.count(StepType::Reinstall),
            upgrade: self.count(StepType::Upgrade),
            downgrade: self.count(StepType::Downgrade),
            obsoletes: self.count(StepType::Obsoletes),
        }
    }
}

/// Step counts per type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub install: usize,
    pub erase: usize,
    pub reinstall: usize,
    pub upgrade: usize,
    pub downgrade: usize,
    pub obsoletes: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.install + self.erase + self.reinstall + self.upgrade + self.downgrade + self.obsoletes
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [
            (self.install, "to install"),
            (self.erase, "to remove"),
            (self.upgrade, "to upgrade"),
            (self.downgrade, "to downgrade"),
            (self.reinstall, "to reinstall"),
            (self.obsoletes, "to replace"),
        ]
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, label)| format!("{} {}", n, label))
        .collect();

        if parts.is_empty() {
            write!(f, "Nothing to do")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

impl Transaction {
    fn provenance(
        &self,
        universe: &Universe,
        step: SolvableId,
        mode: TransactionMode,
    ) -> (Option<String>, Option<String>) {
        let solvable = universe.solvable(step);
        let channel_of = |id: SolvableId| universe.solvable(id).channel.clone();

        if solvable.installed {
            let to = self.linked(universe, step, &self.newers, mode).next().map(channel_of);
            (Some(solvable.channel.clone()), to)
        } else {
            let olders: Vec<SolvableId> = self.linked(universe, step, &self.olders, mode).collect();
            let from = olders
                .iter()
                .copied()
                .find(|&old| universe.solvable(old).name == solvable.name)
                .or_else(|| olders.first().copied())
                .map(channel_of);
            (from, Some(solvable.channel.clone()))
        }
    }

    /// Group the steps by type and provenance
    pub fn classify(&self, universe: &Universe, mode: TransactionMode) -> Classification {
        self.assert_universe(universe);

        let mut groups: BTreeMap<(StepType, Option<String>, Option<String>), Vec<SolvableId>> =
            BTreeMap::new();
        for &step in &self.steps {
            let step_type = self.step_type(universe, step, mode);
            if step_type == StepType::Ignore {
                continue;
            }
            let (from, to) = self.provenance(universe, step, mode);
            groups.entry((step_type, from, to)).or_default().push(step);
        }

        Classification {
            groups: groups
                .into_iter()
                .map(|((step_type, from_channel, to_channel), steps)| ClassGroup {
                    step_type,
                    from_channel,
                    to_channel,
                    steps,
                })
                .collect(),
        }
    }

    /// Steps of one type moving between the given channels
    ///
    /// `None` matches any channel, including no channel at all.
    pub fn classify_pkgs(
        &self,
        universe: &Universe,
        step_type: StepType,
        from_channel: Option<&str>,
        to_channel: Option<&str>,
        mode: TransactionMode,
    ) -> Vec<SolvableId> {
        self.assert_universe(universe);

        let wanted = |filter: Option<&str>, actual: &Option<String>| match filter {
            None => true,
            Some(f) => actual.as_deref() == Some(f),
        };

        self.steps
            .iter()
            .copied()
            .filter(|&step| self.step_type(universe, step, mode) == step_type)
            .filter(|&step| {
                let (from, to) = self.provenance(universe, step, mode);
                wanted(from_channel, &from) && wanted(to_channel, &to)
            })
            .collect()
    }
}
