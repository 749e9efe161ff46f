// src/resolver/decision.rs

//! Solver output: signed decisions bound to a universe

use crate::universe::{SolvableId, Universe, UniverseId};

/// One solver decision about a package
///
/// `Install` of an already installed package means "keep it" and produces no
/// step; `Remove` of a package that is not installed is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Install(SolvableId),
    Remove(SolvableId),
}

impl Decision {
    pub fn id(self) -> SolvableId {
        match self {
            Decision::Install(id) | Decision::Remove(id) => id,
        }
    }

    pub fn is_install(self) -> bool {
        matches!(self, Decision::Install(_))
    }
}

/// A completed solve
#[derive(Debug, Clone)]
pub struct Solution {
    universe: UniverseId,
    decisions: Vec<Decision>,
    requested: Vec<SolvableId>,
}

impl Solution {
    /// Bind `decisions` to `universe`
    ///
    /// `requested` lists the packages the user asked for, in request order.
    pub fn new(universe: &Universe, decisions: Vec<Decision>, requested: Vec<SolvableId>) -> Self {
        Self {
            universe: universe.id(),
            decisions,
            requested,
        }
    }

    pub fn universe_id(&self) -> UniverseId {
        self.universe
    }

    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    pub fn requested(&self) -> &[SolvableId] {
        &self.requested
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}
