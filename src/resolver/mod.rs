// src/resolver/mod.rs

//! Solver interface
//!
//! Dependency solving is an external capability: anything implementing
//! [`Solver`] turns a [`Request`] against a [`Universe`] into a [`Solution`]
//! (signed decisions bound to that universe) or a list of [`Conflict`]s.
//! [`ExplicitSolver`] is the simple implementation used for "install exactly
//! this / remove exactly this" requests; it picks candidates but performs no
//! dependency completion.

mod conflict;
mod decision;
mod explicit;

pub use conflict::{Conflict, conflicts_to_error};
pub use decision::{Decision, Solution};
pub use explicit::ExplicitSolver;

use crate::error::Result;
use crate::universe::{Dependency, Universe};

/// One thing the user asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Install a package matching the dependency
    Install(Dependency),
    /// Remove every installed package of this name
    Remove(String),
}

/// An ordered list of jobs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    jobs: Vec<Job>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an install job parsed from a match spec such as "openssl >=3"
    pub fn install(mut self, spec: &str) -> Result<Self> {
        self.jobs.push(Job::Install(Dependency::parse(spec)?));
        Ok(self)
    }

    pub fn remove(mut self, name: impl Into<String>) -> Self {
        self.jobs.push(Job::Remove(name.into()));
        self
    }

    pub fn push(&mut self, job: Job) {
        self.jobs.push(job);
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// A dependency solver
pub trait Solver {
    /// Solve `request` against `universe`
    fn solve(
        &mut self,
        universe: &Universe,
        request: &Request,
    ) -> std::result::Result<Solution, Vec<Conflict>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = Request::new()
            .install("openssl >=3")
            .unwrap()
            .remove("vim");
        assert_eq!(request.jobs().len(), 2);
        assert!(matches!(&request.jobs()[0], Job::Install(dep) if dep.name == "openssl"));
        assert_eq!(request.jobs()[1], Job::Remove("vim".to_string()));
    }

    #[test]
    fn test_request_rejects_bad_spec() {
        assert!(Request::new().install(">=3").is_err());
    }
}
