// src/universe/mod.rs

//! Package universe
//!
//! The universe is the set of known packages, installed and available, that a
//! transaction is evaluated against. Packages live in repositories; at most one
//! repository holds the installed packages. Every package gets a
//! [`SolvableId`] that is only meaningful inside the universe that issued it,
//! and every universe carries a unique [`UniverseId`] so transactions can check
//! they are handed the universe they were built from.
//!
//! Universes are owned by the caller and are not `Clone`: a copy
//! would get a new identity and no longer match the transactions built from
//! the original.

pub mod loader;

use crate::error::{Error, Result};
use crate::version::{Version, VersionConstraint};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

static NEXT_UNIVERSE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UniverseId(u64);

impl fmt::Display for UniverseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "universe#{}", self.0)
    }
}

/// Opaque handle of a package within its universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SolvableId(u32);

impl SolvableId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SolvableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of a repository within its universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RepoId(u32);

impl RepoId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A repository of packages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repo {
    /// Unique display name, e.g. "conda-forge/linux-64"
    pub name: String,
    /// Channel the repository belongs to
    pub channel: String,
    /// Higher is preferred
    pub priority: i32,
}

/// A dependency on a named capability with a version constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub constraint: VersionConstraint,
}

impl Dependency {
    pub fn new(name: impl Into<String>, constraint: VersionConstraint) -> Self {
        Self {
            name: name.into(),
            constraint,
        }
    }

    /// Parse a match spec
    ///
    /// Examples:
    /// - "zlib" → any version
    /// - "openssl >=3.0,<4" → conjunction
    /// - "python 3.8.* *_cpython" → prefix match, build string ignored
    /// - "libgcc>=13" → operator glued to the name
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '=' | '!'))
            .unwrap_or(s.len());
        let (name, rest) = s.split_at(split);

        if name.is_empty() {
            return Err(Error::invalid_input(format!(
                "Missing package name in dependency '{}'",
                s
            )));
        }

        let constraint = match rest.split_whitespace().next() {
            Some(spec) => VersionConstraint::parse(spec)?,
            None => VersionConstraint::Any,
        };

        Ok(Self::new(name, constraint))
    }

    /// Whether `solvable` satisfies this dependency by name or by provides
    pub fn matches(&self, solvable: &Solvable) -> bool {
        if solvable.name == self.name {
            return self.constraint.satisfies(&solvable.version);
        }
        solvable.provides.iter().any(|p| p == &self.name)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.constraint {
            VersionConstraint::Any => write!(f, "{}", self.name),
            ref c => write!(f, "{} {}", self.name, c),
        }
    }
}

/// Raw package metadata as found in index files and prefix records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub build: String,
    #[serde(default)]
    pub build_number: u64,
    #[serde(default)]
    pub depends: Vec<String>,
    /// Extra capability names this package provides
    #[serde(default)]
    pub provides: Vec<String>,
    /// Package names this package replaces
    #[serde(default)]
    pub obsoletes: Vec<String>,
    /// Originating channel; prefix records carry it, index records inherit the repo's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    pub fn with_build(mut self, build: impl Into<String>, build_number: u64) -> Self {
        self.build = build.into();
        self.build_number = build_number;
        self
    }

    pub fn with_depends<I, S>(mut self, depends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends = depends.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_provides<I, S>(mut self, provides: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provides = provides.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_obsoletes<I, S>(mut self, obsoletes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.obsoletes = obsoletes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Validate and parse into a [`Package`]
    pub fn parse(&self) -> Result<Package> {
        if self.name.is_empty() {
            return Err(Error::invalid_input("Package record has an empty name"));
        }

        let version = Version::parse(&self.version).map_err(|e| {
            Error::invalid_input(format!("Package {}: {}", self.name, e.message()))
        })?;

        let requires = self
            .depends
            .iter()
            .map(|d| Dependency::parse(d))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| {
                Error::invalid_input(format!("Package {}: {}", self.name, e.message()))
            })?;

        Ok(Package {
            name: self.name.clone(),
            version,
            build: self.build.clone(),
            build_number: self.build_number,
            requires,
            provides: self.provides.clone(),
            obsoletes: self.obsoletes.clone(),
            channel: self.channel.clone(),
        })
    }
}

/// Parsed package metadata, ready to be added to a repository
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub version: Version,
    pub build: String,
    pub build_number: u64,
    pub requires: Vec<Dependency>,
    pub provides: Vec<String>,
    pub obsoletes: Vec<String>,
    pub channel: Option<String>,
}

/// One package entry in the universe
#[derive(Debug, Clone)]
pub struct Solvable {
    pub name: String,
    pub version: Version,
    pub build: String,
    pub build_number: u64,
    pub channel: String,
    pub repo: RepoId,
    pub requires: Vec<Dependency>,
    pub provides: Vec<String>,
    pub obsoletes: Vec<String>,
    pub installed: bool,
}

impl Solvable {
    /// Whether this package lists `name` in its obsoletes
    pub fn obsoletes_name(&self, name: &str) -> bool {
        self.obsoletes.iter().any(|o| o == name)
    }
}

impl fmt::Display for Solvable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)?;
        if !self.build.is_empty() {
            write!(f, "-{}", self.build)?;
        }
        Ok(())
    }
}

/// The set of known packages
#[derive(Debug)]
pub struct Universe {
    id: UniverseId,
    repos: Vec<Repo>,
    solvables: Vec<Solvable>,
    installed_repo: Option<RepoId>,
    by_name: HashMap<String, Vec<SolvableId>>,
    by_provides: HashMap<String, Vec<SolvableId>>,
}

impl Universe {
    /// Create an empty universe with a fresh identity
    pub fn new() -> Self {
        Self {
            id: UniverseId(NEXT_UNIVERSE_ID.fetch_add(1, AtomicOrdering::Relaxed)),
            repos: Vec::new(),
            solvables: Vec::new(),
            installed_repo: None,
            by_name: HashMap::new(),
            by_provides: HashMap::new(),
        }
    }

    pub fn id(&self) -> UniverseId {
        self.id
    }

    pub fn add_repo(
        &mut self,
        name: impl Into<String>,
        channel: impl Into<String>,
        priority: i32,
    ) -> RepoId {
        let id = RepoId(self.repos.len() as u32);
        self.repos.push(Repo {
            name: name.into(),
            channel: channel.into(),
            priority,
        });
        id
    }

    /// Mark `repo` as the repository of installed packages
    ///
    /// Packages already in the repository are flagged as installed; a
    /// previously marked repository loses the flag.
    pub fn set_installed_repo(&mut self, repo: RepoId) {
        assert!(repo.index() < self.repos.len(), "unknown repository {:?}", repo);
        self.installed_repo = Some(repo);
        for solvable in &mut self.solvables {
            solvable.installed = solvable.repo == repo;
        }
    }

    pub fn installed_repo(&self) -> Option<RepoId> {
        self.installed_repo
    }

    pub fn repo(&self, id: RepoId) -> &Repo {
        &self.repos[id.index()]
    }

    pub fn repos(&self) -> impl Iterator<Item = (RepoId, &Repo)> {
        self.repos
            .iter()
            .enumerate()
            .map(|(i, r)| (RepoId(i as u32), r))
    }

    pub fn find_repo(&self, name: &str) -> Option<RepoId> {
        self.repos()
            .find(|(_, r)| r.name == name)
            .map(|(id, _)| id)
    }

    /// Parse `record` and add it to `repo`
    pub fn add_record(&mut self, repo: RepoId, record: &PackageRecord) -> Result<SolvableId> {
        let package = record.parse()?;
        Ok(self.add_package(repo, package))
    }

    pub fn add_package(&mut self, repo: RepoId, package: Package) -> SolvableId {
        assert!(repo.index() < self.repos.len(), "unknown repository {:?}", repo);

        let id = SolvableId(self.solvables.len() as u32);
        let channel = package
            .channel
            .unwrap_or_else(|| self.repos[repo.index()].channel.clone());

        self.by_name
            .entry(package.name.clone())
            .or_default()
            .push(id);
        for provided in &package.provides {
            self.by_provides
                .entry(provided.clone())
                .or_default()
                .push(id);
        }

        self.solvables.push(Solvable {
            name: package.name,
            version: package.version,
            build: package.build,
            build_number: package.build_number,
            channel,
            repo,
            requires: package.requires,
            provides: package.provides,
            obsoletes: package.obsoletes,
            installed: self.installed_repo == Some(repo),
        });
        id
    }

    pub fn len(&self) -> usize {
        self.solvables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solvables.is_empty()
    }

    pub fn contains(&self, id: SolvableId) -> bool {
        id.index() < self.solvables.len()
    }

    /// Look up a solvable
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this universe.
    pub fn solvable(&self, id: SolvableId) -> &Solvable {
        match self.solvables.get(id.index()) {
            Some(s) => s,
            None => panic!("{} is not a solvable of {}", id, self.id),
        }
    }

    pub fn get(&self, id: SolvableId) -> Option<&Solvable> {
        self.solvables.get(id.index())
    }

    pub fn solvables(&self) -> impl Iterator<Item = (SolvableId, &Solvable)> {
        self.solvables
            .iter()
            .enumerate()
            .map(|(i, s)| (SolvableId(i as u32), s))
    }

    /// Ids of every package with this exact name
    pub fn by_name(&self, name: &str) -> &[SolvableId] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn installed(&self) -> impl Iterator<Item = SolvableId> + '_ {
        self.solvables()
            .filter(|(_, s)| s.installed)
            .map(|(id, _)| id)
    }

    /// Installed packages with this exact name
    pub fn installed_by_name(&self, name: &str) -> Vec<SolvableId> {
        self.by_name(name)
            .iter()
            .copied()
            .filter(|&id| self.solvable(id).installed)
            .collect()
    }

    /// Every package satisfying `dep`, in ascending id order
    pub fn what_provides(&self, dep: &Dependency) -> Vec<SolvableId> {
        let mut out: Vec<SolvableId> = self
            .by_name(&dep.name)
            .iter()
            .copied()
            .filter(|&id| dep.constraint.satisfies(&self.solvable(id).version))
            .collect();
        if let Some(providers) = self.by_provides.get(&dep.name) {
            out.extend(providers.iter().copied());
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// The universe's version comparator: version, then build number
    pub fn compare(&self, a: SolvableId, b: SolvableId) -> Ordering {
        let left = self.solvable(a);
        let right = self.solvable(b);
        left.version
            .cmp(&right.version)
            .then(left.build_number.cmp(&right.build_number))
    }

    /// Preferred available (not installed) package satisfying `dep`
    ///
    /// Ranks by repository priority, then version, then build number; ties go
    /// to the lower id.
    pub fn best_candidate(&self, dep: &Dependency) -> Option<SolvableId> {
        self.what_provides(dep)
            .into_iter()
            .filter(|&id| {
                let s = self.solvable(id);
                !s.installed && s.name == dep.name
            })
            .max_by(|&a, &b| {
                let pa = self.repo(self.solvable(a).repo).priority;
                let pb = self.repo(self.solvable(b).repo).priority;
                pa.cmp(&pb)
                    .then_with(|| self.compare(a, b))
                    .then_with(|| b.cmp(&a))
            })
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}
