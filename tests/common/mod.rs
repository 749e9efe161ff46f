// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use txplan::universe::RepoId;
use txplan::universe::loader::native_subdir;
use txplan::{PackageRecord, SolvableId, Universe};

/// A universe with an installed repository and one channel repository
pub struct Fixture {
    pub universe: Universe,
    pub installed: RepoId,
    pub channel: RepoId,
}

impl Fixture {
    pub fn new() -> Self {
        let mut universe = Universe::new();
        let installed = universe.add_repo("installed", "installed", 0);
        universe.set_installed_repo(installed);
        let channel = universe.add_repo("conda-forge/linux-64", "conda-forge", 1);
        Self {
            universe,
            installed,
            channel,
        }
    }

    /// Add an installed package built from `record`
    pub fn installed(&mut self, record: PackageRecord) -> SolvableId {
        self.universe.add_record(self.installed, &record).unwrap()
    }

    /// Add an available package built from `record`
    pub fn available(&mut self, record: PackageRecord) -> SolvableId {
        self.universe.add_record(self.channel, &record).unwrap()
    }
}

/// Shorthand for a record with a name, version and build
pub fn record(name: &str, version: &str) -> PackageRecord {
    PackageRecord::new(name, version).with_build("h0", 0)
}

/// Write a channel index for the native subdir under `root`
///
/// Each entry is `(name, version, depends)`.
pub fn write_channel(root: &Path, packages: &[(&str, &str, &[&str])]) {
    let dir = root.join(native_subdir());
    fs::create_dir_all(&dir).unwrap();

    let mut entries = serde_json::Map::new();
    for (name, version, depends) in packages {
        entries.insert(
            format!("{}-{}-h0.tar.bz2", name, version),
            serde_json::json!({
                "name": name,
                "version": version,
                "build": "h0",
                "build_number": 0,
                "depends": depends,
            }),
        );
    }
    let repodata = serde_json::json!({ "packages": entries });
    fs::write(dir.join("repodata.json"), repodata.to_string()).unwrap();
}

/// Write a conda-meta record for an installed package under `prefix`
pub fn write_prefix_record(prefix: &Path, name: &str, version: &str, channel: &str) {
    let meta = prefix.join("conda-meta");
    fs::create_dir_all(&meta).unwrap();
    let record = serde_json::json!({
        "name": name,
        "version": version,
        "build": "h0",
        "build_number": 0,
        "depends": [],
        "channel": channel,
    });
    fs::write(
        meta.join(format!("{}-{}-h0.json", name, version)),
        record.to_string(),
    )
    .unwrap();
}
