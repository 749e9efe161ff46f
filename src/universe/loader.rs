// src/universe/loader.rs

//! Loading channel indexes and installed-prefix records into a universe
//!
//! A channel is a directory with one subdirectory per platform
//! (`linux-64`, `noarch`, ...), each holding a `repodata.json` index with
//! `packages` and `packages.conda` maps. Every (channel, subdir) pair becomes
//! its own repository. Index files are read and parsed in parallel; the
//! repositories are then added in channel order so solvable ids are
//! reproducible.
//!
//! Installed packages come from a prefix's `conda-meta/*.json` records.
//!
//! Both loaders collect every failure before reporting, and observe the
//! interruption latch once reading is done.

use super::{Package, PackageRecord, RepoId, Universe};
use crate::config::ChannelPriority;
use crate::error::{AggregatedError, Error, ErrorCode, Failure};
use crate::interrupt::InterruptFlag;
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Platform subdirectories recognised in channel paths and URLs
pub const KNOWN_SUBDIRS: &[&str] = &[
    "noarch",
    "linux-64",
    "linux-aarch64",
    "linux-ppc64le",
    "linux-s390x",
    "osx-64",
    "osx-arm64",
    "win-64",
    "win-arm64",
];

/// Name of the repository holding installed packages
pub const INSTALLED_REPO: &str = "installed";

/// The subdir matching the running platform
pub fn native_subdir() -> &'static str {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("linux", "x86_64") => "linux-64",
        ("linux", "aarch64") => "linux-aarch64",
        ("linux", "powerpc64") => "linux-ppc64le",
        ("linux", "s390x") => "linux-s390x",
        ("macos", "x86_64") => "osx-64",
        ("macos", "aarch64") => "osx-arm64",
        ("windows", "x86_64") => "win-64",
        ("windows", "aarch64") => "win-arm64",
        _ => "noarch",
    }
}

/// Reduce a channel URL or path to its channel name
///
/// "https://conda.anaconda.org/conda-forge/linux-64" → "conda-forge"
pub fn channel_name(raw: &str) -> String {
    let mut segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() > 1 && segments.last().is_some_and(|s| KNOWN_SUBDIRS.contains(s)) {
        segments.pop();
    }
    segments.last().map(|s| s.to_string()).unwrap_or_default()
}

/// A named channel directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSource {
    pub name: String,
    pub root: PathBuf,
}

impl ChannelSource {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    /// Parse `NAME=PATH`; a bare path takes its directory name
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s.split_once('=') {
            Some((name, path)) if !name.is_empty() && !path.is_empty() => {
                Ok(Self::new(name, path))
            }
            Some(_) => Err(Error::invalid_input(format!(
                "Invalid channel '{}': expected NAME=PATH",
                s
            ))),
            None => {
                let name = channel_name(s);
                if name.is_empty() {
                    return Err(Error::invalid_input(format!("Invalid channel '{}'", s)));
                }
                Ok(Self::new(name, s))
            }
        }
    }
}

/// How channels are read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub subdirs: Vec<String>,
    pub priority: ChannelPriority,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            subdirs: vec![native_subdir().to_string(), "noarch".to_string()],
            priority: ChannelPriority::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RepoData {
    #[serde(default)]
    packages: BTreeMap<String, PackageRecord>,
    #[serde(default, rename = "packages.conda")]
    conda_packages: BTreeMap<String, PackageRecord>,
}

struct IndexFile {
    channel: usize,
    subdir: String,
    path: PathBuf,
}

struct ParsedIndex {
    channel: usize,
    subdir: String,
    packages: Vec<Package>,
}

fn read_index(file: &IndexFile, channel: &str) -> Result<ParsedIndex, Vec<Error>> {
    let fail = |msg: String| vec![Error::new(msg, ErrorCode::RepodataNotLoaded)];

    let text = fs::read_to_string(&file.path)
        .map_err(|e| fail(format!("{}: failed to read {}: {}", channel, file.path.display(), e)))?;
    let data: RepoData = serde_json::from_str(&text)
        .map_err(|e| fail(format!("{}: invalid index {}: {}", channel, file.path.display(), e)))?;

    let mut packages = Vec::with_capacity(data.packages.len() + data.conda_packages.len());
    let mut errors = Vec::new();
    for (filename, record) in data.packages.iter().chain(data.conda_packages.iter()) {
        match record.parse() {
            Ok(package) => packages.push(package),
            Err(e) => errors.push(Error::new(
                format!("{}/{}: {}: {}", channel, file.subdir, filename, e.message()),
                ErrorCode::RepodataNotLoaded,
            )),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ParsedIndex {
        channel: file.channel,
        subdir: file.subdir.clone(),
        packages,
    })
}

fn channel_priority(policy: ChannelPriority, index: usize, count: usize) -> i32 {
    match policy {
        ChannelPriority::Disabled => 0,
        ChannelPriority::Strict | ChannelPriority::Flexible => (count - index) as i32,
    }
}

/// Load channels into `universe`, one repository per (channel, subdir)
///
/// Channels earlier in `channels` get higher priority unless priorities are
/// disabled. A subdir directory that does not exist is skipped; a channel
/// with no index at all is an error. Returns the new repositories in channel
/// order.
pub fn load_channels(
    universe: &mut Universe,
    channels: &[ChannelSource],
    options: &LoadOptions,
    flag: &InterruptFlag,
) -> Result<Vec<RepoId>, Failure> {
    let mut files = Vec::new();
    let mut errors = AggregatedError::default();

    for (index, channel) in channels.iter().enumerate() {
        let before = files.len();
        for subdir in &options.subdirs {
            let dir = channel.root.join(subdir);
            if !dir.is_dir() {
                debug!("Channel {} has no {} subdir", channel.name, subdir);
                continue;
            }
            files.push(IndexFile {
                channel: index,
                subdir: subdir.clone(),
                path: dir.join("repodata.json"),
            });
        }
        if files.len() == before {
            errors.push(Error::new(
                format!(
                    "{}: no index found under {} for subdirs {}",
                    channel.name,
                    channel.root.display(),
                    options.subdirs.join(", ")
                ),
                ErrorCode::RepodataNotLoaded,
            ));
        }
    }

    let results: Vec<Result<ParsedIndex, Vec<Error>>> = files
        .par_iter()
        .map(|file| read_index(file, &channels[file.channel].name))
        .collect();

    flag.check()?;

    let mut parsed = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(index) => parsed.push(index),
            Err(errs) => errors.errors_mut().extend(errs),
        }
    }

    if !errors.is_empty() {
        return Err(errors.into());
    }

    let mut repos = Vec::with_capacity(parsed.len());
    for index in parsed {
        let channel = &channels[index.channel];
        let priority = channel_priority(options.priority, index.channel, channels.len());
        let repo = universe.add_repo(
            format!("{}/{}", channel.name, index.subdir),
            channel.name.clone(),
            priority,
        );
        let count = index.packages.len();
        for package in index.packages {
            universe.add_package(repo, package);
        }
        info!(
            "Loaded {} packages from {}/{} (priority {})",
            count, channel.name, index.subdir, priority
        );
        repos.push(repo);
    }

    Ok(repos)
}

/// Load the installed packages of `prefix` into a new installed repository
///
/// A prefix without `conda-meta` is an empty environment.
pub fn load_prefix(
    universe: &mut Universe,
    prefix: &Path,
    flag: &InterruptFlag,
) -> Result<RepoId, Failure> {
    if !prefix.is_dir() {
        return Err(Error::new(
            format!("Prefix {} does not exist", prefix.display()),
            ErrorCode::PrefixDataNotLoaded,
        )
        .into());
    }

    let meta = prefix.join("conda-meta");
    let mut paths = Vec::new();
    if meta.is_dir() {
        let entries = fs::read_dir(&meta).map_err(|e| {
            Error::new(
                format!("Failed to list {}: {}", meta.display(), e),
                ErrorCode::PrefixDataNotLoaded,
            )
        })?;
        for entry in entries {
            let path = entry.map_err(Error::from)?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
    }
    paths.sort();

    let results: Vec<Result<Package, Error>> = paths
        .par_iter()
        .map(|path| -> crate::Result<Package> {
            let text = fs::read_to_string(path)?;
            let mut record: PackageRecord = serde_json::from_str(&text)?;
            record.channel = record.channel.as_deref().map(channel_name);
            record.parse()
        })
        .collect();

    flag.check()?;

    let mut errors = AggregatedError::default();
    let mut packages = Vec::with_capacity(results.len());
    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(package) => packages.push(package),
            Err(e) => errors.push(Error::new(
                format!("{}: {}", path.display(), e.message()),
                ErrorCode::PrefixDataNotLoaded,
            )),
        }
    }
    if !errors.is_empty() {
        return Err(errors.into());
    }

    let repo = universe.add_repo(INSTALLED_REPO, INSTALLED_REPO, 0);
    universe.set_installed_repo(repo);
    let count = packages.len();
    for package in packages {
        universe.add_package(repo, package);
    }
    info!("Loaded {} installed packages from {}", count, prefix.display());

    Ok(repo)
}
