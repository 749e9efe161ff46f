// src/transaction/step.rs

//! Step types and classification modes

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Derived role of a step
///
/// Never stored on the step: it depends on the [`TransactionMode`] the
/// caller asks with.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// New package with nothing to replace
    Install,
    /// Installed package removed without replacement
    Erase,
    /// Same name, same version and build
    Reinstall,
    Upgrade,
    Downgrade,
    /// New package replacing installed packages of other names
    Obsoletes,
    /// Nothing to do for this step under the current mode
    Ignore,
}

impl StepType {
    /// Whether the step brings a new package into the environment
    pub fn is_incoming(self) -> bool {
        matches!(
            self,
            StepType::Install
                | StepType::Reinstall
                | StepType::Upgrade
                | StepType::Downgrade
                | StepType::Obsoletes
        )
    }
}

/// Independent toggles that change how steps classify
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionMode {
    /// Several versions of one name may be installed side by side; same-name
    /// pairs classify as independent install and erase
    pub multi_version: bool,
    /// A reinstall of an identical package collapses to `ignore`
    pub ignore_satisfied: bool,
    /// Replaced installed packages report their replacement's type instead
    /// of `ignore`
    pub show_replaced: bool,
}

impl TransactionMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_multi_version(mut self, on: bool) -> Self {
        self.multi_version = on;
        self
    }

    pub fn with_ignore_satisfied(mut self, on: bool) -> Self {
        self.ignore_satisfied = on;
        self
    }

    pub fn with_show_replaced(mut self, on: bool) -> Self {
        self.show_replaced = on;
        self
    }
}
