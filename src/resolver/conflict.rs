// src/resolver/conflict.rs

//! Conflict types for unsatisfiable requests
//!
//! A solver returns these instead of a [`super::Solution`] when a request
//! cannot be met.

use crate::error::{Error, ErrorCode};

/// Why a request could not be satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// No package of this name exists in any repository
    MissingPackage {
        package: String,
        required_by: Vec<String>,
    },
    /// Packages of this name exist but none matches the constraint
    NoMatchingVersion {
        package: String,
        constraint: String,
        available: Vec<String>,
    },
    /// Removal requested for a package that is not installed
    NotInstalled { package: String },
    /// Packages require incompatible versions of one package
    ConflictingConstraints {
        package: String,
        constraints: Vec<(String, String)>, // (requirer, constraint)
    },
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Conflict::MissingPackage {
                package,
                required_by,
            } => {
                write!(
                    f,
                    "Missing package {} required by {}",
                    package,
                    required_by.join(", ")
                )
            }
            Conflict::NoMatchingVersion {
                package,
                constraint,
                available,
            } => write!(
                f,
                "No version of {} matches {} (available: {})",
                package,
                constraint,
                available.join(", ")
            ),
            Conflict::NotInstalled { package } => {
                write!(f, "Package {} is not installed", package)
            }
            Conflict::ConflictingConstraints {
                package,
                constraints,
            } => {
                writeln!(f, "Conflicting version requirements for package {}:", package)?;
                for (requirer, constraint) in constraints {
                    writeln!(f, "  - {} requires {}", requirer, constraint)?;
                }
                Ok(())
            }
        }
    }
}

/// Report conflicts as one `satisfiability_error` carrying them as payload
pub fn conflicts_to_error(conflicts: Vec<Conflict>) -> Error {
    let mut message = String::from("Request cannot be satisfied:");
    for conflict in &conflicts {
        message.push_str("\n  ");
        message.push_str(conflict.to_string().trim_end());
    }
    Error::with_payload(message, ErrorCode::SatisfiabilityError, conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_display() {
        let missing = Conflict::MissingPackage {
            package: "libfoo".to_string(),
            required_by: vec!["bar".to_string(), "baz".to_string()],
        };
        assert_eq!(missing.to_string(), "Missing package libfoo required by bar, baz");

        let mismatch = Conflict::NoMatchingVersion {
            package: "python".to_string(),
            constraint: "3.13.*".to_string(),
            available: vec!["3.11.9".to_string(), "3.12.4".to_string()],
        };
        assert!(mismatch.to_string().contains("available: 3.11.9, 3.12.4"));
    }

    #[test]
    fn test_conflicts_to_error_keeps_payload() {
        let conflicts = vec![Conflict::NotInstalled {
            package: "vim".to_string(),
        }];
        let err = conflicts_to_error(conflicts.clone());

        assert_eq!(err.code(), ErrorCode::SatisfiabilityError);
        assert!(err.message().contains("Package vim is not installed"));
        assert_eq!(err.payload::<Vec<Conflict>>(), Some(&conflicts));
    }
}
