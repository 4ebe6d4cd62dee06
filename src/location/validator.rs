//! Location Validator
//!
//! Resolves a Location and compares the fingerprint stored in it against the
//! target's current text.

use serde::{Deserialize, Serialize};

use super::fingerprint::fingerprint;
use super::resolver::resolve;
use super::types::Location;
use crate::tree::DocumentTree;

/// How content drift affects validity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftPolicy {
    /// Drift is logged; the Location stays valid
    #[default]
    Soft,
    /// Drift makes the Location invalid
    Strict,
}

/// Outcome of checking a Location against a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// Resolves, and the fingerprint matches or is absent
    Valid,
    /// Resolves, but the target's text changed
    Drifted { expected: String, actual: String },
    /// No longer maps onto the tree
    Unresolvable,
}

impl Validation {
    pub fn is_resolvable(&self) -> bool {
        !matches!(self, Validation::Unresolvable)
    }

    pub fn is_drifted(&self) -> bool {
        matches!(self, Validation::Drifted { .. })
    }
}

/// Validates Locations under a drift policy
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    policy: DriftPolicy,
}

impl Validator {
    pub fn new(policy: DriftPolicy) -> Self {
        Self { policy }
    }

    pub fn strict() -> Self {
        Self::new(DriftPolicy::Strict)
    }

    pub fn soft() -> Self {
        Self::new(DriftPolicy::Soft)
    }

    pub fn policy(&self) -> DriftPolicy {
        self.policy
    }

    /// Classify `location` against `tree`
    pub fn check<T: DocumentTree>(&self, location: &Location, tree: &T) -> Validation {
        let Some(resolved) = resolve(location, tree) else {
            return Validation::Unresolvable;
        };

        let Some(expected) = &location.content_hash else {
            return Validation::Valid;
        };

        let actual = fingerprint(&tree.text_of(resolved.node));
        if &actual == expected {
            Validation::Valid
        } else {
            Validation::Drifted {
                expected: expected.clone(),
                actual,
            }
        }
    }

    /// Check whether `location` can be restored against `tree`
    ///
    /// Drift is reported as a warning; only strict mode turns it into `false`.
    pub fn validate<T: DocumentTree>(&self, location: &Location, tree: &T) -> bool {
        match self.check(location, tree) {
            Validation::Valid => true,
            Validation::Unresolvable => false,
            Validation::Drifted { expected, actual } => {
                tracing::warn!(
                    location = %location,
                    expected_hash = %expected,
                    actual_hash = %actual,
                    policy = ?self.policy,
                    "Location content has drifted"
                );
                self.policy == DriftPolicy::Soft
            }
        }
    }
}
