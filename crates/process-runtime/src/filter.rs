//! # Message Target Filter
//!
//! Decides whether an inbound envelope is addressed to this worker.
//!
//! ## Rules
//!
//! | Envelope | Result |
//! |----------|--------|
//! | No `TargetSystem` header | not claimed |
//! | `TargetSystem` equals the descriptor, any letter case | claimed |
//! | `TargetSystem` names another subsystem | not claimed |
//!
//! The header key match is exact (`targetsystem` is a different header).
//! When the key repeats, the first occurrence in header order decides and
//! later ones are ignored.
//!
//! The filter holds no mutable state, so the transport may call it from any
//! number of tasks at once.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use shared_bus::{Envelope, TARGET_SYSTEM_HEADER};

use crate::errors::InvalidArgument;

/// Subsystem name claimed when none is configured.
pub const DEFAULT_TARGET_SYSTEM: &str = "custom";

/// Name of the subsystem this worker claims envelopes for.
///
/// Stored lower-cased; comparisons ignore letter case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TargetDescriptor(String);

impl TargetDescriptor {
    /// Create a descriptor. Blank names are rejected.
    pub fn new(name: impl AsRef<str>) -> Result<Self, InvalidArgument> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(InvalidArgument::new(
                "target_system",
                "target descriptor must not be blank",
            ));
        }
        Ok(Self(name.to_lowercase()))
    }

    /// The normalized (lower-case) name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `value` names this subsystem, ignoring letter case.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        value.to_lowercase() == self.0
    }
}

impl Default for TargetDescriptor {
    fn default() -> Self {
        Self(DEFAULT_TARGET_SYSTEM.to_string())
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TargetDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Whether `envelope` is addressed to the subsystem named by `target`.
#[must_use]
pub fn is_handled_here(envelope: &Envelope, target: &TargetDescriptor) -> bool {
    envelope
        .header(TARGET_SYSTEM_HEADER)
        .is_some_and(|value| target.matches(value))
}

/// Extension methods for routing decisions on envelopes.
pub trait TargetSystemExt {
    /// See [`is_handled_here`].
    fn is_handled_here(&self, target: &TargetDescriptor) -> bool;
}

impl TargetSystemExt for Envelope {
    fn is_handled_here(&self, target: &TargetDescriptor) -> bool {
        is_handled_here(self, target)
    }
}

/// The predicate bound to one worker's descriptor.
#[derive(Debug, Clone)]
pub struct MessageTargetFilter {
    target: TargetDescriptor,
}

impl MessageTargetFilter {
    /// Create a filter for `target`.
    pub fn new(target: TargetDescriptor) -> Self {
        Self { target }
    }

    /// Whether this worker should process `envelope`.
    #[must_use]
    pub fn claims(&self, envelope: &Envelope) -> bool {
        is_handled_here(envelope, &self.target)
    }

    /// The descriptor this filter claims for.
    #[must_use]
    pub fn target(&self) -> &TargetDescriptor {
        &self.target
    }
}
