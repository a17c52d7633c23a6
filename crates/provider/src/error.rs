// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Errors raised by the provider core.
///
/// Incomplete unit data is deliberately absent: such units are skipped by the
/// request aggregator, never reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// A resolved unit identity does not have the `app/N` shape, so no slot
    /// id can be derived for it.
    MalformedIdentity { identity: String },
    /// No relation with this id exists on the endpoint.
    UnknownRelation { relation: String },
    /// The relation exists but has no remote unit with this local name.
    UnknownUnit { relation: String, unit: String },
}

impl ProviderError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedIdentity { .. } => "MALFORMED_IDENTITY",
            Self::UnknownRelation { .. } => "UNKNOWN_RELATION",
            Self::UnknownUnit { .. } => "UNKNOWN_UNIT",
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedIdentity { identity } => {
                write!(f, "{}: unit identity {identity:?} is not of the form app/N", self.as_str())
            }
            Self::UnknownRelation { relation } => {
                write!(f, "{}: no relation {relation:?}", self.as_str())
            }
            Self::UnknownUnit { relation, unit } => {
                write!(f, "{}: no unit {unit:?} on relation {relation:?}", self.as_str())
            }
        }
    }
}

impl std::error::Error for ProviderError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
