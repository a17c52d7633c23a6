// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unit identity: the name per-unit published keys are addressed by.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::relation::{RemoteUnit, UNIT_NAME};

/// Resolved logical name of a remote unit.
///
/// Either the unit's self-reported `unit_name` (needed across independently
/// named models) or its transport-assigned local name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitIdentity(String);

impl UnitIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The physical slot id: `N` in `app/N`.
    ///
    /// Requires exactly one `/`, a non-empty application part and an all-digit
    /// suffix.
    pub fn slot_id(&self) -> Result<&str, ProviderError> {
        let malformed = || ProviderError::MalformedIdentity { identity: self.0.clone() };
        let (app, slot) = self.0.split_once('/').ok_or_else(malformed)?;
        if app.is_empty() || slot.is_empty() || !slot.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        Ok(slot)
    }

    /// Published key carrying this unit's role id.
    pub fn role_id_key(&self) -> String {
        format!("{}_role_id", self.0)
    }

    /// Published key carrying this unit's one-time token.
    pub fn token_key(&self) -> String {
        format!("{}_token", self.0)
    }
}

impl fmt::Display for UnitIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve the identity of `unit`, preferring a non-empty self-reported name.
pub fn resolve(unit: &RemoteUnit) -> UnitIdentity {
    match unit.received.non_empty(UNIT_NAME) {
        Some(name) => UnitIdentity::new(name),
        None => UnitIdentity::new(unit.name.as_str()),
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
