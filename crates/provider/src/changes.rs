// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change detection: decides when a new credential-issuance cycle is needed.
//!
//! Per-field "changed" flags are computed as a typed diff of the tracked
//! fields between the previous cycle's [`FieldSnapshot`] and the current one.
//! [`evaluate`] consumes those flags and derives the [`EndpointState`] the
//! orchestrator acts on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::relation::{
    Relation, RelationProvider, RemoteUnit, ACCESS_ADDRESS, HOSTNAME, ISOLATED, SECRET_BACKEND,
};

/// Fields whose change triggers a new issuance cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedField {
    AccessAddress,
    SecretBackend,
    Hostname,
    Isolated,
}

impl TrackedField {
    pub const ALL: [Self; 4] =
        [Self::AccessAddress, Self::SecretBackend, Self::Hostname, Self::Isolated];

    /// Field name on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::AccessAddress => ACCESS_ADDRESS,
            Self::SecretBackend => SECRET_BACKEND,
            Self::Hostname => HOSTNAME,
            Self::Isolated => ISOLATED,
        }
    }
}

/// Per-field changed flags for one endpoint.
///
/// Flags accumulate until consumed by [`evaluate`], which clears each one it
/// reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFields {
    #[serde(default)]
    pub access_address: bool,
    #[serde(default)]
    pub secret_backend: bool,
    #[serde(default)]
    pub hostname: bool,
    #[serde(default)]
    pub isolated: bool,
}

impl ChangedFields {
    /// Flags for every tracked field whose value differs between `previous`
    /// and `current`, for units present in `current`.
    ///
    /// A unit absent from `previous` is compared against empty values, so a
    /// newly joined unit flags every field it already carries. Departed units
    /// raise nothing.
    pub fn between(previous: &FieldSnapshot, current: &FieldSnapshot) -> Self {
        let empty = TrackedValues::default();
        let mut changed = Self::default();
        for (relation, units) in &current.0 {
            for (unit, now) in units {
                let before = previous.get(relation, unit).unwrap_or(&empty);
                for field in TrackedField::ALL {
                    if before.get(field) != now.get(field) {
                        tracing::debug!(
                            relation = relation.as_str(),
                            unit = unit.as_str(),
                            field = field.wire_name(),
                            "field changed"
                        );
                        changed.set(field);
                    }
                }
            }
        }
        changed
    }

    pub fn is_set(&self, field: TrackedField) -> bool {
        *self.slot(field)
    }

    pub fn set(&mut self, field: TrackedField) {
        *self.slot_mut(field) = true;
    }

    /// Read and clear the flag for `field`.
    pub fn take(&mut self, field: TrackedField) -> bool {
        std::mem::take(self.slot_mut(field))
    }

    pub fn any(&self) -> bool {
        TrackedField::ALL.iter().any(|f| self.is_set(*f))
    }

    /// OR `other` into these flags.
    pub fn merge(&mut self, other: ChangedFields) {
        for field in TrackedField::ALL {
            if other.is_set(field) {
                self.set(field);
            }
        }
    }

    /// Reactive-style names of the flags currently set.
    pub fn flag_names(&self, endpoint: &str) -> Vec<String> {
        TrackedField::ALL
            .iter()
            .filter(|f| self.is_set(**f))
            .map(|f| format!("endpoint.{endpoint}.changed.{}", f.wire_name()))
            .collect()
    }

    fn slot(&self, field: TrackedField) -> &bool {
        match field {
            TrackedField::AccessAddress => &self.access_address,
            TrackedField::SecretBackend => &self.secret_backend,
            TrackedField::Hostname => &self.hostname,
            TrackedField::Isolated => &self.isolated,
        }
    }

    fn slot_mut(&mut self, field: TrackedField) -> &mut bool {
        match field {
            TrackedField::AccessAddress => &mut self.access_address,
            TrackedField::SecretBackend => &mut self.secret_backend,
            TrackedField::Hostname => &mut self.hostname,
            TrackedField::Isolated => &mut self.isolated,
        }
    }
}

/// Tracked field values of a single unit, as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isolated: Option<String>,
}

impl TrackedValues {
    pub fn of(unit: &RemoteUnit) -> Self {
        let read = |f: TrackedField| unit.received(f.wire_name()).map(str::to_owned);
        Self {
            access_address: read(TrackedField::AccessAddress),
            secret_backend: read(TrackedField::SecretBackend),
            hostname: read(TrackedField::Hostname),
            isolated: read(TrackedField::Isolated),
        }
    }

    pub fn get(&self, field: TrackedField) -> Option<&str> {
        match field {
            TrackedField::AccessAddress => self.access_address.as_deref(),
            TrackedField::SecretBackend => self.secret_backend.as_deref(),
            TrackedField::Hostname => self.hostname.as_deref(),
            TrackedField::Isolated => self.isolated.as_deref(),
        }
    }
}

/// Tracked values of every unit, keyed by relation id then unit local name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSnapshot(BTreeMap<String, BTreeMap<String, TrackedValues>>);

impl FieldSnapshot {
    pub fn capture<P: RelationProvider>(provider: &P) -> Self {
        let relations = provider
            .relations()
            .iter()
            .map(|rel| {
                let units: BTreeMap<_, _> =
                    rel.units().iter().map(|u| (u.name.clone(), TrackedValues::of(u))).collect();
                (rel.id().to_owned(), units)
            })
            .collect();
        Self(relations)
    }

    pub fn get(&self, relation: &str, unit: &str) -> Option<&TrackedValues> {
        self.0.get(relation)?.get(unit)
    }
}

/// Endpoint-level states derived once per cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointState {
    /// At least one relation has at least one joined unit.
    pub connected: bool,
    /// A tracked field changed since the last cycle.
    pub new_request: bool,
}

impl EndpointState {
    /// Reactive-style names of the states currently set.
    pub fn flag_names(&self, endpoint: &str) -> Vec<String> {
        let mut names = Vec::new();
        if self.connected {
            names.push(format!("{endpoint}.connected"));
        }
        if self.new_request {
            names.push(format!("endpoint.{endpoint}.new-request"));
        }
        names
    }
}

/// Consume the changed flags and derive the endpoint state.
///
/// Every tracked flag is cleared, whether or not an earlier one was set.
/// `connected` is a level recomputed from the provider each call.
pub fn evaluate<P: RelationProvider>(provider: &P, changed: &mut ChangedFields) -> EndpointState {
    let mut any_changed = false;
    for field in TrackedField::ALL {
        any_changed |= changed.take(field);
    }
    let state = EndpointState { connected: provider.is_joined(), new_request: any_changed };
    tracing::debug!(connected = state.connected, new_request = state.new_request, "evaluated");
    state
}

#[cfg(test)]
#[path = "changes_tests.rs"]
mod tests;
