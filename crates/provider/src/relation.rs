// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relation transport seam: the provider's view of its relations, the remote
//! units on each, and the key-value data it publishes to them.
//!
//! The core only talks to [`RelationProvider`] and [`Relation`]. [`Endpoint`]
//! is the in-memory implementation backing the state file and the tests.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Received field: address the client is reachable on.
pub const ACCESS_ADDRESS: &str = "access_address";
/// Received field: ingress address. Hyphenated on the wire, unlike the others.
pub const INGRESS_ADDRESS: &str = "ingress-address";
/// Received field: name of the secret backend the client wants.
pub const SECRET_BACKEND: &str = "secret_backend";
/// Received field: client hostname.
pub const HOSTNAME: &str = "hostname";
/// Received field: tri-state isolation flag.
pub const ISOLATED: &str = "isolated";
/// Received field: self-reported unit name (cross-model relations).
pub const UNIT_NAME: &str = "unit_name";

/// Published key: service URL.
pub const VAULT_URL: &str = "vault_url";
/// Published key: CA certificate.
pub const VAULT_CA: &str = "vault_ca";

/// Data a remote unit has set on the relation, as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceivedData(IndexMap<String, String>);

impl ReceivedData {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Like [`get`](Self::get), but an empty value reads as absent.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ReceivedData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One client-side participant on a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUnit {
    /// Transport-assigned local name, `app/N`.
    pub name: String,
    #[serde(default)]
    pub received: ReceivedData,
}

impl RemoteUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), received: ReceivedData::default() }
    }

    /// Builder-style setter for a received field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.received.insert(key, value);
        self
    }

    pub fn received(&self, key: &str) -> Option<&str> {
        self.received.get(key)
    }

    /// The `isolated` field as a tri-state: `None` when unset.
    pub fn isolated(&self) -> Option<bool> {
        parse_isolated(self.received.get(ISOLATED))
    }
}

/// Parse the wire form of `isolated`.
///
/// Absent, empty and `null` are unset. Boolean-like strings are accepted
/// case-insensitively. Anything else is treated as unset and logged at warn
/// level: such a unit is left out of every issuance round.
pub fn parse_isolated(raw: Option<&str>) -> Option<bool> {
    let raw = raw?.trim();
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        "" | "null" => None,
        _ => {
            tracing::warn!(value = raw, "unrecognized isolated value, treating as unset");
            None
        }
    }
}

/// Provider-owned key-value data published to every unit of one relation.
///
/// Insertion order is preserved so repeated writes of the same key keep their
/// position. Revoked credentials are tombstoned to `""`, never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublishedData(IndexMap<String, String>);

impl PublishedData {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Overwrite `key` with the empty string, keeping the key present.
    pub fn tombstone(&mut self, key: &str) {
        if let Some(value) = self.0.get_mut(key) {
            value.clear();
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// One relation as seen from the provider side.
pub trait Relation {
    /// Transport relation id, e.g. `secrets:12`.
    fn id(&self) -> &str;

    /// Remote units currently joined, in transport order.
    fn units(&self) -> &[RemoteUnit];

    fn published(&self) -> &PublishedData;

    fn published_mut(&mut self) -> &mut PublishedData;

    /// Look up a joined unit by its local name.
    fn unit(&self, name: &str) -> Option<&RemoteUnit> {
        self.units().iter().find(|u| u.name == name)
    }
}

/// The provider endpoint: every relation established on it.
pub trait RelationProvider {
    type Relation: Relation;

    fn relations(&self) -> &[Self::Relation];

    fn relations_mut(&mut self) -> &mut [Self::Relation];

    fn relation(&self, id: &str) -> Option<&Self::Relation> {
        self.relations().iter().find(|r| r.id() == id)
    }

    fn relation_mut(&mut self, id: &str) -> Option<&mut Self::Relation> {
        self.relations_mut().iter_mut().find(|r| r.id() == id)
    }

    /// True when at least one relation has at least one joined unit.
    fn is_joined(&self) -> bool {
        self.relations().iter().any(|r| !r.units().is_empty())
    }
}

/// In-memory relation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationData {
    pub id: String,
    #[serde(default)]
    pub units: Vec<RemoteUnit>,
    #[serde(default)]
    pub published: PublishedData,
}

impl RelationData {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Default::default() }
    }
}

impl Relation for RelationData {
    fn id(&self) -> &str {
        &self.id
    }

    fn units(&self) -> &[RemoteUnit] {
        &self.units
    }

    fn published(&self) -> &PublishedData {
        &self.published
    }

    fn published_mut(&mut self) -> &mut PublishedData {
        &mut self.published
    }
}

/// In-memory endpoint holding all relations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub relations: Vec<RelationData>,
}

impl Endpoint {
    pub fn new(relations: Vec<RelationData>) -> Self {
        Self { relations }
    }
}

impl RelationProvider for Endpoint {
    type Relation = RelationData;

    fn relations(&self) -> &[RelationData] {
        &self.relations
    }

    fn relations_mut(&mut self) -> &mut [RelationData] {
        &mut self.relations
    }
}

#[cfg(test)]
#[path = "relation_tests.rs"]
mod tests;
