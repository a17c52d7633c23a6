// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential assignment: publishes a unit's role id and token, revoking any
//! pair published for the same physical slot under a previous identity.
//!
//! A unit's identity can change after it already received credentials, e.g.
//! when its self-reported `unit_name` arrives over a cross-model relation.
//! The slot id (`N` in `app/N`) survives such renames, so every published key
//! ending in `{N}_role_id` or `{N}_token` is tombstoned before the new pair is
//! written. Tombstones are empty strings: consumers tell "revoked" (present,
//! empty) apart from "never issued" (absent).
//!
//! The match is a plain suffix match, so `13_token` is also cleared when
//! assigning slot `3`. [`crate::cycle::run_cycle`] assigns shorter slots first
//! so a round never leaves a longer slot cleared.

use crate::error::ProviderError;
use crate::identity::{self, UnitIdentity};
use crate::relation::{PublishedData, Relation, RelationProvider};
use crate::requests::UnitRef;

/// A scoped credential pair for one unit.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Credentials {
    pub role_id: String,
    pub token: String,
}

impl Credentials {
    pub fn new(role_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self { role_id: role_id.into(), token: token.into() }
    }
}

/// Publish `role_id` and `token` for the unit behind `unit`.
///
/// Returns the identity the pair was published under.
pub fn assign<P: RelationProvider>(
    provider: &mut P,
    unit: &UnitRef,
    role_id: &str,
    token: &str,
) -> Result<UnitIdentity, ProviderError> {
    let relation = provider
        .relation_mut(&unit.relation)
        .ok_or_else(|| ProviderError::UnknownRelation { relation: unit.relation.clone() })?;
    let remote = relation.unit(&unit.unit).ok_or_else(|| ProviderError::UnknownUnit {
        relation: unit.relation.clone(),
        unit: unit.unit.clone(),
    })?;
    let identity = identity::resolve(remote);

    if let Err(e) = publish_for(relation.published_mut(), &identity, role_id, token) {
        tracing::error!(relation = %unit.relation, unit = %unit.unit, err = %e, "refusing to assign credentials");
        return Err(e);
    }
    tracing::info!(relation = %unit.relation, unit = %unit.unit, %identity, "credentials assigned");
    Ok(identity)
}

/// Tombstone stale keys for the slot of `identity`, then write its pair.
///
/// Nothing is written when `identity` is malformed.
pub fn publish_for(
    published: &mut PublishedData,
    identity: &UnitIdentity,
    role_id: &str,
    token: &str,
) -> Result<(), ProviderError> {
    let slot = identity.slot_id()?;
    let stale = stale_keys(published, slot);
    for key in &stale {
        tracing::debug!(key = key.as_str(), slot, "tombstoning stale credential key");
        published.tombstone(key);
    }
    published.set(identity.role_id_key(), role_id);
    published.set(identity.token_key(), token);
    Ok(())
}

/// Published keys ending in `{slot}_role_id` or `{slot}_token`.
pub fn stale_keys(published: &PublishedData, slot: &str) -> Vec<String> {
    let suffixes = [format!("{slot}_role_id"), format!("{slot}_token")];
    published
        .keys()
        .filter(|key| suffixes.iter().any(|s| key.ends_with(s.as_str())))
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "assign_tests.rs"]
mod tests;
