// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service-wide values published identically to every relation.

use crate::relation::{Relation, RelationProvider, VAULT_CA, VAULT_URL};

/// Publish the service URL to every relation, overwriting any prior value.
///
/// `remote_binding` is deprecated and ignored apart from a warning.
pub fn publish_url<P: RelationProvider>(provider: &mut P, url: &str, remote_binding: Option<&str>) {
    if let Some(binding) = remote_binding.filter(|b| !b.is_empty()) {
        tracing::warn!(binding, "remote_binding in publish_url is deprecated and has no effect");
    }
    let count = broadcast(provider, VAULT_URL, url);
    tracing::info!(url, relations = count, "published service url");
}

/// Publish the CA certificate to every relation, overwriting any prior value.
pub fn publish_ca<P: RelationProvider>(provider: &mut P, ca: &str) {
    let count = broadcast(provider, VAULT_CA, ca);
    tracing::info!(bytes = ca.len(), relations = count, "published ca certificate");
}

fn broadcast<P: RelationProvider>(provider: &mut P, key: &str, value: &str) -> usize {
    let relations = provider.relations_mut();
    for relation in relations.iter_mut() {
        relation.published_mut().set(key, value);
    }
    relations.len()
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
