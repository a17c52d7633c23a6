// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request aggregation: complete per-unit issuance requests.

use serde::{Deserialize, Serialize};

use crate::identity::{self, UnitIdentity};
use crate::relation::{
    Relation, RelationProvider, RemoteUnit, ACCESS_ADDRESS, HOSTNAME, INGRESS_ADDRESS,
    SECRET_BACKEND,
};

/// Back-reference to the unit a request came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitRef {
    pub relation: String,
    /// Transport-assigned local name.
    pub unit: String,
}

impl UnitRef {
    pub fn new(relation: impl Into<String>, unit: impl Into<String>) -> Self {
        Self { relation: relation.into(), unit: unit.into() }
    }
}

/// Snapshot of one complete remote unit awaiting credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceRequest {
    pub unit: UnitRef,
    pub unit_name: UnitIdentity,
    pub access_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_address: Option<String>,
    pub secret_backend: String,
    pub hostname: String,
    pub isolated: bool,
}

impl IssuanceRequest {
    /// Build a request from `unit`, or `None` if its data is incomplete.
    ///
    /// Requires non-empty `secret_backend`, `access_address` and `hostname`
    /// and an explicitly set `isolated`. `ingress-address` is optional.
    pub fn from_unit(relation: &str, unit: &RemoteUnit) -> Option<Self> {
        let data = &unit.received;
        let secret_backend = data.non_empty(SECRET_BACKEND)?;
        let access_address = data.non_empty(ACCESS_ADDRESS)?;
        let hostname = data.non_empty(HOSTNAME)?;
        let isolated = unit.isolated()?;
        Some(Self {
            unit: UnitRef::new(relation, unit.name.as_str()),
            unit_name: identity::resolve(unit),
            access_address: access_address.to_owned(),
            ingress_address: data.get(INGRESS_ADDRESS).map(str::to_owned),
            secret_backend: secret_backend.to_owned(),
            hostname: hostname.to_owned(),
            isolated,
        })
    }
}

/// Collect requests from every unit of every relation, in transport order.
///
/// Units with incomplete data are skipped, not reported.
pub fn requests<P: RelationProvider>(provider: &P) -> Vec<IssuanceRequest> {
    let mut out = Vec::new();
    for relation in provider.relations() {
        for unit in relation.units() {
            match IssuanceRequest::from_unit(relation.id(), unit) {
                Some(req) => out.push(req),
                None => {
                    tracing::debug!(
                        relation = relation.id(),
                        unit = unit.name.as_str(),
                        "skipping unit with incomplete data"
                    );
                }
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "requests_tests.rs"]
mod tests;
