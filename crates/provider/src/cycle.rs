// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One hook cycle: detect changes, aggregate requests, issue and assign.
//!
//! All state carried between cycles lives in [`CycleState`], which the caller
//! persists (see [`crate::store`]). Nothing here is process-global.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::assign::{assign, Credentials};
use crate::changes::{self, ChangedFields, EndpointState, FieldSnapshot};
use crate::identity::UnitIdentity;
use crate::relation::RelationProvider;
use crate::requests::{requests, IssuanceRequest};

/// State threaded from one hook cycle to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleState {
    /// Tracked field values as of the last evaluation.
    #[serde(default)]
    pub snapshot: FieldSnapshot,
    /// Changed flags not yet consumed.
    #[serde(default)]
    pub changed: ChangedFields,
    /// A full issuance round is owed: a change was seen and no round has run
    /// since.
    #[serde(default)]
    pub pending: bool,
    /// Identities whose issuance failed in the last round.
    #[serde(default)]
    pub retry: Vec<UnitIdentity>,
}

/// Result of [`CycleState::evaluate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub state: EndpointState,
    /// The changed flags this evaluation consumed.
    pub changed: ChangedFields,
}

impl CycleState {
    /// Fold the diff against the stored snapshot into the changed flags,
    /// evaluate, and remember the current snapshot for the next cycle.
    pub fn evaluate<P: RelationProvider>(&mut self, provider: &P) -> Evaluation {
        let current = FieldSnapshot::capture(provider);
        self.changed.merge(ChangedFields::between(&self.snapshot, &current));
        self.snapshot = current;

        let changed = self.changed;
        let state = changes::evaluate(provider, &mut self.changed);
        if state.new_request {
            self.pending = true;
        }
        Evaluation { state, changed }
    }

    /// Whether any issuance is owed, full round or retry.
    pub fn owed(&self) -> bool {
        self.pending || !self.retry.is_empty()
    }
}

/// Issues credentials for a request. The backend lives outside this crate.
pub trait CredentialIssuer {
    fn issue(&mut self, request: &IssuanceRequest) -> anyhow::Result<Credentials>;
}

/// Issuer handing out pre-issued credentials keyed by unit identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticIssuer {
    credentials: HashMap<String, Credentials>,
}

impl StaticIssuer {
    pub fn new(credentials: HashMap<String, Credentials>) -> Self {
        Self { credentials }
    }

    /// Load a JSON object mapping identity to `{ "role_id", "token" }`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading credentials from {}", path.display()))?;
        let issuer: Self = serde_json::from_str(&contents)
            .with_context(|| format!("parsing credentials from {}", path.display()))?;
        Ok(issuer)
    }
}

impl CredentialIssuer for StaticIssuer {
    fn issue(&mut self, request: &IssuanceRequest) -> anyhow::Result<Credentials> {
        self.credentials
            .get(request.unit_name.as_str())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no credentials for {}", request.unit_name))
    }
}

/// Outcome of [`run_cycle`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub state: EndpointState,
    /// Whether an issuance round ran this cycle.
    pub issued: bool,
    pub assigned: Vec<UnitIdentity>,
    pub failed: Vec<UnitIdentity>,
}

/// Run one hook cycle against `provider`.
///
/// A full round serves every complete unit. It runs when a change was seen
/// (or `force` is set). Otherwise only the identities that failed last round
/// are retried, together with any unit on the same relation whose slot the
/// retried assignment would tombstone. A failure to issue for one unit is
/// logged and the round continues. A malformed identity aborts the cycle.
pub fn run_cycle<P, I>(
    provider: &mut P,
    cycle: &mut CycleState,
    issuer: &mut I,
    force: bool,
) -> anyhow::Result<CycleReport>
where
    P: RelationProvider,
    I: CredentialIssuer + ?Sized,
{
    let state = cycle.evaluate(provider).state;
    let mut report = CycleReport { state, ..Default::default() };

    if !(force || cycle.owed()) {
        tracing::debug!(connected = state.connected, "no issuance owed");
        return Ok(report);
    }
    report.issued = true;

    let full_round = cycle.pending || force;
    let mut batch = requests(provider);
    if !full_round {
        batch = retry_batch(batch, &cycle.retry);
    }
    // Shorter slots first: assigning slot `3` tombstones `13_*`, never the reverse.
    batch.sort_by_key(|r| r.unit_name.slot_id().map_or(usize::MAX, str::len));
    tracing::info!(requests = batch.len(), full_round, "issuing credentials");

    for request in &batch {
        let creds = match issuer.issue(request) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(
                    unit = %request.unit_name, backend = %request.secret_backend, err = %e,
                    "credential issuance failed"
                );
                report.failed.push(request.unit_name.clone());
                continue;
            }
        };
        let identity = assign(provider, &request.unit, &creds.role_id, &creds.token)
            .with_context(|| format!("assigning credentials to {}", request.unit.unit))?;
        report.assigned.push(identity);
    }

    cycle.pending = false;
    cycle.retry = report.failed.clone();
    tracing::info!(
        assigned = report.assigned.len(),
        failed = report.failed.len(),
        "issuance round complete"
    );
    Ok(report)
}

/// The requests a retry round serves: every identity in `retry`, plus the
/// units on the same relation whose slot ends with a retried slot.
fn retry_batch(all: Vec<IssuanceRequest>, retry: &[UnitIdentity]) -> Vec<IssuanceRequest> {
    let retried: Vec<(String, String)> = all
        .iter()
        .filter(|r| retry.contains(&r.unit_name))
        .filter_map(|r| {
            let slot = r.unit_name.slot_id().ok()?;
            Some((r.unit.relation.clone(), slot.to_owned()))
        })
        .collect();

    all.into_iter()
        .filter(|r| {
            retry.contains(&r.unit_name)
                || r.unit_name.slot_id().is_ok_and(|slot| {
                    retried.iter().any(|(rel, s)| *rel == r.unit.relation && slot.ends_with(s.as_str()))
                })
        })
        .collect()
}

#[cfg(test)]
#[path = "cycle_tests.rs"]
mod tests;
