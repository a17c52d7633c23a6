// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! vault-kv: provider side of the vault-kv credential exchange.

pub mod assign;
pub mod broadcast;
pub mod changes;
pub mod config;
pub mod cycle;
pub mod error;
pub mod identity;
pub mod relation;
pub mod requests;
pub mod store;
pub mod test_support;

use anyhow::Context;
use serde_json::json;

use crate::config::{Command, Config};
use crate::cycle::StaticIssuer;
use crate::relation::{Relation, RelationProvider};
use crate::requests::UnitRef;

/// Run one hook invocation against the state file and return its JSON output.
///
/// Commands that change published data or cycle state save the state file
/// before returning.
pub fn run(config: &Config) -> anyhow::Result<serde_json::Value> {
    let mut state = store::load(&config.state)?;
    let endpoint_name = config.endpoint.as_str();

    let (output, dirty) = match &config.command {
        Command::Evaluate => {
            let evaluation = state.cycle.evaluate(&state.endpoint);
            let out = json!({
                "connected": evaluation.state.connected,
                "new_request": evaluation.state.new_request,
                "pending": state.cycle.pending,
                "retry": state.cycle.retry,
                "flags": evaluation.state.flag_names(endpoint_name),
                "changed": evaluation.changed.flag_names(endpoint_name),
            });
            (out, true)
        }
        Command::Requests => (serde_json::to_value(requests::requests(&state.endpoint))?, false),
        Command::Assign { relation, unit, role_id, token } => {
            let unit_ref = UnitRef::new(relation.as_str(), unit.as_str());
            let identity = assign::assign(&mut state.endpoint, &unit_ref, role_id, token)?;
            (json!({ "unit": unit_ref, "unit_name": identity }), true)
        }
        Command::Issue { credentials, force } => {
            let mut issuer = StaticIssuer::load(credentials)?;
            let report = cycle::run_cycle(&mut state.endpoint, &mut state.cycle, &mut issuer, *force)?;
            (serde_json::to_value(report)?, true)
        }
        Command::PublishUrl { url, remote_binding } => {
            broadcast::publish_url(&mut state.endpoint, url, remote_binding.as_deref());
            (json!({ "vault_url": url, "relations": state.endpoint.relations().len() }), true)
        }
        Command::PublishCa { ca, file } => {
            let ca = match (ca, file) {
                (Some(ca), _) => ca.clone(),
                (None, Some(path)) => std::fs::read_to_string(path)
                    .with_context(|| format!("reading CA from {}", path.display()))?,
                (None, None) => anyhow::bail!("a CA certificate or --file is required"),
            };
            broadcast::publish_ca(&mut state.endpoint, &ca);
            (json!({ "relations": state.endpoint.relations().len() }), true)
        }
        Command::Show { relation } => {
            let mut out = serde_json::Map::new();
            for rel in state.endpoint.relations() {
                if relation.as_deref().is_some_and(|id| id != rel.id()) {
                    continue;
                }
                out.insert(rel.id().to_owned(), serde_json::to_value(rel.published())?);
            }
            if let Some(id) = relation {
                if out.is_empty() {
                    return Err(error::ProviderError::UnknownRelation { relation: id.clone() }.into());
                }
            }
            (serde_json::Value::Object(out), false)
        }
    };

    if dirty {
        store::save(&config.state, &state)?;
    }
    Ok(output)
}
