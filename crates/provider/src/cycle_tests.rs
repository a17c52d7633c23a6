// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::relation::{Endpoint, RemoteUnit, HOSTNAME, UNIT_NAME};
use crate::test_support::{complete_unit, single_relation};

/// Issuer deriving credentials from the identity, failing for listed names.
#[derive(Default)]
struct DerivedIssuer {
    fail: Vec<String>,
    calls: usize,
}

impl CredentialIssuer for DerivedIssuer {
    fn issue(&mut self, request: &IssuanceRequest) -> anyhow::Result<Credentials> {
        self.calls += 1;
        let name = request.unit_name.as_str();
        if self.fail.iter().any(|f| f == name) {
            anyhow::bail!("backend unavailable for {name}");
        }
        Ok(Credentials::new(format!("role-{name}"), format!("token-{name}")))
    }
}

fn published<'a>(endpoint: &'a Endpoint, key: &str) -> Option<&'a str> {
    endpoint.relations[0].published.get(key)
}

#[test]
fn first_cycle_issues_for_complete_units() -> anyhow::Result<()> {
    let mut endpoint = single_relation(
        "secrets:1",
        vec![complete_unit("app/0"), complete_unit("app/1"), RemoteUnit::new("app/2")],
    );
    let mut cycle = CycleState::default();
    let mut issuer = DerivedIssuer::default();

    let report = run_cycle(&mut endpoint, &mut cycle, &mut issuer, false)?;

    assert!(report.state.connected);
    assert!(report.state.new_request);
    assert!(report.issued);
    assert_eq!(report.assigned.len(), 2);
    assert_eq!(published(&endpoint, "app/0_token"), Some("token-app/0"));
    assert_eq!(published(&endpoint, "app/1_role_id"), Some("role-app/1"));
    assert!(published(&endpoint, "app/2_token").is_none());
    assert!(!cycle.pending);
    Ok(())
}

#[test]
fn unchanged_cycle_issues_nothing() -> anyhow::Result<()> {
    let mut endpoint = single_relation("secrets:1", vec![complete_unit("app/0")]);
    let mut cycle = CycleState::default();
    let mut issuer = DerivedIssuer::default();
    run_cycle(&mut endpoint, &mut cycle, &mut issuer, false)?;

    let report = run_cycle(&mut endpoint, &mut cycle, &mut issuer, false)?;

    assert!(!report.state.new_request);
    assert!(!report.issued);
    assert_eq!(issuer.calls, 1);
    Ok(())
}

#[test]
fn field_change_triggers_new_round() -> anyhow::Result<()> {
    let mut endpoint = single_relation("secrets:1", vec![complete_unit("app/0")]);
    let mut cycle = CycleState::default();
    let mut issuer = DerivedIssuer::default();
    run_cycle(&mut endpoint, &mut cycle, &mut issuer, false)?;

    endpoint.relations[0].units[0].received.insert(HOSTNAME, "moved");
    let report = run_cycle(&mut endpoint, &mut cycle, &mut issuer, false)?;

    assert!(report.state.new_request);
    assert_eq!(report.assigned.len(), 1);
    assert_eq!(issuer.calls, 2);
    Ok(())
}

#[test]
fn identity_change_rekeys_through_cycle() -> anyhow::Result<()> {
    let mut endpoint = single_relation("secrets:1", vec![complete_unit("remote-x/3")]);
    let mut cycle = CycleState::default();
    let mut issuer = DerivedIssuer::default();
    run_cycle(&mut endpoint, &mut cycle, &mut issuer, false)?;

    // unit_name is not a tracked field, so the operator forces a round.
    endpoint.relations[0].units[0].received.insert(UNIT_NAME, "myapp/3");
    run_cycle(&mut endpoint, &mut cycle, &mut issuer, true)?;

    assert_eq!(published(&endpoint, "remote-x/3_token"), Some(""));
    assert_eq!(published(&endpoint, "myapp/3_token"), Some("token-myapp/3"));
    Ok(())
}

#[test]
fn failed_issuance_retries_only_failed_units() -> anyhow::Result<()> {
    let mut endpoint =
        single_relation("secrets:1", vec![complete_unit("app/0"), complete_unit("app/1")]);
    let mut cycle = CycleState::default();
    let mut issuer = DerivedIssuer { fail: vec!["app/0".into()], calls: 0 };

    let report = run_cycle(&mut endpoint, &mut cycle, &mut issuer, false)?;
    assert_eq!(report.failed, vec![UnitIdentity::new("app/0")]);
    assert_eq!(report.assigned, vec![UnitIdentity::new("app/1")]);
    assert!(!cycle.pending);
    assert_eq!(cycle.retry, vec![UnitIdentity::new("app/0")]);

    // Backend recovers; the next cycle retries app/0 alone, without any field change.
    issuer.fail.clear();
    endpoint.relations[0].published.set("app/1_token", "token-app/1-in-use");
    let report = run_cycle(&mut endpoint, &mut cycle, &mut issuer, false)?;
    assert!(!report.state.new_request);
    assert!(report.issued);
    assert_eq!(report.assigned, vec![UnitIdentity::new("app/0")]);
    assert_eq!(issuer.calls, 3);
    assert_eq!(published(&endpoint, "app/0_token"), Some("token-app/0"));
    assert_eq!(published(&endpoint, "app/1_token"), Some("token-app/1-in-use"));
    assert!(!cycle.owed());

    let report = run_cycle(&mut endpoint, &mut cycle, &mut issuer, false)?;
    assert!(!report.issued);
    Ok(())
}

#[test]
fn field_change_during_retry_reopens_full_round() -> anyhow::Result<()> {
    let mut endpoint =
        single_relation("secrets:1", vec![complete_unit("app/0"), complete_unit("app/1")]);
    let mut cycle = CycleState::default();
    let mut issuer = DerivedIssuer { fail: vec!["app/0".into()], calls: 0 };
    run_cycle(&mut endpoint, &mut cycle, &mut issuer, false)?;

    issuer.fail.clear();
    endpoint.relations[0].units[1].received.insert(HOSTNAME, "moved");
    let report = run_cycle(&mut endpoint, &mut cycle, &mut issuer, false)?;

    assert!(report.state.new_request);
    assert_eq!(report.assigned.len(), 2);
    assert!(cycle.retry.is_empty());
    Ok(())
}

#[test]
fn shorter_slot_assigned_later_keeps_longer_slot_credentials() -> anyhow::Result<()> {
    let mut endpoint =
        single_relation("secrets:1", vec![complete_unit("app/13"), complete_unit("app/3")]);
    let mut cycle = CycleState::default();
    let mut issuer = DerivedIssuer::default();

    let report = run_cycle(&mut endpoint, &mut cycle, &mut issuer, false)?;

    assert_eq!(report.assigned, vec![UnitIdentity::new("app/3"), UnitIdentity::new("app/13")]);
    assert_eq!(published(&endpoint, "app/13_token"), Some("token-app/13"));
    assert_eq!(published(&endpoint, "app/13_role_id"), Some("role-app/13"));
    assert_eq!(published(&endpoint, "app/3_token"), Some("token-app/3"));
    assert!(!cycle.owed());
    Ok(())
}

#[test]
fn retrying_shorter_slot_reissues_longer_slot_it_clears() -> anyhow::Result<()> {
    let mut endpoint = single_relation(
        "secrets:1",
        vec![complete_unit("app/13"), complete_unit("app/3"), complete_unit("app/4")],
    );
    let mut cycle = CycleState::default();
    let mut issuer = DerivedIssuer { fail: vec!["app/3".into()], calls: 0 };
    run_cycle(&mut endpoint, &mut cycle, &mut issuer, false)?;
    assert_eq!(published(&endpoint, "app/13_token"), Some("token-app/13"));

    issuer.fail.clear();
    let report = run_cycle(&mut endpoint, &mut cycle, &mut issuer, false)?;

    assert_eq!(report.assigned, vec![UnitIdentity::new("app/3"), UnitIdentity::new("app/13")]);
    assert_eq!(published(&endpoint, "app/3_token"), Some("token-app/3"));
    assert_eq!(published(&endpoint, "app/13_token"), Some("token-app/13"));
    assert_eq!(published(&endpoint, "app/4_token"), Some("token-app/4"));
    assert!(!cycle.owed());
    Ok(())
}

#[test]
fn retry_without_request_drops_identity() -> anyhow::Result<()> {
    let mut endpoint =
        single_relation("secrets:1", vec![complete_unit("app/0"), complete_unit("app/1")]);
    let mut cycle = CycleState::default();
    let mut issuer = DerivedIssuer { fail: vec!["app/0".into()], calls: 0 };
    run_cycle(&mut endpoint, &mut cycle, &mut issuer, false)?;

    // app/0 departs; nothing else changed.
    endpoint.relations[0].units.remove(0);
    let report = run_cycle(&mut endpoint, &mut cycle, &mut issuer, false)?;

    assert!(report.issued);
    assert!(report.assigned.is_empty());
    assert!(!cycle.owed());
    Ok(())
}

#[test]
fn malformed_identity_aborts_cycle() {
    let unit = complete_unit("app/0").with(UNIT_NAME, "standalone-unit");
    let mut endpoint = single_relation("secrets:1", vec![unit]);
    let mut cycle = CycleState::default();

    let result = run_cycle(&mut endpoint, &mut cycle, &mut DerivedIssuer::default(), false);

    let err = result.err().map(|e| format!("{e:#}")).unwrap_or_default();
    assert!(err.contains("MALFORMED_IDENTITY"), "got: {err}");
}

#[test]
fn evaluate_stores_snapshot() {
    let endpoint = single_relation("secrets:1", vec![complete_unit("app/0")]);
    let mut cycle = CycleState::default();

    let evaluation = cycle.evaluate(&endpoint);

    assert!(evaluation.state.new_request);
    assert!(evaluation.changed.any());
    assert!(cycle.snapshot.get("secrets:1", "app/0").is_some());
    assert_eq!(cycle.changed, ChangedFields::default());
    assert!(cycle.pending);

    let again = cycle.evaluate(&endpoint);
    assert_eq!(again.changed, ChangedFields::default());
    assert!(!again.state.new_request);
}

#[test]
fn static_issuer_by_identity() -> anyhow::Result<()> {
    let mut issuer = StaticIssuer::new(HashMap::from([(
        "app/0".to_owned(),
        Credentials::new("R0", "T0"),
    )]));
    let endpoint = single_relation("secrets:1", vec![complete_unit("app/0"), complete_unit("app/1")]);
    let reqs = requests(&endpoint);

    assert_eq!(issuer.issue(&reqs[0])?, Credentials::new("R0", "T0"));
    crate::assert_err_contains!(issuer.issue(&reqs[1]), "no credentials for app/1");
    Ok(())
}

#[test]
fn static_issuer_loads_json() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("creds.json");
    std::fs::write(&path, r#"{ "app/0": { "role_id": "R0", "token": "T0" } }"#)?;

    let issuer = StaticIssuer::load(&path)?;

    assert_eq!(issuer, StaticIssuer::new(HashMap::from([("app/0".to_owned(), Credentials::new("R0", "T0"))])));
    Ok(())
}
