// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: unit/endpoint builders and assertion helpers.

use crate::relation::{
    Endpoint, RelationData, RemoteUnit, ACCESS_ADDRESS, HOSTNAME, INGRESS_ADDRESS, ISOLATED,
    SECRET_BACKEND,
};

/// Every field the request aggregator requires, derived from the unit's slot
/// so values stay distinct across units.
fn complete_fields(name: &str) -> [(&'static str, String); 5] {
    let slot = name.rsplit('/').next().unwrap_or(name);
    [
        (ACCESS_ADDRESS, format!("10.0.0.{slot}")),
        (INGRESS_ADDRESS, format!("10.1.0.{slot}")),
        (SECRET_BACKEND, "charm-app".to_owned()),
        (HOSTNAME, format!("host-{slot}")),
        (ISOLATED, "false".to_owned()),
    ]
}

/// A unit carrying every field the request aggregator requires.
pub fn complete_unit(name: &str) -> RemoteUnit {
    let mut unit = RemoteUnit::new(name);
    unit.received = complete_fields(name).into_iter().collect();
    unit
}

/// Like [`complete_unit`], with `field` never sent.
pub fn complete_unit_without(name: &str, field: &str) -> RemoteUnit {
    let mut unit = RemoteUnit::new(name);
    unit.received = complete_fields(name).into_iter().filter(|(key, _)| *key != field).collect();
    unit
}

/// A relation holding `units`, in order.
pub fn relation(id: &str, units: Vec<RemoteUnit>) -> RelationData {
    RelationData { id: id.to_owned(), units, ..Default::default() }
}

/// An endpoint with a single relation holding `units`.
pub fn single_relation(id: &str, units: Vec<RemoteUnit>) -> Endpoint {
    Endpoint::new(vec![relation(id, units)])
}

/// Assert that a `Result` is `Err` and its display string contains `$substr`.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
