// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State persistence: load/save the endpoint and cycle state to a JSON file
//! with atomic writes.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::cycle::CycleState;
use crate::relation::Endpoint;

/// Everything one hook invocation needs from the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub endpoint: Endpoint,
    #[serde(default)]
    pub cycle: CycleState,
}

/// Load state from `path`. A missing file yields the empty state.
pub fn load(path: &Path) -> anyhow::Result<StateFile> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no state file, starting empty");
            return Ok(StateFile::default());
        }
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    let state: StateFile =
        serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    Ok(state)
}

/// Save state to `path` atomically (write tmp + rename).
///
/// The temp name carries the PID and a counter so concurrent saves never
/// share a temp file.
pub fn save(path: &Path, state: &StateFile) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let json = serde_json::to_string_pretty(state)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json).with_context(|| format!("writing {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
