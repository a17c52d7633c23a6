// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Provider side of the vault-kv credential exchange.
///
/// Each invocation runs one hook against the state file, which stands in for
/// the relation transport between invocations.
#[derive(Debug, Parser)]
#[command(name = "vault-kv", version, about)]
pub struct Config {
    /// Path to the JSON state file (relations, published data, cycle state).
    #[arg(long, env = "VAULT_KV_STATE", default_value = "vault-kv-state.json")]
    pub state: PathBuf,

    /// Endpoint name used when rendering state flags.
    #[arg(long, env = "VAULT_KV_ENDPOINT", default_value = "secrets")]
    pub endpoint: String,

    /// Log format (json or text).
    #[arg(long, env = "VAULT_KV_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "VAULT_KV_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Detect changes and print the endpoint state
    Evaluate,
    /// Print the pending issuance requests
    Requests,
    /// Publish a credential pair for one unit
    Assign {
        /// Relation id (e.g. secrets:12)
        #[arg(long)]
        relation: String,
        /// Transport-assigned unit name (e.g. app/0)
        #[arg(long)]
        unit: String,
        #[arg(long)]
        role_id: String,
        #[arg(long)]
        token: String,
    },
    /// Run a full hook cycle, issuing from a credentials file
    Issue {
        /// JSON object mapping unit identity to {role_id, token}
        #[arg(long, env = "VAULT_KV_CREDENTIALS")]
        credentials: PathBuf,
        /// Issue for every complete unit even if nothing changed
        #[arg(long)]
        force: bool,
    },
    /// Publish the service URL to every relation
    PublishUrl {
        url: String,
        /// Deprecated, has no effect
        #[arg(long)]
        remote_binding: Option<String>,
    },
    /// Publish the CA certificate to every relation
    PublishCa {
        /// CA certificate in PEM form
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        ca: Option<String>,
        /// Read the CA certificate from a file
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print published data
    Show {
        /// Only this relation
        #[arg(long)]
        relation: Option<String>,
    },
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.endpoint.is_empty() {
            anyhow::bail!("--endpoint must not be empty");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other} (expected json or text)"),
        }
        if let Command::PublishUrl { url, .. } = &self.command {
            if url.is_empty() {
                anyhow::bail!("service url must not be empty");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
