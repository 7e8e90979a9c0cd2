// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

use display_helper_core::config::Config as CoreConfig;

/// Display Helper v2 control-plane host.
#[derive(Debug, Parser)]
#[command(name = "display-helper-host", version, about)]
pub struct HostConfig {
    /// Path to a TOML config file overriding the design-fixed defaults.
    #[arg(long, env = "DISPLAY_HELPER_CONFIG")]
    pub config_path: Option<PathBuf>,

    /// Directory holding the Current/Previous/Golden snapshot files.
    #[arg(long, env = "DISPLAY_HELPER_SNAPSHOT_DIR", default_value = "snapshots")]
    pub snapshot_dir: PathBuf,

    /// Log format (json or text).
    #[arg(long, env = "DISPLAY_HELPER_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "DISPLAY_HELPER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

impl HostConfig {
    pub fn load_core_config(&self) -> anyhow::Result<CoreConfig> {
        match &self.config_path {
            Some(path) => CoreConfig::load(path).map_err(Into::into),
            None => Ok(CoreConfig::default()),
        }
    }
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Submit an ApplyRequest (read as JSON from `--request`).
    Apply(ApplyArgs),
    /// Trigger a Revert (walk the snapshot ledger's recovery order).
    Revert,
    /// Delete the scheduled-task revert entry point and drop the armed flag.
    Disarm,
    /// Capture the current topology and save it as the Golden baseline.
    ExportGolden(BlacklistArgs),
    /// Rotate Current into Previous and save a fresh Current snapshot.
    SnapshotCurrent(BlacklistArgs),
    /// Run the state machine's event loop against a framed pipe on stdio.
    Serve,
}

#[derive(Debug, clap::Args)]
pub struct ApplyArgs {
    /// Path to a JSON-encoded ApplyRequest.
    #[arg(long)]
    pub request: PathBuf,
}

#[derive(Debug, clap::Args)]
pub struct BlacklistArgs {
    /// Device ids to exclude from the captured snapshot. May be repeated.
    #[arg(long = "blacklist")]
    pub blacklist: Vec<String>,
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
