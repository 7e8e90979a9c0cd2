// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

use std::collections::HashSet;

use clap::Parser;
use tracing::error;

use display_helper_host::commands;
use display_helper_host::config::{Command, HostConfig};

/// Initialize tracing from config. Uses `try_init` so it's safe to call
/// more than once (e.g. from tests).
fn init_tracing(cli: &HostConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if std::env::var("RUST_LOG").is_err() && cli.log_level == "info" {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level))
    } else {
        EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let result = match cli.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

#[tokio::main]
async fn main() {
    let cli = HostConfig::parse();
    init_tracing(&cli);

    let core_config = match cli.load_core_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };

    let result = match &cli.command {
        Command::Apply(args) => run_apply(&core_config, &cli, args).await,
        Command::Revert => commands::revert(&core_config, &cli.snapshot_dir).await,
        Command::Disarm => commands::disarm(&core_config, &cli.snapshot_dir).await,
        Command::ExportGolden(args) => {
            let blacklist: HashSet<String> = args.blacklist.iter().cloned().collect();
            commands::export_golden(&core_config, &cli.snapshot_dir, blacklist)
        }
        Command::SnapshotCurrent(args) => {
            let blacklist: HashSet<String> = args.blacklist.iter().cloned().collect();
            commands::snapshot_current(&core_config, &cli.snapshot_dir, blacklist)
        }
        Command::Serve => commands::serve(&core_config, &cli.snapshot_dir).await,
    };

    if let Err(err) = result {
        error!("fatal: {err:#}");
        std::process::exit(1);
    }
}

async fn run_apply(
    core_config: &display_helper_core::config::Config,
    cli: &HostConfig,
    args: &display_helper_host::config::ApplyArgs,
) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(&args.request)?;
    let request: display_helper_core::domain::ApplyRequest = serde_json::from_str(&contents)?;
    commands::apply(core_config, &cli.snapshot_dir, request).await
}
