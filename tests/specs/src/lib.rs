// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `display-helper-host` binary as a subprocess, pointed at
//! an isolated snapshot directory, and drives its one-shot subcommands.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use display_helper_core::domain::{
    ActiveTopology, ApplyRequest, DevicePreparation, DisplayMode, HdrState, Snapshot,
    SingleDisplayConfiguration,
};

/// Resolve the path to the compiled `display-helper-host` binary.
pub fn host_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("display-helper-host")
}

/// A fully wired, isolated `display-helper-host` fixture: an owned snapshot
/// directory and the path to the real binary.
pub struct HostFixture {
    pub snapshot_dir: tempfile::TempDir,
}

impl HostFixture {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self { snapshot_dir: tempfile::tempdir()? })
    }

    /// Run `display-helper-host <args>` against this fixture's snapshot
    /// directory and return the completed process output.
    pub fn run(&self, args: &[&str]) -> anyhow::Result<Output> {
        let binary = host_binary();
        anyhow::ensure!(binary.exists(), "display-helper-host binary not found at {}", binary.display());

        let output = Command::new(&binary)
            .arg("--snapshot-dir")
            .arg(self.snapshot_dir.path())
            .arg("--log-format")
            .arg("text")
            .arg("--log-level")
            .arg("warn")
            .args(args)
            .output()?;
        Ok(output)
    }

    pub fn snapshot_path(&self, file_name: &str) -> PathBuf {
        self.snapshot_dir.path().join(file_name)
    }
}

/// Write an [`ApplyRequest`] as JSON to a temp file and return its path, for
/// use with `display-helper-host apply --request <path>`.
pub fn write_apply_request(dir: &Path, request: &ApplyRequest) -> anyhow::Result<PathBuf> {
    let path = dir.join("request.json");
    std::fs::write(&path, serde_json::to_vec(request)?)?;
    Ok(path)
}

pub fn sample_apply_request(primary: &str) -> ApplyRequest {
    ApplyRequest {
        configuration: SingleDisplayConfiguration {
            primary_device: primary.to_string(),
            desired_mode: Some(DisplayMode::whole_hz(1920, 1080, 60)),
            desired_hdr: Some(HdrState::Enabled),
            preparation: DevicePreparation::EnsureOnlyDisplay,
            virtual_layout: None,
        },
        topology_override: None,
        virtual_layout: None,
        session_fingerprint: "specs-fixture".to_string(),
    }
}

/// Minimal well-formed single-device snapshot, suitable for seeding a tier
/// file directly on disk ahead of a `revert` run.
pub fn sample_snapshot(id: &str) -> Snapshot {
    let mut modes = std::collections::BTreeMap::new();
    modes.insert(id.to_string(), DisplayMode::whole_hz(1920, 1080, 60));
    let mut hdr_states = std::collections::BTreeMap::new();
    hdr_states.insert(id.to_string(), HdrState::Disabled);
    Snapshot { topology: ActiveTopology::single(id), modes, hdr_states, primary_device: Some(id.to_string()) }
}
