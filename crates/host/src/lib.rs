// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Process-level wiring for the display-helper control plane: stub OS
//! adapters, the CLI surface, and the command dispatch that bridges them
//! to `display-helper-core`.

pub mod adapters;
pub mod commands;
pub mod config;
