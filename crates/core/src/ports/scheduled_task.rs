// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

/// Scheduled-task create/delete/probe (C4, §9 "side-channel" re-expression).
///
/// The state machine only sequences calls through this port; it never
/// inspects OS task-scheduler state directly.
pub trait ScheduledTaskPort: Send + Sync {
    fn create(&self) -> bool;

    fn delete(&self) -> bool;

    fn is_present(&self) -> bool;
}
