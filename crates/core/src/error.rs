// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

use thiserror::Error;

/// Errors surfaced by the control plane's own bookkeeping (ledger I/O,
/// malformed requests reaching the state machine, port wiring failures).
///
/// This is distinct from [`crate::domain::ApplyStatus`], which is the
/// *operation-result* vocabulary the state machine translates into
/// user-visible outcomes. `CoreError` covers failures that happen before
/// or around an operation even runs.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("snapshot ledger io error: {0}")]
    LedgerIo(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("message queue closed")]
    QueueClosed,

    #[error("port not wired: {0}")]
    PortMissing(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
