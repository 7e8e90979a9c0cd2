// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Message framing for the out-of-process helper pipe (§6: "message-framed
//! pipe exposing at minimum: `ping`, `apply(config)`, `revert`,
//! `export_golden(blacklist)`, `snapshot_current`"). A 4-byte big-endian
//! length prefix followed by a JSON-encoded [`HelperRequest`]/
//! [`HelperResponse`] — the helper is a pure executor; decision logic
//! stays in the state machine.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::domain::{ApplyRequest, DeviceId};
use crate::error::{CoreError, CoreResult};

/// Messages host → helper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum HelperRequest {
    Ping,
    Apply(ApplyRequest),
    Revert,
    ExportGolden(HashSet<DeviceId>),
    SnapshotCurrent(HashSet<DeviceId>),
}

/// Messages helper → host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HelperResponse {
    Ack,
    Error { message: String },
}

/// Length-prefixed JSON-lines encode of one `T` onto `writer`.
pub async fn write_framed<T, W>(writer: &mut W, message: &T) -> CoreResult<()>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(message)?;
    let len = u32::try_from(payload.len()).map_err(|_| CoreError::InvalidConfig("ipc frame too large".to_string()))?;
    writer.write_all(&len.to_be_bytes()).await.map_err(CoreError::LedgerIo)?;
    writer.write_all(&payload).await.map_err(CoreError::LedgerIo)?;
    writer.flush().await.map_err(CoreError::LedgerIo)?;
    Ok(())
}

/// Decode one length-prefixed JSON-lines frame from `reader`.
pub async fn read_framed<T, R>(reader: &mut R) -> CoreResult<T>
where
    T: for<'de> Deserialize<'de>,
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await.map_err(CoreError::LedgerIo)?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(CoreError::LedgerIo)?;
    let message = serde_json::from_slice(&payload)?;
    Ok(message)
}

#[cfg(test)]
#[path = "ipc_tests.rs"]
mod tests;
