// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Why a bounded socket operation produced no value.
#[derive(Debug, Error)]
pub enum IoAbort {
    #[error("{0} cancelled")]
    Cancelled(&'static str),
    #[error("{0} timed out after {1:?}")]
    TimedOut(&'static str, Duration),
    #[error("{0} failed: {1}")]
    Failed(&'static str, #[source] std::io::Error),
}

impl IoAbort {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Run one socket operation, bounded by `io_timeout` and aborted early when
/// `cancel` fires.
pub(super) async fn io_with_timeout<F, T>(
    label: &'static str,
    fut: F,
    io_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<T, IoAbort>
where
    F: Future<Output = std::io::Result<T>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(IoAbort::Cancelled(label)),
        res = timeout(io_timeout, fut) => match res {
            Ok(done) => done.map_err(|e| IoAbort::Failed(label, e)),
            Err(_) => Err(IoAbort::TimedOut(label, io_timeout)),
        },
    }
}
