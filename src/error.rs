// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Error taxonomy of the session engine.
//!
//! Every variant maps onto one errno class. The session uses
//! [`IscsiError::is_instant`] and [`IscsiError::is_retryable`] to decide
//! whether a failed connection is reopened, abandoned, or whether the whole
//! session is poisoned.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IscsiError {
    /// Malformed or unexpected input from the target (EPROTO).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// CHAP mismatch or target-side authentication failure (EACCES).
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Target-side authorisation failure (EPERM).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Target not found or removed (ENODEV).
    #[error("no such device: {0}")]
    NoDevice(String),

    #[error("out of memory: {0}")]
    NoMemory(String),

    /// Connection closed or transport failure (ECONNRESET).
    #[error("connection reset: {0}")]
    ConnectionReset(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl IscsiError {
    /// Symbolic errno name, used in log records.
    pub fn errno(&self) -> &'static str {
        match self {
            Self::Protocol(_) => "EPROTO",
            Self::AccessDenied(_) => "EACCES",
            Self::PermissionDenied(_) => "EPERM",
            Self::NoDevice(_) => "ENODEV",
            Self::NoMemory(_) => "ENOMEM",
            Self::ConnectionReset(_) => "ECONNRESET",
            Self::NotSupported(_) => "ENOTSUP",
            Self::Io(_) => "EIO",
            Self::InvalidArgument(_) => "EINVAL",
        }
    }

    /// Failures that will not go away by reconnecting. Once seen, every
    /// later command on the session fails immediately with the same error.
    pub fn is_instant(&self) -> bool {
        matches!(self, Self::AccessDenied(_) | Self::PermissionDenied(_))
    }

    /// Failures that tear down the connection and trigger a fresh login.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::NoMemory(_) | Self::ConnectionReset(_)
        )
    }
}

impl From<std::io::Error> for IscsiError {
    fn from(e: std::io::Error) -> Self {
        Self::ConnectionReset(e.to_string())
    }
}

impl From<std::collections::TryReserveError> for IscsiError {
    fn from(e: std::collections::TryReserveError) -> Self {
        Self::NoMemory(e.to_string())
    }
}
