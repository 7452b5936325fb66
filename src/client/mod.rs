//! This module contains the session controller, the transport contract it
//! drives, and a tokio socket driver.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Socket timeout helpers for the driver.
pub mod common;
/// tokio TCP driver running a session.
pub mod connection;
/// The session controller: login, retries, command execution.
pub mod session;
/// The byte-stream contract consumed by the session.
pub mod transport;
