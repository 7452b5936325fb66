//! Per-PDU behaviour of the session: CHAP, login keys, and SCSI commands.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// CHAP response computation and verification.
pub mod login_chap;
/// Handlers for the text keys received during login.
pub mod login_keys;
/// SCSI Command, Response, Data-In, R2T and Data-Out handling.
pub mod simple_scsi_command;
