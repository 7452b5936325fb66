//! A sans-IO iSCSI initiator session engine for booting from a SAN disk.
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Handles configuration, root path parsing, command-line parsing, and
/// logging.
pub mod cfg;
/// The session controller, the transport contract, and the tokio driver.
pub mod client;
/// SCSI command objects and CDB builders.
pub mod control_block;
/// Engine error taxonomy.
pub mod error;
/// Contains handlers for the PDUs and text keys the session processes.
pub mod handlers;
/// Defines the data structures for iSCSI PDUs and login text.
pub mod models;
/// Contains the RX, TX and login state machines.
pub mod state_machine;
/// Provides utility functions used throughout the crate.
pub mod utils;
