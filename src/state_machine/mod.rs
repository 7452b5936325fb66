// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Table-driven state machines of the session engine.

/// Login phase, pending key groups and authentication status.
pub mod login_states;
/// PDU reassembly from the byte stream.
pub mod rx_states;
/// Resumable PDU emission.
pub mod tx_states;
