// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Wire format of the iSCSI PDUs this initiator exchanges.

/// SCSI Command and SCSI Response headers.
pub mod command;
/// BHS length word, padding and the common header trait.
pub mod common;
/// SCSI Data-In and Data-Out headers.
pub mod data;
/// Login Request and Login Response headers.
pub mod login;
/// First BHS octet.
pub mod opcode;
/// Decoding a BHS into a [`parse::Pdu`].
pub mod parse;
/// Ready To Transfer header.
pub mod ready_2_transfer;
/// `key=value` text negotiation codec.
pub mod text;
