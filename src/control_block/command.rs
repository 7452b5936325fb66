// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;

use crate::error::IscsiError;

/// One SCSI command handed to the session, together with its single data
/// buffer and the outcome fields the session fills in.
///
/// A command moves data in at most one direction: `data_in` is sized to the
/// expected read length, `data_out` holds the bytes to write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScsiCommand {
    pub cdb: [u8; 16],
    pub data_in: Vec<u8>,
    pub data_out: Bytes,
    /// SCSI status byte reported by the target.
    pub status: u8,
    /// Sense response code (0x70/0x72...) captured from a SCSI Response.
    pub sense_response: u8,
    /// Positive for underflow, negative for overflow.
    pub residual: i64,
}

impl ScsiCommand {
    /// Command without a data phase.
    pub fn new(cdb: [u8; 16]) -> Self {
        Self {
            cdb,
            ..Default::default()
        }
    }

    /// Command reading `len` bytes from the target.
    pub fn read(cdb: [u8; 16], len: usize) -> Self {
        Self {
            cdb,
            data_in: vec![0u8; len],
            ..Default::default()
        }
    }

    /// Command writing `data` to the target.
    pub fn write(cdb: [u8; 16], data: impl Into<Bytes>) -> Self {
        Self {
            cdb,
            data_out: data.into(),
            ..Default::default()
        }
    }

    pub fn is_bidirectional(&self) -> bool {
        !self.data_in.is_empty() && !self.data_out.is_empty()
    }

    /// Size of the data phase in whichever direction it flows.
    pub fn expected_transfer_len(&self) -> usize {
        self.data_in.len().max(self.data_out.len())
    }
}

/// A finished command and how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub command: ScsiCommand,
    pub result: Result<(), IscsiError>,
}
