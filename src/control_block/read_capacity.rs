// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use zerocopy::{BigEndian, FromBytes, Immutable, KnownLayout, U32};

use crate::{control_block::command::ScsiCommand, error::IscsiError};

/// Parameter data length of READ CAPACITY(10).
pub const READ_CAPACITY10_LEN: usize = 8;

/// Build a padded 16-byte **SCSI READ CAPACITY(10)** CDB (opcode 0x25).
#[inline]
pub fn build_read_capacity10(cdb: &mut [u8; 16], control: u8) {
    cdb.fill(0);
    cdb[0] = 0x25;
    cdb[9] = control;
}

pub fn read_capacity10_command() -> ScsiCommand {
    let mut cdb = [0u8; 16];
    build_read_capacity10(&mut cdb, 0);
    ScsiCommand::read(cdb, READ_CAPACITY10_LEN)
}

/// READ CAPACITY(10) parameter data.
#[repr(C)]
#[derive(FromBytes, KnownLayout, Immutable, Debug)]
pub struct Rc10Raw {
    /// Highest valid LBA
    pub max_lba: U32<BigEndian>,
    /// Logical block length in bytes
    pub block_len: U32<BigEndian>,
}

impl Rc10Raw {
    #[inline]
    pub fn total_bytes(&self) -> u64 {
        (u64::from(self.max_lba.get()) + 1) * u64::from(self.block_len.get())
    }
}

pub fn parse_read_capacity10(buf: &[u8]) -> Result<&Rc10Raw, IscsiError> {
    let (raw, _rest) = Rc10Raw::ref_from_prefix(buf).map_err(|_| {
        IscsiError::InvalidArgument(format!(
            "READ CAPACITY(10): need {READ_CAPACITY10_LEN} bytes, got {}",
            buf.len()
        ))
    })?;
    Ok(raw)
}
