// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::control_block::command::ScsiCommand;

/// Build a padded 16-byte **SCSI WRITE(10)** CDB.
///
/// Layout (SBC):
/// - byte 0      : OPERATION CODE = 0x2A
/// - byte 1      : WRPROTECT[7:5] | DPO[4] | FUA[3] | FUA_NV[1]
/// - bytes 2..6  : LBA (big-endian)
/// - bytes 7..9  : TRANSFER LENGTH in blocks (big-endian)
/// - byte 9      : CONTROL
#[inline]
pub fn build_write10(cdb: &mut [u8; 16], lba: u32, blocks: u16, flags: u8, control: u8) {
    cdb.fill(0);
    cdb[0] = 0x2A;
    cdb[1] = flags & 0b1111_1010;
    cdb[2..6].copy_from_slice(&lba.to_be_bytes());
    cdb[7..9].copy_from_slice(&blocks.to_be_bytes());
    cdb[9] = control;
}

/// WRITE(10) of `data` starting at `lba`; `data` must be a whole number of
/// `block_len` blocks.
pub fn write10_command(lba: u32, block_len: u32, data: Vec<u8>) -> ScsiCommand {
    let blocks = (data.len() / block_len.max(1) as usize) as u16;
    let mut cdb = [0u8; 16];
    build_write10(&mut cdb, lba, blocks, 0, 0);
    ScsiCommand::write(cdb, data)
}
