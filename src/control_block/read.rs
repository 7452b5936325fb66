// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::control_block::command::ScsiCommand;

/// Build a padded 16-byte **SCSI READ(10)** CDB.
///
/// Layout (SBC):
/// - byte 0      : OPERATION CODE = 0x28
/// - byte 1      : RDPROTECT[7:5] | DPO[4] | FUA[3]
/// - bytes 2..6  : LBA (big-endian)
/// - bytes 7..9  : TRANSFER LENGTH in blocks (big-endian, 0 => none)
/// - byte 9      : CONTROL
#[inline]
pub fn build_read10(cdb: &mut [u8; 16], lba: u32, blocks: u16, flags: u8, control: u8) {
    cdb.fill(0);
    cdb[0] = 0x28;
    cdb[1] = flags & 0b1111_1000;
    cdb[2..6].copy_from_slice(&lba.to_be_bytes());
    cdb[7..9].copy_from_slice(&blocks.to_be_bytes());
    cdb[9] = control;
}

/// READ(10) of `blocks` blocks of `block_len` bytes starting at `lba`.
pub fn read10_command(lba: u32, blocks: u16, block_len: u32) -> ScsiCommand {
    let mut cdb = [0u8; 16];
    build_read10(&mut cdb, lba, blocks, 0, 0);
    ScsiCommand::read(cdb, usize::from(blocks) * block_len as usize)
}
