// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use zerocopy::{
    BigEndian, FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, U32, U64,
};

use crate::models::{
    common::{SegmentLengths, impl_bhs},
    opcode::{Opcode, RawBhsOpcode},
};

/// BHS of a Ready To Transfer PDU (opcode `0x31`).
#[repr(C)]
#[derive(Debug, Clone, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ReadyToTransfer {
    pub opcode: RawBhsOpcode,                          // 0
    pub flags: u8,                                     // 1
    reserved: [u8; 2],                                 // 2..4
    pub lengths: SegmentLengths,                       // 4..8
    pub lun: U64<BigEndian>,                           // 8..16
    pub initiator_task_tag: U32<BigEndian>,            // 16..20
    pub target_transfer_tag: U32<BigEndian>,           // 20..24
    pub stat_sn: U32<BigEndian>,                       // 24..28
    pub exp_cmd_sn: U32<BigEndian>,                    // 28..32
    pub max_cmd_sn: U32<BigEndian>,                    // 32..36
    pub r2t_sn: U32<BigEndian>,                        // 36..40
    pub buffer_offset: U32<BigEndian>,                 // 40..44
    pub desired_data_transfer_length: U32<BigEndian>,  // 44..48
}

impl_bhs!(ReadyToTransfer, status);

impl ReadyToTransfer {
    pub fn new(itt: u32, ttt: u32, offset: u32, len: u32) -> Self {
        let mut header = Self::new_zeroed();
        header.opcode = RawBhsOpcode::new(Opcode::ReadyToTransfer);
        header.flags = 0x80;
        header.initiator_task_tag.set(itt);
        header.target_transfer_tag.set(ttt);
        header.buffer_offset.set(offset);
        header.desired_data_transfer_length.set(len);
        header
    }
}
