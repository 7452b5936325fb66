// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use zerocopy::{BigEndian, FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, U32};

use crate::models::{
    command::common::{ScsiCommandResponseFlags, signed_residual},
    common::{SegmentLengths, impl_bhs},
    opcode::{Opcode, RawBhsOpcode},
};

/// BHS of a SCSI Response PDU (opcode `0x21`).
#[repr(C)]
#[derive(Debug, Clone, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ScsiCommandResponse {
    pub opcode: RawBhsOpcode,                           // 0
    pub flags: u8,                                      // 1
    pub response: u8,                                   // 2
    pub status: u8,                                     // 3
    pub lengths: SegmentLengths,                        // 4..8
    reserved: [u8; 8],                                  // 8..16
    pub initiator_task_tag: U32<BigEndian>,             // 16..20
    pub snack_tag: U32<BigEndian>,                      // 20..24
    pub stat_sn: U32<BigEndian>,                        // 24..28
    pub exp_cmd_sn: U32<BigEndian>,                     // 28..32
    pub max_cmd_sn: U32<BigEndian>,                     // 32..36
    pub exp_data_sn: U32<BigEndian>,                    // 36..40
    pub bidirectional_read_residual_count: U32<BigEndian>, // 40..44
    pub residual_count: U32<BigEndian>,                 // 44..48
}

impl_bhs!(ScsiCommandResponse, status);

impl ScsiCommandResponse {
    pub fn new(itt: u32) -> Self {
        let mut header = Self::new_zeroed();
        header.opcode = RawBhsOpcode::new(Opcode::ScsiCommandResp);
        header.flags = ScsiCommandResponseFlags::FINAL.bits();
        header.initiator_task_tag.set(itt);
        header
    }

    pub fn flags(&self) -> ScsiCommandResponseFlags {
        ScsiCommandResponseFlags::from_bits_truncate(self.flags)
    }

    pub fn residual(&self) -> i64 {
        let f = self.flags();
        signed_residual(
            f.contains(ScsiCommandResponseFlags::U_BIG),
            f.contains(ScsiCommandResponseFlags::O_BIG),
            self.residual_count.get(),
        )
    }
}
