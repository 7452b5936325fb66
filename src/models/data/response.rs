// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use zerocopy::{
    BigEndian, FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, U32, U64,
};

use crate::models::{
    command::common::signed_residual,
    common::{SegmentLengths, impl_bhs},
    data::common::DataInFlags,
    opcode::{Opcode, RawBhsOpcode},
};

/// BHS of a SCSI Data-In PDU (opcode `0x25`).
#[repr(C)]
#[derive(Debug, Clone, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ScsiDataIn {
    pub opcode: RawBhsOpcode,                // 0
    pub flags: u8,                           // 1
    reserved: u8,                            // 2
    pub status: u8,                          // 3
    pub lengths: SegmentLengths,             // 4..8
    pub lun: U64<BigEndian>,                 // 8..16
    pub initiator_task_tag: U32<BigEndian>,  // 16..20
    pub target_transfer_tag: U32<BigEndian>, // 20..24
    pub stat_sn: U32<BigEndian>,             // 24..28
    pub exp_cmd_sn: U32<BigEndian>,          // 28..32
    pub max_cmd_sn: U32<BigEndian>,          // 32..36
    pub data_sn: U32<BigEndian>,             // 36..40
    pub buffer_offset: U32<BigEndian>,       // 40..44
    pub residual_count: U32<BigEndian>,      // 44..48
}

impl_bhs!(ScsiDataIn, status);

impl ScsiDataIn {
    pub fn new(itt: u32) -> Self {
        let mut header = Self::new_zeroed();
        header.opcode = RawBhsOpcode::new(Opcode::ScsiDataIn);
        header.initiator_task_tag.set(itt);
        header.target_transfer_tag.set(u32::MAX);
        header
    }

    pub fn flags(&self) -> DataInFlags {
        DataInFlags::from_bits_truncate(self.flags)
    }

    /// Status byte is valid (S bit).
    pub fn has_status(&self) -> bool {
        self.flags().contains(DataInFlags::S)
    }

    pub fn residual(&self) -> i64 {
        let f = self.flags();
        signed_residual(
            f.contains(DataInFlags::U),
            f.contains(DataInFlags::O),
            self.residual_count.get(),
        )
    }
}
