// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use zerocopy::{
    BigEndian, FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, U32, U64,
};

use crate::models::{
    common::{SegmentLengths, impl_bhs},
    data::common::DataOutFlags,
    opcode::{Opcode, RawBhsOpcode},
};

/// BHS of a SCSI Data-Out PDU (opcode `0x05`).
#[repr(C)]
#[derive(Debug, Clone, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ScsiDataOut {
    pub opcode: RawBhsOpcode,               // 0
    pub flags: u8,                          // 1
    reserved1: [u8; 2],                     // 2..4
    pub lengths: SegmentLengths,            // 4..8
    pub lun: U64<BigEndian>,                // 8..16
    pub initiator_task_tag: U32<BigEndian>, // 16..20
    pub target_transfer_tag: U32<BigEndian>, // 20..24
    reserved2: [u8; 4],                     // 24..28
    pub exp_stat_sn: U32<BigEndian>,        // 28..32
    reserved3: [u8; 4],                     // 32..36
    pub data_sn: U32<BigEndian>,            // 36..40
    pub buffer_offset: U32<BigEndian>,      // 40..44
    reserved4: [u8; 4],                     // 44..48
}

impl_bhs!(ScsiDataOut);

impl ScsiDataOut {
    pub fn new() -> Self {
        let mut header = Self::new_zeroed();
        header.opcode = RawBhsOpcode::new(Opcode::ScsiDataOut);
        header
    }

    pub fn flags(&self) -> DataOutFlags {
        DataOutFlags::from_bits_truncate(self.flags)
    }

    pub fn is_final(&self) -> bool {
        self.flags().contains(DataOutFlags::FINAL)
    }

    pub fn set_final(&mut self) {
        self.flags |= DataOutFlags::FINAL.bits();
    }
}

impl Default for ScsiDataOut {
    fn default() -> Self {
        Self::new()
    }
}
