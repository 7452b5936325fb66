// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use zerocopy::{
    BigEndian, FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, U32, U64,
};

use crate::models::{
    command::common::{ScsiCommandRequestFlags, TaskAttribute},
    common::{SegmentLengths, impl_bhs},
    opcode::{Opcode, RawBhsOpcode},
};

/// BHS of a SCSI Command PDU (opcode `0x01`).
#[repr(C)]
#[derive(Debug, Clone, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ScsiCommandRequest {
    pub opcode: RawBhsOpcode,                          // 0
    pub flags: u8,                                     // 1
    reserved1: [u8; 2],                                // 2..4
    pub lengths: SegmentLengths,                       // 4..8
    pub lun: U64<BigEndian>,                           // 8..16
    pub initiator_task_tag: U32<BigEndian>,            // 16..20
    pub expected_data_transfer_length: U32<BigEndian>, // 20..24
    pub cmd_sn: U32<BigEndian>,                        // 24..28
    pub exp_stat_sn: U32<BigEndian>,                   // 28..32
    pub scsi_descriptor_block: [u8; 16],               // 32..48
}

impl_bhs!(ScsiCommandRequest);

impl ScsiCommandRequest {
    pub fn flags(&self) -> ScsiCommandRequestFlags {
        ScsiCommandRequestFlags::from_bits_truncate(self.flags)
    }
}

/// Builder for SCSI Command headers.
///
/// The 16-byte CDB is copied verbatim; shorter CDBs are zero padded by the
/// caller. `expected_data_transfer_length` is the size of the single data
/// buffer attached to the command, in whichever direction it flows.
#[derive(Debug)]
pub struct ScsiCommandRequestBuilder {
    pub header: ScsiCommandRequest,
}

impl Default for ScsiCommandRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScsiCommandRequestBuilder {
    /// Final, task attribute SIMPLE.
    pub fn new() -> Self {
        let mut header = ScsiCommandRequest::new_zeroed();
        header.opcode = RawBhsOpcode::new(Opcode::ScsiCommandReq);
        header.flags = ScsiCommandRequestFlags::FINAL.bits();
        Self { header }.task_attribute(TaskAttribute::Simple)
    }

    pub fn read(mut self) -> Self {
        self.header.flags |= ScsiCommandRequestFlags::READ.bits();
        self
    }

    pub fn write(mut self) -> Self {
        self.header.flags |= ScsiCommandRequestFlags::WRITE.bits();
        self
    }

    pub fn task_attribute(mut self, attr: TaskAttribute) -> Self {
        let mask = ScsiCommandRequestFlags::ATTR_MASK.bits();
        self.header.flags = (self.header.flags & !mask) | (attr as u8 & mask);
        self
    }

    pub fn lun(mut self, lun: u64) -> Self {
        self.header.lun.set(lun);
        self
    }

    pub fn initiator_task_tag(mut self, tag: u32) -> Self {
        self.header.initiator_task_tag.set(tag);
        self
    }

    pub fn expected_data_transfer_length(mut self, len: u32) -> Self {
        self.header.expected_data_transfer_length.set(len);
        self
    }

    pub fn cmd_sn(mut self, sn: u32) -> Self {
        self.header.cmd_sn.set(sn);
        self
    }

    pub fn exp_stat_sn(mut self, sn: u32) -> Self {
        self.header.exp_stat_sn.set(sn);
        self
    }

    pub fn scsi_descriptor_block(mut self, cdb: &[u8; 16]) -> Self {
        self.header.scsi_descriptor_block = *cdb;
        self
    }

    pub fn build(self) -> ScsiCommandRequest {
        self.header
    }
}
