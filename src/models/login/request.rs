// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use zerocopy::{
    BigEndian, FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, U16, U32,
};

use crate::models::{
    common::{SegmentLengths, impl_bhs},
    login::common::{RawLoginFlags, Stage},
    opcode::{Opcode, RawBhsOpcode},
};

/// BHS of a Login Request PDU (opcode `0x03`, always immediate).
#[repr(C)]
#[derive(Debug, Clone, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct LoginRequest {
    pub opcode: RawBhsOpcode,               // 0
    pub flags: RawLoginFlags,               // 1
    pub version_max: u8,                    // 2
    pub version_min: u8,                    // 3
    pub lengths: SegmentLengths,            // 4..8
    pub isid: [u8; 6],                      // 8..14
    pub tsih: U16<BigEndian>,               // 14..16
    pub initiator_task_tag: U32<BigEndian>, // 16..20
    pub cid: U16<BigEndian>,                // 20..22
    reserved1: [u8; 2],                     // 22..24
    pub cmd_sn: U32<BigEndian>,             // 24..28
    pub exp_stat_sn: U32<BigEndian>,        // 28..32
    reserved2: [u8; 16],                    // 32..48
}

impl_bhs!(LoginRequest);

/// Builder for Login Request headers.
#[derive(Debug)]
pub struct LoginRequestBuilder {
    pub header: LoginRequest,
}

impl Default for LoginRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginRequestBuilder {
    pub fn new() -> Self {
        let mut header = LoginRequest::new_zeroed();
        header.opcode = RawBhsOpcode::immediate(Opcode::LoginReq);
        Self { header }
    }

    /// Set TRANSIT together with the current and next stage.
    pub fn transit(mut self, csg: Stage, nsg: Stage) -> Self {
        self.header.flags.set_transit(true);
        self.header.flags.set_csg(csg);
        self.header.flags.set_nsg(nsg);
        self
    }

    pub fn isid(mut self, isid: [u8; 6]) -> Self {
        self.header.isid = isid;
        self
    }

    pub fn tsih(mut self, tsih: u16) -> Self {
        self.header.tsih.set(tsih);
        self
    }

    pub fn initiator_task_tag(mut self, itt: u32) -> Self {
        self.header.initiator_task_tag.set(itt);
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

    pub fn data_len(mut self, len: u32) -> Self {
        self.header.lengths.set(0, len);
        self
    }

    pub fn build(self) -> LoginRequest {
        self.header
    }
}
