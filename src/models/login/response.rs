// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use zerocopy::{
    BigEndian, FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, U16, U32,
};

use crate::models::{
    common::{SegmentLengths, impl_bhs},
    login::{
        common::{RawLoginFlags, Stage},
        status::StatusClass,
    },
    opcode::{Opcode, RawBhsOpcode},
};

/// BHS of a Login Response PDU (opcode `0x23`).
#[repr(C)]
#[derive(Debug, Clone, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct LoginResponse {
    pub opcode: RawBhsOpcode,               // 0
    pub flags: RawLoginFlags,               // 1
    pub version_max: u8,                    // 2
    pub version_active: u8,                 // 3
    pub lengths: SegmentLengths,            // 4..8
    pub isid: [u8; 6],                      // 8..14
    pub tsih: U16<BigEndian>,               // 14..16
    pub initiator_task_tag: U32<BigEndian>, // 16..20
    reserved1: [u8; 4],                     // 20..24
    pub stat_sn: U32<BigEndian>,            // 24..28
    pub exp_cmd_sn: U32<BigEndian>,         // 28..32
    pub max_cmd_sn: U32<BigEndian>,         // 32..36
    pub status_class: u8,                   // 36
    pub status_detail: u8,                  // 37
    reserved2: [u8; 10],                    // 38..48
}

impl_bhs!(LoginResponse, status);

impl LoginResponse {
    /// Blank response header, handy for tests and loopback targets.
    pub fn new(itt: u32) -> Self {
        let mut header = Self::new_zeroed();
        header.opcode = RawBhsOpcode::new(Opcode::LoginResp);
        header.initiator_task_tag.set(itt);
        header
    }

    pub fn class(&self) -> StatusClass {
        StatusClass::from(self.status_class)
    }

    /// Mark the response as moving to `nsg`.
    pub fn set_transit(&mut self, csg: Stage, nsg: Stage) {
        self.flags.set_transit(true);
        self.flags.set_csg(csg);
        self.flags.set_nsg(nsg);
    }
}
