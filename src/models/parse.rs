// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use enum_dispatch::enum_dispatch;
use zerocopy::{BigEndian, FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, U32};

use crate::{
    error::IscsiError,
    models::{
        command::{request::ScsiCommandRequest, response::ScsiCommandResponse},
        common::{BasicHeaderSegment, HEADER_LEN, SegmentLengths, StatusSequence, impl_bhs},
        data::{request::ScsiDataOut, response::ScsiDataIn},
        login::{request::LoginRequest, response::LoginResponse},
        opcode::{Opcode, RawBhsOpcode},
        ready_2_transfer::response::ReadyToTransfer,
    },
};

/// Layout shared by all target responses; used for op-codes the engine does
/// not model.
#[repr(C)]
#[derive(Debug, Clone, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct BhsCommon {
    pub opcode: RawBhsOpcode,               // 0
    pub flags: u8,                          // 1
    opcode_specific1: [u8; 2],              // 2..4
    pub lengths: SegmentLengths,            // 4..8
    opcode_specific2: [u8; 8],              // 8..16
    pub initiator_task_tag: U32<BigEndian>, // 16..20
    opcode_specific3: [u8; 4],              // 20..24
    pub stat_sn: U32<BigEndian>,            // 24..28
    pub exp_cmd_sn: U32<BigEndian>,         // 28..32
    opcode_specific4: [u8; 16],             // 32..48
}

impl_bhs!(BhsCommon, status);

/// One decoded Basic Header Segment.
#[enum_dispatch(BasicHeaderSegment)]
#[derive(Debug, Clone, PartialEq)]
pub enum Pdu {
    LoginRequest(LoginRequest),
    LoginResponse(LoginResponse),
    ScsiCommandRequest(ScsiCommandRequest),
    ScsiCommandResponse(ScsiCommandResponse),
    ScsiDataOut(ScsiDataOut),
    ScsiDataIn(ScsiDataIn),
    ReadyToTransfer(ReadyToTransfer),
    Other(BhsCommon),
}

impl Default for Pdu {
    fn default() -> Self {
        Pdu::Other(BhsCommon::new_zeroed())
    }
}

fn read_bhs<T: FromBytes>(bytes: &[u8]) -> Result<T, IscsiError> {
    T::read_from_bytes(bytes).map_err(|_| {
        IscsiError::Protocol(format!(
            "BHS must be {HEADER_LEN} bytes, got {}",
            bytes.len()
        ))
    })
}

impl Pdu {
    /// Decode a complete 48-byte BHS, choosing the layout by op-code.
    pub fn from_bhs_bytes(bytes: &[u8]) -> Result<Self, IscsiError> {
        let op = bytes
            .first()
            .map(|b| RawBhsOpcode::from_raw(*b))
            .ok_or_else(|| IscsiError::Protocol("empty BHS".to_string()))?;
        Ok(match op.opcode_known() {
            Some(Opcode::LoginReq) => Pdu::LoginRequest(read_bhs(bytes)?),
            Some(Opcode::LoginResp) => Pdu::LoginResponse(read_bhs(bytes)?),
            Some(Opcode::ScsiCommandReq) => Pdu::ScsiCommandRequest(read_bhs(bytes)?),
            Some(Opcode::ScsiCommandResp) => Pdu::ScsiCommandResponse(read_bhs(bytes)?),
            Some(Opcode::ScsiDataOut) => Pdu::ScsiDataOut(read_bhs(bytes)?),
            Some(Opcode::ScsiDataIn) => Pdu::ScsiDataIn(read_bhs(bytes)?),
            Some(Opcode::ReadyToTransfer) => Pdu::ReadyToTransfer(read_bhs(bytes)?),
            _ => Pdu::Other(read_bhs(bytes)?),
        })
    }

    pub fn known_opcode(&self) -> Option<Opcode> {
        self.opcode().opcode_known()
    }
}
