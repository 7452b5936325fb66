// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The first octet of every Basic Header Segment.
//!
//! ```text
//!  7   6   5   4   3   2   1   0
//! +---+---+-----------------------+
//! | . | I |    OPCODE (6 bits)    |
//! +---+---+-----------------------+
//! ```

use core::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

const OPCODE_MASK: u8 = 0b0011_1111;
const IMMEDIATE_MASK: u8 = 0b0100_0000;

/// Op-codes this initiator sends or understands (RFC 3720 § 10.2.1.2).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    NopOut = 0x00,
    ScsiCommandReq = 0x01,
    LoginReq = 0x03,
    TextReq = 0x04,
    ScsiDataOut = 0x05,
    LogoutReq = 0x06,
    NopIn = 0x20,
    ScsiCommandResp = 0x21,
    LoginResp = 0x23,
    TextResp = 0x24,
    ScsiDataIn = 0x25,
    LogoutResp = 0x26,
    ReadyToTransfer = 0x31,
    Reject = 0x3F,
}

impl Opcode {
    #[inline]
    pub fn from_u6(v: u8) -> Option<Self> {
        Some(match v & OPCODE_MASK {
            0x00 => Self::NopOut,
            0x01 => Self::ScsiCommandReq,
            0x03 => Self::LoginReq,
            0x04 => Self::TextReq,
            0x05 => Self::ScsiDataOut,
            0x06 => Self::LogoutReq,
            0x20 => Self::NopIn,
            0x21 => Self::ScsiCommandResp,
            0x23 => Self::LoginResp,
            0x24 => Self::TextResp,
            0x25 => Self::ScsiDataIn,
            0x26 => Self::LogoutResp,
            0x31 => Self::ReadyToTransfer,
            0x3F => Self::Reject,
            _ => return None,
        })
    }

    /// Target-to-initiator op-codes all have bit 5 set.
    #[inline]
    pub const fn is_response(self) -> bool {
        (self as u8) & 0x20 != 0
    }
}

/// Wire-safe first BHS octet, transparent over `u8` so it can live inside a
/// zerocopy header struct.
#[repr(transparent)]
#[derive(
    Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable,
)]
pub struct RawBhsOpcode(u8);

impl RawBhsOpcode {
    /// Opcode byte with the immediate bit clear.
    #[inline]
    pub const fn new(op: Opcode) -> Self {
        Self(op as u8)
    }

    /// Opcode byte with the immediate bit set.
    #[inline]
    pub const fn immediate(op: Opcode) -> Self {
        Self(op as u8 | IMMEDIATE_MASK)
    }

    #[inline]
    pub const fn raw(&self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn from_raw(v: u8) -> Self {
        Self(v)
    }

    #[inline]
    pub const fn i(&self) -> bool {
        (self.0 & IMMEDIATE_MASK) != 0
    }

    #[inline]
    pub fn set_i(&mut self) {
        self.0 |= IMMEDIATE_MASK
    }

    #[inline]
    pub const fn opcode_raw(&self) -> u8 {
        self.0 & OPCODE_MASK
    }

    #[inline]
    pub fn opcode_known(&self) -> Option<Opcode> {
        Opcode::from_u6(self.opcode_raw())
    }
}

impl fmt::Debug for RawBhsOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tmp = f.debug_struct("RawBhsOpcode");
        if self.i() {
            tmp.field("I", &true);
        }
        match self.opcode_known() {
            Some(op) => tmp.field("opcode", &op),
            None => {
                tmp.field("opcode_raw", &format_args!("0x{:02X}", self.opcode_raw()))
            },
        }
        .finish()
    }
}
