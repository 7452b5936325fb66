// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

bitflags::bitflags! {
    /// Byte 1 of a SCSI Command PDU.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct ScsiCommandRequestFlags: u8 {
        const FINAL     = 0x80;
        const READ      = 0x40;
        const WRITE     = 0x20;
        /// Task attribute (bits 2..0)
        const ATTR_MASK = 0b0000_0111;
    }
}

bitflags::bitflags! {
    /// Byte 1 of a SCSI Response PDU.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct ScsiCommandResponseFlags: u8 {
        const FINAL = 0x80;
        /// Bidirectional read residual overflow
        const O_SMALL = 0x10;
        /// Bidirectional read residual underflow
        const U_SMALL = 0x08;
        /// Residual overflow
        const O_BIG = 0x04;
        /// Residual underflow
        const U_BIG = 0x02;
    }
}

/// SAM task attribute carried in the low three flag bits.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TaskAttribute {
    Untagged = 0,
    #[default]
    Simple = 1,
    Ordered = 2,
    HeadOfQueue = 3,
    Aca = 4,
}

/// iSCSI Response field of a SCSI Response PDU.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    CommandCompleted = 0x00,
    TargetFailure = 0x01,
}

/// SCSI status byte values the engine reports as-is.
pub mod scsi_status {
    pub const GOOD: u8 = 0x00;
    pub const CHECK_CONDITION: u8 = 0x02;
    pub const BUSY: u8 = 0x08;
}

/// Offset of the sense response code within a SCSI Response data segment
/// (after the two-byte SenseLength).
pub const SENSE_RESPONSE_CODE_OFFSET: usize = 2;

/// Residual as a signed count: positive for underflow, negative for overflow.
pub fn signed_residual(under: bool, over: bool, count: u32) -> i64 {
    if under {
        i64::from(count)
    } else if over {
        -i64::from(count)
    } else {
        0
    }
}
