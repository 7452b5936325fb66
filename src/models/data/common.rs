// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

bitflags::bitflags! {
    /// Byte 1 of a SCSI Data-Out PDU.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct DataOutFlags: u8 {
        /// last Data-Out PDU of the R2T sequence
        const FINAL = 0x80;
    }
}

bitflags::bitflags! {
    /// Byte 1 of a SCSI Data-In PDU.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct DataInFlags: u8 {
        const FINAL = 0x80;
        /// Acknowledge requested
        const A = 0x40;
        /// Residual overflow
        const O = 0x04;
        /// Residual underflow
        const U = 0x02;
        /// Status is present in this PDU
        const S = 0x01;
    }
}
