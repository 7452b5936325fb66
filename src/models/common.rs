// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use enum_dispatch::enum_dispatch;
use zerocopy::{BigEndian, FromBytes, Immutable, IntoBytes, KnownLayout, U32};

use crate::models::opcode::RawBhsOpcode;

/// Every Basic Header Segment is exactly 48 bytes.
pub const HEADER_LEN: usize = 48;

/// Largest value the 24-bit DataSegmentLength field can carry.
pub const MAX_DATA_SEGMENT_LEN: u32 = 0x00FF_FFFF;

/// Number of zero bytes that follow `len` bytes to reach a 4-byte boundary.
#[inline]
pub const fn pad_len(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// The BHS word holding TotalAHSLength (high octet, in 4-byte words) and
/// DataSegmentLength (low 24 bits, in bytes).
#[repr(transparent)]
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    FromBytes,
    IntoBytes,
    KnownLayout,
    Immutable,
)]
pub struct SegmentLengths(U32<BigEndian>);

impl SegmentLengths {
    pub fn new(ahs_words: u8, data_len: u32) -> Self {
        let mut lengths = Self::default();
        lengths.set(ahs_words, data_len);
        lengths
    }

    #[inline]
    pub fn set(&mut self, ahs_words: u8, data_len: u32) {
        self.0
            .set((u32::from(ahs_words) << 24) | (data_len & MAX_DATA_SEGMENT_LEN));
    }

    /// AHS length in bytes.
    #[inline]
    pub fn ahs_len(&self) -> usize {
        ((self.0.get() >> 24) as usize) * 4
    }

    #[inline]
    pub fn data_len(&self) -> usize {
        (self.0.get() & MAX_DATA_SEGMENT_LEN) as usize
    }

    #[inline]
    pub fn pad_len(&self) -> usize {
        pad_len(self.data_len())
    }
}

/// StatSN / ExpCmdSN pair carried by every target response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSequence {
    pub stat_sn: u32,
    pub exp_cmd_sn: u32,
}

/// Fields shared by every BHS layout.
#[enum_dispatch]
pub trait BasicHeaderSegment {
    fn opcode(&self) -> RawBhsOpcode;

    fn lengths(&self) -> SegmentLengths;

    fn set_lengths(&mut self, ahs_words: u8, data_len: u32);

    fn initiator_task_tag(&self) -> u32;

    /// The 48 wire bytes of this header.
    fn bhs_bytes(&self) -> &[u8];

    /// `Some` for target-to-initiator PDUs.
    fn status_sequence(&self) -> Option<StatusSequence> {
        None
    }
}

/// Implements [`BasicHeaderSegment`] for a zerocopy header struct that names
/// its fields `opcode`, `lengths` and `initiator_task_tag` (plus `stat_sn`
/// and `exp_cmd_sn` for the `status` form). Also pins the struct size to
/// [`HEADER_LEN`] at compile time.
macro_rules! impl_bhs {
    ($ty:ty) => {
        const _: () = assert!(::core::mem::size_of::<$ty>() == $crate::models::common::HEADER_LEN);

        impl $crate::models::common::BasicHeaderSegment for $ty {
            $crate::models::common::impl_bhs!(@fields);
        }
    };
    ($ty:ty, status) => {
        const _: () = assert!(::core::mem::size_of::<$ty>() == $crate::models::common::HEADER_LEN);

        impl $crate::models::common::BasicHeaderSegment for $ty {
            $crate::models::common::impl_bhs!(@fields);

            fn status_sequence(&self) -> Option<$crate::models::common::StatusSequence> {
                Some($crate::models::common::StatusSequence {
                    stat_sn: self.stat_sn.get(),
                    exp_cmd_sn: self.exp_cmd_sn.get(),
                })
            }
        }
    };
    (@fields) => {
        fn opcode(&self) -> $crate::models::opcode::RawBhsOpcode {
            self.opcode
        }

        fn lengths(&self) -> $crate::models::common::SegmentLengths {
            self.lengths
        }

        fn set_lengths(&mut self, ahs_words: u8, data_len: u32) {
            self.lengths.set(ahs_words, data_len);
        }

        fn initiator_task_tag(&self) -> u32 {
            self.initiator_task_tag.get()
        }

        fn bhs_bytes(&self) -> &[u8] {
            ::zerocopy::IntoBytes::as_bytes(self)
        }
    };
}

pub(crate) use impl_bhs;
