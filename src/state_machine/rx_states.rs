// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Receive side: reassembles PDUs from an arbitrarily fragmented byte
//! stream.
//!
//! ```text
//! BHS (48) -> AHS (4 * TotalAHSLength) -> DATA (DataSegmentLength)
//!     -> DATA_PADDING (0..=3) -> BHS ...
//! ```
//!
//! The BHS is buffered so the decoded header stays available while the data
//! segment streams past. AHS and padding are discarded. Data is handed out
//! in the fragments it arrived in, with the offset and the bytes still
//! outstanding, so a consumer can act on the final fragment.

use crate::{
    error::IscsiError,
    models::{
        common::{BasicHeaderSegment, HEADER_LEN},
        parse::Pdu,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    Bhs,
    Ahs,
    Data,
    DataPadding,
}

impl RxState {
    fn next(self) -> Self {
        match self {
            RxState::Bhs => RxState::Ahs,
            RxState::Ahs => RxState::Data,
            RxState::Data => RxState::DataPadding,
            RxState::DataPadding => RxState::Bhs,
        }
    }
}

/// A slice of the segment belonging to `state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxFragment<'a> {
    pub state: RxState,
    pub data: &'a [u8],
    /// Offset of `data` within its segment.
    pub offset: usize,
    /// Bytes of the segment still to come after `data`.
    pub remaining: usize,
}

#[derive(Debug)]
pub struct RxEngine {
    state: RxState,
    offset: usize,
    bhs: [u8; HEADER_LEN],
    header: Pdu,
}

impl Default for RxEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RxEngine {
    pub fn new() -> Self {
        Self {
            state: RxState::Bhs,
            offset: 0,
            bhs: [0u8; HEADER_LEN],
            header: Pdu::default(),
        }
    }

    /// Forget any partially received PDU.
    pub fn reset(&mut self) {
        self.state = RxState::Bhs;
        self.offset = 0;
    }

    pub fn state(&self) -> RxState {
        self.state
    }

    /// Most recently completed BHS.
    pub fn header(&self) -> &Pdu {
        &self.header
    }

    fn segment_len(&self) -> usize {
        let lengths = self.header.lengths();
        match self.state {
            RxState::Bhs => HEADER_LEN,
            RxState::Ahs => lengths.ahs_len(),
            RxState::Data => lengths.data_len(),
            RxState::DataPadding => lengths.pad_len(),
        }
    }

    /// Consume the next fragment from the front of `input`.
    ///
    /// Returns `Ok(None)` once `input` is exhausted and the current segment
    /// still needs bytes. A zero-length segment yields one empty fragment
    /// with `remaining == 0`, so every PDU produces at least one DATA
    /// fragment.
    pub fn receive<'a>(
        &mut self,
        input: &mut &'a [u8],
    ) -> Result<Option<RxFragment<'a>>, IscsiError> {
        let len = self.segment_len();
        let wanted = len - self.offset;
        if wanted > 0 && input.is_empty() {
            return Ok(None);
        }

        let (chunk, rest) = input.split_at(wanted.min(input.len()));
        *input = rest;

        let state = self.state;
        let offset = self.offset;
        if state == RxState::Bhs {
            self.bhs[offset..offset + chunk.len()].copy_from_slice(chunk);
        }
        self.offset += chunk.len();

        let remaining = len - self.offset;
        if remaining == 0 {
            if state == RxState::Bhs {
                self.header = Pdu::from_bhs_bytes(&self.bhs)?;
            }
            self.state = state.next();
            self.offset = 0;
        }

        Ok(Some(RxFragment {
            state,
            data: chunk,
            offset,
            remaining,
        }))
    }
}
