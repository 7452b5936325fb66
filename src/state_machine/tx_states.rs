// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Transmit side: emits one PDU at a time, resumable at any byte offset.
//!
//! ```text
//! IDLE -> BHS -> AHS -> DATA -> DATA_PADDING -> IDLE
//! ```
//!
//! Each step sends as much of the current segment as the transport window
//! allows. Empty segments are passed through without consulting the
//! window. Reaching IDLE hands the finished header back so the session can
//! run the per-op-code completion hook.

use bytes::Bytes;
use tracing::trace;

use crate::{
    client::transport::Transport,
    error::IscsiError,
    models::{
        common::{BasicHeaderSegment, pad_len},
        parse::Pdu,
    },
};

const PADDING: [u8; 3] = [0u8; 3];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    #[default]
    Idle,
    Bhs,
    Ahs,
    Data,
    DataPadding,
}

impl TxState {
    fn next(self) -> Self {
        match self {
            TxState::Idle => TxState::Idle,
            TxState::Bhs => TxState::Ahs,
            TxState::Ahs => TxState::Data,
            TxState::Data => TxState::DataPadding,
            TxState::DataPadding => TxState::Idle,
        }
    }
}

/// Where the data segment of the PDU in flight comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TxPayload {
    #[default]
    Empty,
    /// Bytes owned by the engine (login text).
    Owned(Vec<u8>),
    /// A slice of the outstanding command's write buffer. Shares the
    /// allocation, so it stays valid if the command completes first.
    DataOut(Bytes),
}

impl TxPayload {
    pub fn len(&self) -> usize {
        match self {
            TxPayload::Empty => 0,
            TxPayload::Owned(bytes) => bytes.len(),
            TxPayload::DataOut(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, PartialEq)]
pub enum TxProgress {
    /// Nothing to send.
    Idle,
    /// The transport window is closed; call again once it opens.
    Blocked,
    /// The last byte of this PDU has been handed to the transport.
    Done(Pdu),
}

#[derive(Debug, Default)]
pub struct TxEngine {
    state: TxState,
    offset: usize,
    header: Pdu,
    payload: TxPayload,
}

impl TxEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == TxState::Idle
    }

    /// Begin transmitting `header` followed by `payload`. The header's
    /// DataSegmentLength is set from the payload.
    ///
    /// # Panics
    ///
    /// Only one PDU may be in flight; starting another before the engine is
    /// idle is a programming error.
    pub fn start(&mut self, mut header: Pdu, payload: TxPayload) {
        assert!(
            self.is_idle(),
            "TX engine busy in {:?}, refusing to start a new PDU",
            self.state
        );
        header.set_lengths(0, payload.len() as u32);
        trace!(opcode = ?header.opcode(), len = payload.len(), "tx start");
        self.header = header;
        self.payload = payload;
        self.state = TxState::Bhs;
        self.offset = 0;
    }

    /// Drop the PDU in flight, if any.
    pub fn reset(&mut self) {
        self.state = TxState::Idle;
        self.offset = 0;
        self.payload = TxPayload::Empty;
    }

    fn segment(&self) -> &[u8] {
        match self.state {
            TxState::Idle | TxState::Ahs => &[],
            TxState::Bhs => self.header.bhs_bytes(),
            TxState::Data => match &self.payload {
                TxPayload::Empty => &[],
                TxPayload::Owned(bytes) => bytes,
                TxPayload::DataOut(bytes) => bytes,
            },
            TxState::DataPadding => &PADDING[..pad_len(self.payload.len())],
        }
    }

    /// Push as much as the transport accepts.
    pub fn step<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<TxProgress, IscsiError> {
        loop {
            if self.is_idle() {
                return Ok(TxProgress::Idle);
            }

            let (seg_len, sent) = {
                let segment = self.segment();
                let wanted = segment.len() - self.offset;
                if wanted == 0 {
                    (segment.len(), 0)
                } else {
                    let window = transport.window();
                    if window == 0 {
                        return Ok(TxProgress::Blocked);
                    }
                    let take = wanted.min(window);
                    transport.deliver_raw(&segment[self.offset..self.offset + take])?;
                    (segment.len(), take)
                }
            };

            self.offset += sent;
            if self.offset < seg_len {
                continue;
            }

            self.state = self.state.next();
            self.offset = 0;
            if self.is_idle() {
                self.payload = TxPayload::Empty;
                return Ok(TxProgress::Done(std::mem::take(&mut self.header)));
            }
        }
    }
}
