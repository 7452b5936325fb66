// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::error::IscsiError;

/// Byte-stream transport underneath a session.
///
/// The session drives one connection at a time. Received bytes and
/// connection loss are reported back through
/// [`Session::deliver`](crate::client::session::Session::deliver) and
/// [`Session::closed`](crate::client::session::Session::closed).
pub trait Transport {
    /// Start connecting to `address:port`. Bytes delivered after this call
    /// belong to the new connection.
    fn open(&mut self, address: &str, port: u16) -> Result<(), IscsiError>;

    /// Queue bytes for sending. Never called with more than
    /// [`Transport::window`] bytes.
    fn deliver_raw(&mut self, data: &[u8]) -> Result<(), IscsiError>;

    /// Bytes the transport accepts right now.
    fn window(&self) -> usize;

    /// Tear the connection down. `None` is an orderly shutdown.
    fn close(&mut self, reason: Option<&IscsiError>);
}

/// Transport that records requests and buffers outbound bytes up to a fixed
/// capacity. An I/O driver (or a test) honours the requests and drains the
/// buffer.
#[derive(Debug)]
pub struct BufferedTransport {
    capacity: usize,
    outbound: BytesMut,
    pending_open: Option<(String, u16)>,
    close_requested: bool,
    opens: u32,
    closes: Vec<Option<IscsiError>>,
}

impl BufferedTransport {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            outbound: BytesMut::with_capacity(capacity),
            pending_open: None,
            close_requested: false,
            opens: 0,
            closes: Vec::new(),
        }
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    /// Everything queued since the last call.
    pub fn take_outbound(&mut self) -> Bytes {
        self.outbound.split().freeze()
    }

    pub fn has_outbound(&self) -> bool {
        !self.outbound.is_empty()
    }

    pub fn take_open_request(&mut self) -> Option<(String, u16)> {
        self.pending_open.take()
    }

    pub fn take_close_request(&mut self) -> bool {
        std::mem::take(&mut self.close_requested)
    }

    pub fn has_pending_requests(&self) -> bool {
        self.close_requested || self.pending_open.is_some()
    }

    /// Number of `open` calls so far.
    pub fn open_count(&self) -> u32 {
        self.opens
    }

    /// Reasons passed to every `close` call, oldest first.
    pub fn close_reasons(&self) -> &[Option<IscsiError>] {
        &self.closes
    }
}

impl Transport for BufferedTransport {
    fn open(&mut self, address: &str, port: u16) -> Result<(), IscsiError> {
        debug!(address, port, "transport open requested");
        self.outbound.clear();
        self.pending_open = Some((address.to_string(), port));
        self.opens += 1;
        Ok(())
    }

    fn deliver_raw(&mut self, data: &[u8]) -> Result<(), IscsiError> {
        if data.len() > self.window() {
            return Err(IscsiError::ConnectionReset(format!(
                "{} bytes exceed the transport window of {}",
                data.len(),
                self.window()
            )));
        }
        self.outbound.extend_from_slice(data);
        Ok(())
    }

    fn window(&self) -> usize {
        self.capacity.saturating_sub(self.outbound.len())
    }

    fn close(&mut self, reason: Option<&IscsiError>) {
        debug!(?reason, "transport close requested");
        self.outbound.clear();
        self.pending_open = None;
        self.close_requested = true;
        self.closes.push(reason.cloned());
    }
}
