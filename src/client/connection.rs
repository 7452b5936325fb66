// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! tokio driver: runs a [`Session`] over a real TCP socket.
//!
//! The session talks to a [`BufferedTransport`]; this driver honours the
//! open/close requests recorded there, flushes the outbound buffer to the
//! socket and feeds whatever the socket returns back into the session.

use std::time::Duration;

use anyhow::{Result, bail};
use md5::Digest;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    cfg::config::RuntimeConfig,
    client::{
        common::{IoAbort, io_with_timeout},
        session::Session,
        transport::BufferedTransport,
    },
    control_block::command::{Completion, ScsiCommand},
    error::IscsiError,
};

const READ_CHUNK: usize = 64 * 1024;

/// Socket side of a session. Survives across commands; the TCP stream is
/// replaced whenever the session reconnects.
#[derive(Debug)]
pub struct Connection {
    stream: Option<TcpStream>,
    read_buf: Vec<u8>,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl Connection {
    pub fn new(runtime: &RuntimeConfig) -> Self {
        Self {
            stream: None,
            read_buf: vec![0u8; READ_CHUNK],
            connect_timeout: runtime.timeout_connection,
            io_timeout: runtime.timeout_io,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Issue `command` on `session` and drive the socket until it completes.
    ///
    /// Engine failures come back inside the [`Completion`]. An `Err` means
    /// the command was refused up front or `cancel` fired.
    pub async fn execute<D: Digest>(
        &mut self,
        session: &mut Session<BufferedTransport, D>,
        command: ScsiCommand,
        cancel: &CancellationToken,
    ) -> Result<Completion> {
        session.issue(command)?;

        loop {
            if let Some(done) = session.take_completion() {
                // Reconnect requests left behind by a failed command are
                // served by the next execute.
                if session.transport_mut().take_close_request() {
                    self.drop_stream().await;
                }
                return Ok(done);
            }
            if self.service_requests(session, cancel).await? {
                continue;
            }

            session.step();
            if session.transport().has_outbound() {
                self.flush(session, cancel).await?;
                continue;
            }

            self.receive(session, cancel).await?;
        }
    }

    async fn drop_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            debug!("closing socket");
            let _ = stream.shutdown().await;
        }
    }

    /// Carry out close/open requests. Returns whether anything was done.
    async fn service_requests<D: Digest>(
        &mut self,
        session: &mut Session<BufferedTransport, D>,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if !session.transport().has_pending_requests() {
            return Ok(false);
        }
        let mut acted = false;
        if session.transport_mut().take_close_request() {
            self.drop_stream().await;
            acted = true;
        }

        let Some((address, port)) = session.transport_mut().take_open_request() else {
            return Ok(acted);
        };
        let connect = io_with_timeout(
            "connect",
            TcpStream::connect((address.as_str(), port)),
            self.connect_timeout,
            cancel,
        )
        .await;

        match connect {
            Ok(stream) => {
                info!(%address, port, "connected");
                if let Ok(peer) = stream.peer_addr() {
                    session.redirected(peer);
                }
                self.stream = Some(stream);
            },
            Err(e) => self.io_failed(session, e)?,
        }
        Ok(true)
    }

    async fn flush<D: Digest>(
        &mut self,
        session: &mut Session<BufferedTransport, D>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let bytes = session.transport_mut().take_outbound();
        let Some(stream) = self.stream.as_mut() else {
            session.closed(Some(IscsiError::ConnectionReset(
                "no socket to write to".to_string(),
            )));
            return Ok(());
        };

        let res = io_with_timeout("write", stream.write_all(&bytes), self.io_timeout, cancel)
            .await;
        match res {
            Ok(()) => {
                debug!(len = bytes.len(), "flushed");
                Ok(())
            },
            Err(e) => self.io_failed(session, e),
        }
    }

    async fn receive<D: Digest>(
        &mut self,
        session: &mut Session<BufferedTransport, D>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            bail!("connection lost and the session gave up without a completion");
        };

        let res = io_with_timeout(
            "read",
            stream.read(&mut self.read_buf),
            self.io_timeout,
            cancel,
        )
        .await;
        match res {
            Ok(0) => {
                debug!("peer closed the socket");
                self.stream = None;
                session.closed(None);
                Ok(())
            },
            Ok(n) => {
                session.deliver(&self.read_buf[..n]);
                Ok(())
            },
            Err(e) => self.io_failed(session, e),
        }
    }

    /// A socket operation failed: report it to the session, which decides
    /// whether to reconnect. Cancellation detaches the session instead.
    fn io_failed<D: Digest>(
        &mut self,
        session: &mut Session<BufferedTransport, D>,
        e: IoAbort,
    ) -> Result<()> {
        self.stream = None;
        if e.is_cancelled() {
            info!("{e}, detaching session");
            session.shutdown();
            return Err(e.into());
        }
        warn!(error = %e, "socket failure");
        session.closed(Some(IscsiError::ConnectionReset(e.to_string())));
        Ok(())
    }
}
