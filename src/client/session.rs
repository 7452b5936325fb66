// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The session controller.
//!
//! A [`Session`] owns everything that survives a reconnect (identity,
//! credentials, ISID, TSIH, sequence numbers, the outstanding command) and
//! resets the connection-scoped part (RX/TX engines, login phase, CHAP
//! scratch, the login reassembly buffer) whenever the connection is torn
//! down. It performs no I/O of its own: bytes go out through a
//! [`Transport`] and come back in through [`Session::deliver`].

use std::net::SocketAddr;

use md5::{Digest, Md5};
use tracing::{debug, error, info, warn};

use crate::{
    cfg::config::AuthConfig,
    client::transport::Transport,
    control_block::command::{Completion, ScsiCommand},
    error::IscsiError,
    handlers::login_chap::{CHAP_CHALLENGE_LEN, ChapResponse},
    models::{
        common::BasicHeaderSegment,
        parse::Pdu,
        text::builder::{LoginStrings, OperationalParams},
    },
    state_machine::{
        login_states::SessionStatus,
        rx_states::{RxEngine, RxFragment, RxState},
        tx_states::{TxEngine, TxProgress},
    },
    utils::generate_isid,
};

/// Well-known iSCSI port.
pub const ISCSI_PORT: u16 = 3260;

/// Reconnect attempts after the first connection fails.
pub const ISCSI_MAX_RETRIES: u32 = 2;

/// Reserved ITT value, never assigned to a task.
const RESERVED_ITT: u32 = u32::MAX;

/// Everything needed to create a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub target_address: String,
    pub target_port: u16,
    pub target_iqn: String,
    pub initiator_iqn: String,
    pub lun: u64,
    pub auth: AuthConfig,
    pub operational: OperationalParams,
}

/// The R2T-solicited window currently being answered with Data-Out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transfer {
    pub ttt: u32,
    pub offset: usize,
    pub len: usize,
}

pub struct Session<T: Transport, D: Digest = Md5> {
    pub(crate) transport: T,
    pub(crate) target_address: String,
    pub(crate) target_port: u16,
    pub(crate) peer: Option<SocketAddr>,
    pub(crate) target_iqn: String,
    pub(crate) initiator_iqn: String,
    pub(crate) lun: u64,
    pub(crate) auth: AuthConfig,
    pub(crate) operational: OperationalParams,

    pub(crate) isid: [u8; 6],
    pub(crate) tsih: u16,
    pub(crate) itt: u32,
    pub(crate) cmd_sn: u32,
    pub(crate) stat_sn: u32,

    pub(crate) status: SessionStatus,
    pub(crate) retry_count: u32,
    pub(crate) instant_error: Option<IscsiError>,
    /// Bumped on every close so callbacks can notice a torn-down connection.
    generation: u64,

    pub(crate) chap: Option<ChapResponse<D>>,
    pub(crate) chap_challenge: Option<[u8; CHAP_CHALLENGE_LEN + 1]>,

    pub(crate) rx: RxEngine,
    pub(crate) tx: TxEngine,
    /// Login text reassembly, allocated on the first fragment.
    pub(crate) rx_buffer: Option<Vec<u8>>,

    pub(crate) command: Option<ScsiCommand>,
    pub(crate) transfer: Transfer,
    /// The outstanding command was issued while a PDU was still in flight
    /// and goes out once the TX engine is idle.
    pub(crate) start_pending: bool,
    pub(crate) completion: Option<Completion>,
}

impl<T: Transport, D: Digest> Session<T, D> {
    /// Create a closed session. Nothing is sent until the first
    /// [`Session::issue`].
    pub fn new(config: SessionConfig, transport: T) -> Result<Self, IscsiError> {
        config.auth.validate()?;
        let (isid, isid_hex) = generate_isid();
        debug!(isid = %isid_hex, target = %config.target_iqn, "session created");

        Ok(Self {
            transport,
            target_address: config.target_address,
            target_port: config.target_port,
            peer: None,
            target_iqn: config.target_iqn,
            initiator_iqn: config.initiator_iqn,
            lun: config.lun,
            auth: config.auth,
            operational: config.operational,
            isid,
            tsih: 0,
            itt: 0,
            cmd_sn: 0,
            stat_sn: 0,
            status: SessionStatus::default(),
            retry_count: 0,
            instant_error: None,
            generation: 0,
            chap: None,
            chap_challenge: None,
            rx: RxEngine::new(),
            tx: TxEngine::new(),
            rx_buffer: None,
            command: None,
            transfer: Transfer::default(),
            start_pending: false,
            completion: None,
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// The error that poisoned the session, if any.
    pub fn instant_error(&self) -> Option<&IscsiError> {
        self.instant_error.as_ref()
    }

    /// Current target address and port; changes on redirect.
    pub fn target(&self) -> (&str, u16) {
        (&self.target_address, self.target_port)
    }

    /// Resolved peer address reported by the transport.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn isid(&self) -> [u8; 6] {
        self.isid
    }

    pub fn tsih(&self) -> u16 {
        self.tsih
    }

    pub fn is_busy(&self) -> bool {
        self.command.is_some()
    }

    /// The finished command, once the session has completed it.
    pub fn take_completion(&mut self) -> Option<Completion> {
        self.completion.take()
    }

    /// Hand a command to the session. Opens the connection if needed. The
    /// outcome is reported through [`Session::take_completion`]; an `Err`
    /// here means the command was not accepted at all.
    pub fn issue(&mut self, command: ScsiCommand) -> Result<(), IscsiError> {
        if let Some(err) = &self.instant_error {
            debug!(errno = err.errno(), "session poisoned, refusing command");
            return Err(err.clone());
        }
        if command.is_bidirectional() {
            return Err(IscsiError::InvalidArgument(
                "bidirectional commands are not supported".to_string(),
            ));
        }
        if self.command.is_some() {
            return Err(IscsiError::InvalidArgument(
                "a command is already outstanding".to_string(),
            ));
        }

        self.command = Some(command);
        self.completion = None;

        let started = if self.status.is_full_feature() && !self.tx.is_idle() {
            debug!(state = ?self.tx.state(), "command waits for the TX engine");
            self.start_pending = true;
            Ok(())
        } else if self.status.is_full_feature() {
            self.start_command()
        } else if self.status.is_open() {
            debug!(phase = ?self.status.phase, "command waits for login to finish");
            Ok(())
        } else {
            self.open_connection()
        };

        if let Err(err) = started {
            self.close_connection(Some(&err));
            self.command = None;
            return Err(err);
        }
        Ok(())
    }

    /// Feed bytes received from the transport.
    pub fn deliver(&mut self, mut data: &[u8]) {
        if !self.status.is_open() {
            debug!(len = data.len(), "discarding bytes on a closed connection");
            return;
        }

        let generation = self.generation;
        while self.generation == generation {
            let fragment = match self.rx.receive(&mut data) {
                Ok(Some(fragment)) => fragment,
                Ok(None) => break,
                Err(err) => {
                    self.connection_failed(err);
                    break;
                },
            };
            if let Err(err) = self.rx_fragment(fragment) {
                self.connection_failed(err);
                break;
            }
        }
    }

    /// Push pending PDU bytes into the transport, as far as its window
    /// allows. Call whenever the window may have opened.
    pub fn step(&mut self) {
        let generation = self.generation;
        while self.generation == generation {
            match self.tx.step(&mut self.transport) {
                Ok(TxProgress::Done(header)) => {
                    if let Err(err) = self.tx_done(header) {
                        self.connection_failed(err);
                    }
                },
                Ok(TxProgress::Idle | TxProgress::Blocked) => break,
                Err(err) => {
                    self.connection_failed(err);
                    break;
                },
            }
        }
    }

    /// The transport lost the connection. A graceful close is an error too.
    pub fn closed(&mut self, reason: Option<IscsiError>) {
        if !self.status.is_open() {
            debug!(?reason, "close notification for a closed connection");
            return;
        }
        let err = reason.unwrap_or_else(|| {
            IscsiError::ConnectionReset("connection closed by target".to_string())
        });
        self.connection_failed(err);
    }

    /// The transport resolved the peer address.
    pub fn redirected(&mut self, peer: SocketAddr) {
        debug!(%peer, "peer address resolved");
        self.peer = Some(peer);
    }

    /// Close the connection and fail any outstanding command.
    pub fn shutdown(&mut self) {
        let err = IscsiError::ConnectionReset("session detached".to_string());
        if self.status.is_open() {
            self.close_connection(Some(&err));
        }
        self.scsi_done(Err(err));
    }

    pub(crate) fn next_itt(&mut self) -> u32 {
        self.itt = self.itt.wrapping_add(1);
        if self.itt == RESERVED_ITT {
            self.itt = 0;
        }
        self.itt
    }

    pub(crate) fn open_connection(&mut self) -> Result<(), IscsiError> {
        info!(
            address = %self.target_address,
            port = self.target_port,
            target = %self.target_iqn,
            "opening connection"
        );
        self.transport.open(&self.target_address, self.target_port)?;
        self.next_itt();
        self.status = SessionStatus::opened(self.auth.target_password.is_some());
        self.rx.reset();
        self.tx.reset();
        self.start_login()
    }

    pub(crate) fn close_connection(&mut self, reason: Option<&IscsiError>) {
        debug!(?reason, "closing connection");
        self.transport.close(reason);
        self.status = SessionStatus::default();
        self.rx.reset();
        self.tx.reset();
        self.rx_buffer = None;
        self.start_pending = false;
        self.chap = None;
        self.chap_challenge = None;
        self.generation = self.generation.wrapping_add(1);
    }

    fn connection_failed(&mut self, err: IscsiError) {
        warn!(errno = err.errno(), error = %err, "connection failed");
        self.close_connection(Some(&err));

        if err.is_instant() {
            error!(errno = err.errno(), "permanent failure, session disabled");
            self.instant_error = Some(err.clone());
        } else if err.is_retryable() {
            if self.command.is_none() {
                debug!("no outstanding command, staying closed");
                return;
            }
            self.retry_count += 1;
            if self.retry_count <= ISCSI_MAX_RETRIES {
                warn!(
                    retry = self.retry_count,
                    max = ISCSI_MAX_RETRIES,
                    "reconnecting"
                );
                if let Err(open_err) = self.open_connection() {
                    self.connection_failed(open_err);
                }
                return;
            }
            error!(retries = ISCSI_MAX_RETRIES, "retry limit reached, session disabled");
            self.instant_error = Some(err.clone());
        }

        self.scsi_done(Err(err));
    }

    /// Complete the outstanding command, if there is one.
    pub(crate) fn scsi_done(&mut self, result: Result<(), IscsiError>) {
        let Some(command) = self.command.take() else {
            return;
        };
        self.transfer = Transfer::default();
        self.start_pending = false;
        match &result {
            Ok(()) => debug!(
                status = command.status,
                residual = command.residual,
                "command complete"
            ),
            Err(err) => warn!(errno = err.errno(), error = %err, "command failed"),
        }
        self.completion = Some(Completion { command, result });
    }

    fn rx_fragment(&mut self, fragment: RxFragment<'_>) -> Result<(), IscsiError> {
        match fragment.state {
            RxState::Bhs if fragment.remaining == 0 => {
                self.record_sequence();
                Ok(())
            },
            RxState::Data => {
                self.rx_data(fragment.data, fragment.offset, fragment.remaining)
            },
            _ => Ok(()),
        }
    }

    /// Track StatSN / ExpCmdSN from a freshly received header.
    fn record_sequence(&mut self) {
        let header = self.rx.header();
        debug!(
            opcode = ?header.opcode(),
            itt = header.initiator_task_tag(),
            len = header.lengths().data_len(),
            "rx pdu"
        );
        let Some(seq) = header.status_sequence() else {
            return;
        };
        self.cmd_sn = seq.exp_cmd_sn;
        // StatSN is only valid on Data-In when the S bit is set.
        if !matches!(header, Pdu::ScsiDataIn(din) if !din.has_status()) {
            self.stat_sn = seq.stat_sn;
        }
    }

    fn rx_data(
        &mut self,
        data: &[u8],
        offset: usize,
        remaining: usize,
    ) -> Result<(), IscsiError> {
        match self.rx.header().clone() {
            Pdu::LoginResponse(rsp) => self.rx_login_response(&rsp, data, remaining),
            Pdu::ScsiCommandResponse(rsp) => {
                self.rx_scsi_response(&rsp, data, offset, remaining)
            },
            Pdu::ScsiDataIn(din) => self.rx_data_in(&din, data, offset, remaining),
            Pdu::ReadyToTransfer(r2t) => self.rx_r2t(&r2t, remaining),
            other => {
                if remaining > 0 {
                    return Ok(());
                }
                Err(IscsiError::NotSupported(format!(
                    "unsupported opcode {:?}",
                    other.opcode()
                )))
            },
        }
    }

    /// Per-op-code hook run once a PDU has been fully handed to the
    /// transport.
    fn tx_done(&mut self, header: Pdu) -> Result<(), IscsiError> {
        match header {
            Pdu::LoginRequest(_) => {
                self.status.strings = LoginStrings::empty();
                self.chap = None;
                Ok(())
            },
            Pdu::ScsiCommandRequest(_) => {
                self.cmd_sn = self.cmd_sn.wrapping_add(1);
                Ok(())
            },
            Pdu::ScsiDataOut(out) if !out.is_final() => {
                if self.command.is_none() || self.transfer.len == 0 {
                    debug!(
                        data_sn = out.data_sn.get(),
                        "write completed early, dropping the rest of the Data-Out sequence"
                    );
                    return self.start_deferred_command();
                }
                self.start_data_out(out.data_sn.get().wrapping_add(1))
            },
            _ => self.start_deferred_command(),
        }
    }

    fn start_deferred_command(&mut self) -> Result<(), IscsiError> {
        if !self.start_pending || !self.tx.is_idle() {
            return Ok(());
        }
        self.start_pending = false;
        self.start_command()
    }
}

impl<T: Transport, D: Digest> Drop for Session<T, D> {
    fn drop(&mut self) {
        if self.status.is_open() {
            self.shutdown();
        }
    }
}
