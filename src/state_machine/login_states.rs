// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Connection status of a session: the login phase, the key groups still to
//! be sent, and the authentication requirements.

use md5::Digest;
use tracing::{debug, info};

use crate::{
    client::{session::Session, transport::Transport},
    error::IscsiError,
    handlers::login_chap::ChapResponse,
    models::{
        login::{
            common::Stage,
            request::LoginRequestBuilder,
            response::LoginResponse,
            status::{StatusClass, status_to_error},
        },
        parse::Pdu,
        text::{
            builder::{LoginIdentity, LoginStrings, build_login_strings},
            parser::handle_text_keys,
        },
    },
    state_machine::tx_states::TxPayload,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LoginPhase {
    /// No connection.
    #[default]
    Closed,
    /// CSG=Security, NSG=Operational
    SecurityNegotiation,
    /// CSG=Operational, NSG=FullFeature
    OperationalNegotiation,
    FullFeature,
}

impl LoginPhase {
    /// (CSG, NSG) advertised by a Login Request sent in this phase.
    pub fn stages(self) -> Option<(Stage, Stage)> {
        match self {
            LoginPhase::Closed => None,
            LoginPhase::SecurityNegotiation => Some((Stage::Security, Stage::Operational)),
            LoginPhase::OperationalNegotiation => {
                Some((Stage::Operational, Stage::FullFeature))
            },
            LoginPhase::FullFeature => Some((Stage::FullFeature, Stage::FullFeature)),
        }
    }
}

bitflags::bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct AuthStatus: u8 {
        /// Target asked us to authenticate (AuthMethod=CHAP).
        const FORWARD_REQUIRED = 0x01;
        /// We insist on authenticating the target.
        const REVERSE_REQUIRED = 0x02;
        /// Target's CHAP_R verified.
        const REVERSE_OK       = 0x04;
        /// Our CHAP_R has been computed and queued.
        const FORWARD_DONE     = 0x08;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub phase: LoginPhase,
    pub strings: LoginStrings,
    pub auth: AuthStatus,
}

impl SessionStatus {
    /// Status of a freshly opened connection.
    pub fn opened(reverse_required: bool) -> Self {
        let mut auth = AuthStatus::empty();
        auth.set(AuthStatus::REVERSE_REQUIRED, reverse_required);
        Self {
            phase: LoginPhase::SecurityNegotiation,
            strings: LoginStrings::SECURITY,
            auth,
        }
    }

    pub fn is_open(&self) -> bool {
        self.phase != LoginPhase::Closed
    }

    pub fn is_full_feature(&self) -> bool {
        self.phase == LoginPhase::FullFeature
    }

    /// Apply a Login Response with the Transit bit set.
    pub fn transit(&mut self, nsg: Option<Stage>) -> Result<(), IscsiError> {
        if self.phase == LoginPhase::SecurityNegotiation
            && self.auth.contains(AuthStatus::FORWARD_REQUIRED)
            && !self.auth.contains(AuthStatus::FORWARD_DONE)
        {
            return Err(IscsiError::Protocol(
                "target left security negotiation before CHAP completed".to_string(),
            ));
        }
        self.strings = LoginStrings::empty();
        match nsg {
            Some(Stage::Operational) => {
                info!("login: entering operational negotiation");
                self.phase = LoginPhase::OperationalNegotiation;
                self.strings = LoginStrings::OPERATIONAL;
            },
            Some(Stage::FullFeature) => {
                info!("login: entering full feature phase");
                self.phase = LoginPhase::FullFeature;
            },
            other => {
                return Err(IscsiError::Protocol(format!(
                    "login response transits to unexpected stage {other:?}"
                )));
            },
        }
        Ok(())
    }

    /// A target we required to authenticate must have done so.
    pub fn check_reverse_auth(&self) -> Result<(), IscsiError> {
        if self.auth.contains(AuthStatus::REVERSE_REQUIRED)
            && !self.auth.contains(AuthStatus::REVERSE_OK)
        {
            return Err(IscsiError::Protocol(
                "target skipped the required mutual CHAP authentication".to_string(),
            ));
        }
        Ok(())
    }
}

impl<T: Transport, D: Digest> Session<T, D> {
    /// Send the next Login Request for the current phase, carrying whichever
    /// key groups are pending.
    pub(crate) fn start_login(&mut self) -> Result<(), IscsiError> {
        let (csg, nsg) = self.status.phase.stages().ok_or_else(|| {
            IscsiError::Protocol("login requested on a closed connection".to_string())
        })?;

        let identity = LoginIdentity {
            initiator_iqn: &self.initiator_iqn,
            target_iqn: &self.target_iqn,
            initiator_username: self.auth.initiator_username.as_deref(),
            chap_response: self
                .chap
                .as_ref()
                .map(ChapResponse::response)
                .unwrap_or_default(),
            chap_challenge: self.chap_challenge.as_ref().map(|c| &c[..]),
            operational: &self.operational,
        };
        let text = build_login_strings(self.status.strings, &identity);

        let header = LoginRequestBuilder::new()
            .transit(csg, nsg)
            .isid(self.isid)
            .tsih(self.tsih)
            .initiator_task_tag(self.itt)
            .cmd_sn(self.cmd_sn)
            .exp_stat_sn(self.stat_sn.wrapping_add(1))
            .build();

        debug!(
            ?csg,
            ?nsg,
            strings = ?self.status.strings,
            len = text.len(),
            "login request"
        );
        self.tx.start(Pdu::LoginRequest(header), TxPayload::Owned(text));
        Ok(())
    }

    /// Data handler for Login Response PDUs. Text is reassembled in
    /// `rx_buffer` and processed once the data segment is complete.
    pub(crate) fn rx_login_response(
        &mut self,
        rsp: &LoginResponse,
        data: &[u8],
        remaining: usize,
    ) -> Result<(), IscsiError> {
        if self.rx_buffer.is_none() {
            let mut buf = Vec::new();
            buf.try_reserve_exact(rsp.lengths.data_len())?;
            self.rx_buffer = Some(buf);
        }
        if let Some(buf) = self.rx_buffer.as_mut() {
            buf.extend_from_slice(data);
        }
        if remaining > 0 {
            return Ok(());
        }

        let text = self.rx_buffer.take().unwrap_or_default();
        handle_text_keys(self, &Self::login_key_table(), &text)?;

        match rsp.class() {
            StatusClass::Success => {},
            StatusClass::Redirection => {
                info!(
                    address = %self.target_address,
                    port = self.target_port,
                    "login redirected"
                );
                self.close_connection(None);
                return self.open_connection();
            },
            class => return Err(status_to_error(class, rsp.status_detail)),
        }

        if !self.tx.is_idle() {
            return Err(IscsiError::Protocol(
                "login response while a login request is still being sent".to_string(),
            ));
        }

        if rsp.flags.transit() {
            self.status.transit(rsp.flags.nsg())?;
        }
        if !self.status.is_full_feature() {
            return self.start_login();
        }

        self.status.check_reverse_auth()?;
        self.retry_count = 0;
        self.tsih = rsp.tsih.get();
        info!(tsih = self.tsih, "logged in");

        if self.command.is_some() {
            self.start_command()?;
        }
        Ok(())
    }
}
