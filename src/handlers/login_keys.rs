// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Handlers for the text keys a target sends in Login Responses.

use md5::Digest;
use tracing::{debug, info};

use crate::{
    client::{
        session::{ISCSI_PORT, Session},
        transport::Transport,
    },
    error::IscsiError,
    handlers::login_chap::{
        ChapResponse, chap_response, decode_chap_hex, generate_challenge,
        parse_chap_identifier, responses_match,
    },
    models::text::{
        builder::{CHAP_ALGORITHM_MD5, LoginStrings},
        parser::TextKey,
    },
    state_machine::login_states::AuthStatus,
};

/// Parse `host[:port][,tpgt]`. The host may be a bracketed IPv6 literal.
pub fn parse_target_address(value: &str) -> Result<(String, u16), IscsiError> {
    let bad = || IscsiError::Protocol(format!("invalid TargetAddress {value:?}"));

    let addr = value.split_once(',').map_or(value, |(addr, _tpgt)| addr);
    let (host, port) = match addr.strip_prefix('[') {
        Some(rest) => {
            let (host, tail) = rest.split_once(']').ok_or_else(bad)?;
            let port = match tail {
                "" => None,
                tail => Some(tail.strip_prefix(':').ok_or_else(bad)?),
            };
            (host, port)
        },
        None => match addr.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (addr, None),
        },
    };

    if host.is_empty() {
        return Err(bad());
    }
    let port = match port {
        None | Some("") => ISCSI_PORT,
        Some(port) => port.parse::<u16>().map_err(|_| bad())?,
    };
    Ok((host.to_string(), port))
}

impl<T: Transport, D: Digest> Session<T, D> {
    /// Keys understood during login. Anything else is ignored.
    pub(crate) fn login_key_table() -> [TextKey<Self>; 7] {
        [
            TextKey::new("TargetAddress", Self::handle_target_address),
            TextKey::new("AuthMethod", Self::handle_auth_method),
            TextKey::new("CHAP_A", Self::handle_chap_algorithm),
            TextKey::new("CHAP_I", Self::handle_chap_identifier),
            TextKey::new("CHAP_C", Self::handle_chap_challenge),
            TextKey::new("CHAP_N", Self::handle_chap_name),
            TextKey::new("CHAP_R", Self::handle_chap_response),
        ]
    }

    fn handle_target_address(&mut self, value: &str) -> Result<(), IscsiError> {
        let (address, port) = parse_target_address(value)?;
        info!(%address, port, "target address");
        self.target_address = address;
        self.target_port = port;
        Ok(())
    }

    fn handle_auth_method(&mut self, value: &str) -> Result<(), IscsiError> {
        if value != "CHAP" {
            debug!(method = value, "no authentication required");
            return Ok(());
        }
        if self.auth.initiator_username.is_none() {
            return Err(IscsiError::AccessDenied(
                "target requires CHAP but no initiator credentials are configured"
                    .to_string(),
            ));
        }
        self.status.strings |= LoginStrings::CHAP_ALGORITHM;
        self.status.auth |= AuthStatus::FORWARD_REQUIRED;
        Ok(())
    }

    fn handle_chap_algorithm(&mut self, value: &str) -> Result<(), IscsiError> {
        if value != CHAP_ALGORITHM_MD5 {
            return Err(IscsiError::Protocol(format!(
                "target selected unsupported CHAP algorithm {value:?}"
            )));
        }
        Ok(())
    }

    /// Starts a fresh response: identifier, then our secret.
    fn handle_chap_identifier(&mut self, value: &str) -> Result<(), IscsiError> {
        let id = parse_chap_identifier(value)?;
        let mut chap = ChapResponse::<D>::new();
        chap.set_identifier(id);
        if let Some(password) = &self.auth.initiator_password {
            chap.update(password.as_bytes());
        }
        self.chap = Some(chap);
        Ok(())
    }

    fn handle_chap_challenge(&mut self, value: &str) -> Result<(), IscsiError> {
        let challenge = decode_chap_hex(value)?;
        let chap = self.chap.as_mut().ok_or_else(|| {
            IscsiError::Protocol("CHAP_C received before CHAP_I".to_string())
        })?;
        chap.update(&challenge);
        chap.respond();
        self.status.strings |= LoginStrings::CHAP_RESPONSE;
        self.status.auth |= AuthStatus::FORWARD_DONE;

        if self.auth.target_username.is_some() && self.auth.target_password.is_some() {
            self.chap_challenge = Some(generate_challenge());
            self.status.strings |= LoginStrings::CHAP_CHALLENGE;
        }
        Ok(())
    }

    fn handle_chap_name(&mut self, value: &str) -> Result<(), IscsiError> {
        match self.auth.target_username.as_deref() {
            Some(expected) if expected == value => Ok(()),
            _ => Err(IscsiError::AccessDenied(format!(
                "unexpected target CHAP name {value:?}"
            ))),
        }
    }

    fn handle_chap_response(&mut self, value: &str) -> Result<(), IscsiError> {
        let received = decode_chap_hex(value)?;
        let challenge = self.chap_challenge.as_ref().ok_or_else(|| {
            IscsiError::AccessDenied("unsolicited CHAP_R from target".to_string())
        })?;
        let password = self.auth.target_password.as_deref().ok_or_else(|| {
            IscsiError::AccessDenied("no target password to verify CHAP_R".to_string())
        })?;

        let (id, challenge) = challenge
            .split_first()
            .ok_or_else(|| IscsiError::AccessDenied("empty CHAP challenge".to_string()))?;
        let expected = chap_response::<D>(*id, password.as_bytes(), challenge);
        if !responses_match(&expected, &received) {
            return Err(IscsiError::AccessDenied(
                "target CHAP response does not match".to_string(),
            ));
        }

        info!("target authenticated");
        self.status.auth |= AuthStatus::REVERSE_OK;
        Ok(())
    }
}
