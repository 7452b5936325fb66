// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::cfg::enums::YesNo;

bitflags::bitflags! {
    /// Groups of text keys still to be sent in the next Login Request.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct LoginStrings: u8 {
        /// InitiatorName / TargetName / SessionType / AuthMethod
        const SECURITY       = 0x01;
        /// CHAP_A
        const CHAP_ALGORITHM = 0x02;
        /// CHAP_N / CHAP_R
        const CHAP_RESPONSE  = 0x04;
        /// CHAP_I / CHAP_C (mutual CHAP)
        const CHAP_CHALLENGE = 0x08;
        /// operational negotiation keys
        const OPERATIONAL    = 0x10;
    }
}

/// The only CHAP algorithm offered: MD5.
pub const CHAP_ALGORITHM_MD5: &str = "5";

/// Flow limits advertised during operational negotiation.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationalParams {
    #[serde(rename = "MaxRecvDataSegmentLength")]
    pub max_recv_data_segment_length: u32,
    #[serde(rename = "MaxBurstLength")]
    pub max_burst_length: u32,
    #[serde(rename = "FirstBurstLength")]
    pub first_burst_length: u32,
}

impl Default for OperationalParams {
    fn default() -> Self {
        Self {
            max_recv_data_segment_length: 8192,
            max_burst_length: 262_144,
            first_burst_length: 65_536,
        }
    }
}

impl OperationalParams {
    /// Operational keys in the order they go on the wire. Everything except
    /// the three flow lengths is fixed: one connection, solicited writes
    /// only, one outstanding R2T, in-order data, no digests, ERL 0.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("HeaderDigest", "None".to_string()),
            ("DataDigest", "None".to_string()),
            ("MaxConnections", "1".to_string()),
            ("InitialR2T", YesNo::Yes.to_string()),
            ("ImmediateData", YesNo::No.to_string()),
            (
                "MaxRecvDataSegmentLength",
                self.max_recv_data_segment_length.to_string(),
            ),
            ("MaxBurstLength", self.max_burst_length.to_string()),
            ("FirstBurstLength", self.first_burst_length.to_string()),
            ("DefaultTime2Wait", "0".to_string()),
            ("DefaultTime2Retain", "0".to_string()),
            ("MaxOutstandingR2T", "1".to_string()),
            ("DataPDUInOrder", YesNo::Yes.to_string()),
            ("DataSequenceInOrder", YesNo::Yes.to_string()),
            ("ErrorRecoveryLevel", "0".to_string()),
        ]
    }
}

/// Everything the builder needs to render the pending key groups.
#[derive(Debug, Clone, Copy)]
pub struct LoginIdentity<'a> {
    pub initiator_iqn: &'a str,
    pub target_iqn: &'a str,
    /// Present when forward CHAP credentials are configured.
    pub initiator_username: Option<&'a str>,
    /// CHAP_R digest, if one has been computed.
    pub chap_response: &'a [u8],
    /// `[identifier, challenge...]` sent to the target for mutual CHAP.
    pub chap_challenge: Option<&'a [u8]>,
    pub operational: &'a OperationalParams,
}

fn push_kv(out: &mut String, key: &str, value: impl Display) {
    out.push_str(key);
    out.push('=');
    out.push_str(&value.to_string());
    out.push('\0');
}

/// Render the key groups selected by `strings` as `key=value\0` records.
pub fn build_login_strings(strings: LoginStrings, id: &LoginIdentity<'_>) -> Vec<u8> {
    let mut out = String::new();

    if strings.contains(LoginStrings::SECURITY) {
        push_kv(&mut out, "InitiatorName", id.initiator_iqn);
        push_kv(&mut out, "TargetName", id.target_iqn);
        push_kv(&mut out, "SessionType", "Normal");
        let methods = if id.initiator_username.is_some() {
            "CHAP,None"
        } else {
            "None"
        };
        push_kv(&mut out, "AuthMethod", methods);
    }

    if strings.contains(LoginStrings::CHAP_ALGORITHM) {
        push_kv(&mut out, "CHAP_A", CHAP_ALGORITHM_MD5);
    }

    if strings.contains(LoginStrings::CHAP_RESPONSE) {
        if let Some(user) = id.initiator_username {
            push_kv(&mut out, "CHAP_N", user);
            push_kv(&mut out, "CHAP_R", format_args!("0x{}", hex::encode(id.chap_response)));
        }
    }

    if strings.contains(LoginStrings::CHAP_CHALLENGE) {
        if let Some((ident, challenge)) = id.chap_challenge.and_then(|c| c.split_first()) {
            push_kv(&mut out, "CHAP_I", ident);
            push_kv(&mut out, "CHAP_C", format_args!("0x{}", hex::encode(challenge)));
        }
    }

    if strings.contains(LoginStrings::OPERATIONAL) {
        for (key, value) in id.operational.pairs() {
            push_kv(&mut out, key, value);
        }
    }

    out.into_bytes()
}
