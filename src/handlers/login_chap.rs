// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! CHAP (RFC 1994) as used by iSCSI login: `R = H(id || secret || challenge)`.

use md5::{Digest, Md5};
use rand::Rng;

use crate::error::IscsiError;

/// Challenge bytes sent to the target for mutual CHAP.
pub const CHAP_CHALLENGE_LEN: usize = 16;

/// Incremental CHAP response calculator. MD5 unless another digest is
/// plugged in.
pub struct ChapResponse<D: Digest = Md5> {
    digest: D,
    response: Vec<u8>,
}

impl<D: Digest> Default for ChapResponse<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Digest> ChapResponse<D> {
    pub fn new() -> Self {
        Self {
            digest: D::new(),
            response: Vec::new(),
        }
    }

    /// Feed the one-octet CHAP identifier. Must come first.
    pub fn set_identifier(&mut self, id: u8) {
        self.digest.update([id]);
    }

    pub fn update(&mut self, data: &[u8]) {
        self.digest.update(data);
    }

    /// Finish the hash; the result is available from [`Self::response`].
    pub fn respond(&mut self) {
        let digest = std::mem::replace(&mut self.digest, D::new());
        self.response = digest.finalize().to_vec();
    }

    pub fn response(&self) -> &[u8] {
        &self.response
    }
}

/// One-shot response for `id`, `secret` and `challenge`.
pub fn chap_response<D: Digest>(id: u8, secret: &[u8], challenge: &[u8]) -> Vec<u8> {
    let mut chap = ChapResponse::<D>::new();
    chap.set_identifier(id);
    chap.update(secret);
    chap.update(challenge);
    chap.respond();
    chap.response
}

/// Compare two responses without short-circuiting on the first mismatch.
pub fn responses_match(expected: &[u8], received: &[u8]) -> bool {
    if expected.len() != received.len() {
        return false;
    }
    expected
        .iter()
        .zip(received)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

/// Fresh `[identifier, challenge...]` for mutual CHAP.
pub fn generate_challenge() -> [u8; CHAP_CHALLENGE_LEN + 1] {
    let mut buf = [0u8; CHAP_CHALLENGE_LEN + 1];
    rand::rng().fill(&mut buf[..]);
    buf
}

/// Decode a `CHAP_C` / `CHAP_R` value. The `0x` prefix is optional.
pub fn decode_chap_hex(value: &str) -> Result<Vec<u8>, IscsiError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    hex::decode(digits)
        .map_err(|e| IscsiError::Protocol(format!("invalid CHAP hex value {value:?}: {e}")))
}

/// Parse a `CHAP_I` value: decimal, or hexadecimal with `0x`.
pub fn parse_chap_identifier(value: &str) -> Result<u8, IscsiError> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(digits) => u8::from_str_radix(digits, 16),
        None => value.parse::<u8>(),
    };
    parsed.map_err(|e| IscsiError::Protocol(format!("invalid CHAP_I {value:?}: {e}")))
}
