// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! RFC 4173 root path: `iscsi:<server>:<protocol>:<port>:<lun>:<targetname>`.

use anyhow::{Context, Result, bail, ensure};

use crate::client::session::ISCSI_PORT;

/// IANA protocol number for TCP, the only transport accepted.
const PROTOCOL_TCP: u8 = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootPath {
    pub server: String,
    pub port: u16,
    pub lun: u64,
    pub target_iqn: String,
}

impl RootPath {
    pub fn parse(root_path: &str) -> Result<Self> {
        let rest = root_path.strip_prefix("iscsi:").unwrap_or(root_path);

        let (server, rest) = match rest.strip_prefix('[') {
            Some(bracketed) => {
                let (server, tail) = bracketed
                    .split_once(']')
                    .context("unterminated IPv6 server name in root path")?;
                let tail = tail
                    .strip_prefix(':')
                    .context("missing ':' after server name in root path")?;
                (server, tail)
            },
            None => rest
                .split_once(':')
                .context("root path has no protocol field")?,
        };

        let mut fields = rest.splitn(4, ':');
        let protocol = fields.next().unwrap_or_default();
        let port = fields.next().context("root path has no port field")?;
        let lun = fields.next().context("root path has no LUN field")?;
        let target_iqn = fields.next().context("root path has no target name")?;

        ensure!(!server.is_empty(), "root path has an empty server name");
        ensure!(!target_iqn.is_empty(), "root path has an empty target name");
        if !protocol.is_empty() {
            let protocol: u8 = protocol
                .parse()
                .with_context(|| format!("invalid protocol {protocol:?} in root path"))?;
            ensure!(
                protocol == PROTOCOL_TCP,
                "unsupported protocol {protocol} in root path"
            );
        }
        let port = if port.is_empty() {
            ISCSI_PORT
        } else {
            port.parse()
                .with_context(|| format!("invalid port {port:?} in root path"))?
        };

        Ok(Self {
            server: server.to_string(),
            port,
            lun: parse_lun(lun)?,
            target_iqn: target_iqn.to_string(),
        })
    }
}

/// Parse a LUN as up to four `-`-separated hexadecimal 16-bit groups,
/// filling the 8-byte LUN from the most significant end.
pub fn parse_lun(text: &str) -> Result<u64> {
    if text.is_empty() {
        return Ok(0);
    }
    let mut lun = [0u8; 8];
    for (i, group) in text.split('-').enumerate() {
        if i >= 4 {
            bail!("LUN {text:?} has more than four components");
        }
        let value = u16::from_str_radix(group, 16)
            .with_context(|| format!("invalid LUN component {group:?} in {text:?}"))?;
        lun[i * 2..i * 2 + 2].copy_from_slice(&value.to_be_bytes());
    }
    Ok(u64::from_be_bytes(lun))
}
