// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{
    cfg::root_path::RootPath,
    client::session::SessionConfig,
    error::IscsiError,
    models::{common::MAX_DATA_SEGMENT_LEN, text::builder::OperationalParams},
};

/// Prefix of initiator names derived from the host name.
pub const IQN_PREFIX: &str = "iqn.2010-04.org.ipxe";

#[derive(Deserialize, Serialize, Debug, Clone)]
/// Top-level configuration of a SAN boot session.
pub struct Config {
    pub target: TargetConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub flow: OperationalParams,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TargetConfig {
    #[serde(rename = "RootPath")]
    /// RFC 4173 root path of the boot disk.
    pub root_path: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct IdentityConfig {
    #[serde(rename = "InitiatorName", default)]
    /// Explicit initiator IQN; overrides the derived one.
    pub initiator_name: Option<String>,

    #[serde(rename = "Hostname", default)]
    pub hostname: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
/// CHAP credentials. The initiator pair authenticates us to the target,
/// the target pair enables mutual CHAP.
pub struct AuthConfig {
    #[serde(rename = "InitiatorUsername", default)]
    pub initiator_username: Option<String>,
    #[serde(rename = "InitiatorPassword", default)]
    pub initiator_password: Option<String>,
    #[serde(rename = "TargetUsername", default)]
    pub target_username: Option<String>,
    #[serde(rename = "TargetPassword", default)]
    pub target_password: Option<String>,
}

impl AuthConfig {
    /// Forward credentials only.
    pub fn chap(username: &str, password: &str) -> Self {
        Self {
            initiator_username: Some(username.to_string()),
            initiator_password: Some(password.to_string()),
            ..Default::default()
        }
    }

    /// Forward and reverse credentials.
    pub fn mutual_chap(
        username: &str,
        password: &str,
        target_username: &str,
        target_password: &str,
    ) -> Self {
        Self {
            target_username: Some(target_username.to_string()),
            target_password: Some(target_password.to_string()),
            ..Self::chap(username, password)
        }
    }

    /// Each pair must be complete, and a reverse pair needs a forward one.
    pub fn validate(&self) -> Result<(), IscsiError> {
        let forward =
            pair_present("initiator", &self.initiator_username, &self.initiator_password)?;
        let reverse =
            pair_present("target", &self.target_username, &self.target_password)?;
        if reverse && !forward {
            return Err(IscsiError::InvalidArgument(
                "target credentials require initiator credentials".to_string(),
            ));
        }
        Ok(())
    }

    fn normalize(&mut self) {
        for field in [
            &mut self.initiator_username,
            &mut self.initiator_password,
            &mut self.target_username,
            &mut self.target_password,
        ] {
            if field.as_deref().is_some_and(str::is_empty) {
                *field = None;
            }
        }
    }
}

fn pair_present(
    side: &str,
    username: &Option<String>,
    password: &Option<String>,
) -> Result<bool, IscsiError> {
    match (username, password) {
        (Some(_), Some(_)) => Ok(true),
        (None, None) => Ok(false),
        _ => Err(IscsiError::InvalidArgument(format!(
            "{side} username and password must be set together"
        ))),
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
/// Settings of the socket driver; the engine itself has no clock.
pub struct RuntimeConfig {
    #[serde(rename = "TimeoutConnection", with = "serde_secs")]
    /// Timeout for establishing the TCP connection.
    pub timeout_connection: Duration,

    #[serde(rename = "TimeoutIo", with = "serde_secs")]
    /// Timeout of a single socket read or write.
    pub timeout_io: Duration,

    #[serde(rename = "TxWindow")]
    /// Bytes the driver buffers before flushing to the socket.
    pub tx_window: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            timeout_connection: Duration::from_secs(10),
            timeout_io: Duration::from_secs(30),
            tx_window: 65_536,
        }
    }
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        Self::from_yaml(&s)
    }

    pub fn from_yaml(s: &str) -> Result<Self> {
        let mut cfg: Config =
            serde_yaml::from_str(s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes optional fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        self.auth.normalize();
        for field in [&mut self.identity.initiator_name, &mut self.identity.hostname] {
            if field.as_deref().is_some_and(|s| s.trim().is_empty()) {
                *field = None;
            }
        }

        RootPath::parse(&self.target.root_path).context("invalid RootPath")?;
        self.auth.validate().context("invalid credentials")?;

        let flow = &self.flow;
        for (name, value) in [
            ("MaxRecvDataSegmentLength", flow.max_recv_data_segment_length),
            ("MaxBurstLength", flow.max_burst_length),
            ("FirstBurstLength", flow.first_burst_length),
        ] {
            ensure!(
                (512..=MAX_DATA_SEGMENT_LEN).contains(&value),
                "{name} must be between 512 and {MAX_DATA_SEGMENT_LEN}"
            );
        }
        ensure!(
            flow.first_burst_length <= flow.max_burst_length,
            "FirstBurstLength must not exceed MaxBurstLength"
        );
        ensure!(self.runtime.tx_window >= 48, "TxWindow must hold at least one BHS");

        Ok(())
    }

    /// Explicit `InitiatorName`, else derived from `Hostname`.
    pub fn initiator_iqn(&self) -> String {
        if let Some(name) = &self.identity.initiator_name {
            return name.clone();
        }
        let host = self.identity.hostname.as_deref().unwrap_or("unknown");
        format!("{IQN_PREFIX}:{host}")
    }

    /// Engine-level view of this configuration.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let root = RootPath::parse(&self.target.root_path).context("invalid RootPath")?;
        Ok(SessionConfig {
            target_address: root.server,
            target_port: root.port,
            target_iqn: root.target_iqn,
            initiator_iqn: self.initiator_iqn(),
            lun: root.lun,
            auth: self.auth.clone(),
            operational: self.flow,
        })
    }
}

/// Serde helpers for representing `Duration` as a number of seconds.
mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
