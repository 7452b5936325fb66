// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use serde::{Deserialize, Serialize};
use tracing_appender::rolling::Rotation;

/// Boolean text value as used by iSCSI keys (`Yes` / `No`).
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum YesNo {
    #[serde(rename = "Yes", alias = "yes", alias = "true")]
    Yes,
    #[serde(rename = "No", alias = "no", alias = "false")]
    No,
}

impl fmt::Display for YesNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            YesNo::Yes => "Yes",
            YesNo::No => "No",
        })
    }
}

impl From<bool> for YesNo {
    fn from(b: bool) -> Self {
        if b { YesNo::Yes } else { YesNo::No }
    }
}

/// Where log records are written.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    Stderr,
    File,
}

/// Rotation period of the log file.
#[derive(Deserialize, Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationFrequency {
    Minutely,
    Hourly,
    Daily,
    #[default]
    Never,
}

impl From<RotationFrequency> for Rotation {
    fn from(freq: RotationFrequency) -> Self {
        match freq {
            RotationFrequency::Minutely => Rotation::MINUTELY,
            RotationFrequency::Hourly => Rotation::HOURLY,
            RotationFrequency::Daily => Rotation::DAILY,
            RotationFrequency::Never => Rotation::NEVER,
        }
    }
}
