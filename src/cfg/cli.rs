// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

pub const DEFAULT_CONFIG: &str = "tests/config.yaml";
pub const DEFAULT_LOGGER_CONFIG: &str = "tests/config_logger.yaml";

/// Files named on the command line: `[config.yaml [logger.yaml]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub config: String,
    pub logger_config: String,
}

impl CliArgs {
    /// Parse the arguments following the program name.
    pub fn parse<I>(args: I) -> Result<Self>
    where I: IntoIterator<Item = String> {
        let mut args = args.into_iter();
        let config = args.next().unwrap_or_else(|| DEFAULT_CONFIG.to_string());
        let logger_config = args
            .next()
            .unwrap_or_else(|| DEFAULT_LOGGER_CONFIG.to_string());
        if let Some(extra) = args.next() {
            bail!("unexpected argument {extra:?}; usage: iscsi-sanboot [CONFIG [LOGGER_CONFIG]]");
        }
        Ok(Self {
            config,
            logger_config,
        })
    }
}

pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    abs.canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))
}
