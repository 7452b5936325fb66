// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result, bail};
use iscsi_sanboot::{
    cfg::{cli::CliArgs, config::Config, logger::init_logger},
    client::{connection::Connection, session::Session, transport::BufferedTransport},
    control_block::{
        read::read10_command,
        read_capacity::{parse_read_capacity10, read_capacity10_command},
    },
};
use tokio::main;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[main]
async fn main() -> Result<()> {
    let args = CliArgs::parse(std::env::args().skip(1))?;
    let _init_logger = init_logger(&args.logger_config)?;

    let config = Config::load_from_file(&args.config)
        .with_context(|| format!("failed to load config {}", args.config))?;
    let session_config = config.session_config()?;
    info!(
        target = %session_config.target_iqn,
        initiator = %session_config.initiator_iqn,
        address = %session_config.target_address,
        port = session_config.target_port,
        lun = session_config.lun,
        "booting from SAN"
    );

    let transport = BufferedTransport::new(config.runtime.tx_window);
    let mut session: Session<BufferedTransport> = Session::new(session_config, transport)?;
    let mut conn = Connection::new(&config.runtime);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let capacity = conn
        .execute(&mut session, read_capacity10_command(), &cancel)
        .await?;
    if let Err(e) = &capacity.result {
        error!(errno = e.errno(), "READ CAPACITY(10) failed: {e}");
        bail!("READ CAPACITY(10) failed: {e}");
    }
    let rc = parse_read_capacity10(&capacity.command.data_in)?;
    let block_len = rc.block_len.get();
    info!(
        max_lba = rc.max_lba.get(),
        block_len,
        total_bytes = rc.total_bytes(),
        status = capacity.command.status,
        "READ CAPACITY(10)"
    );

    let block0 = conn
        .execute(&mut session, read10_command(0, 1, block_len), &cancel)
        .await?;
    let data = &block0.command.data_in;
    match &block0.result {
        Ok(()) => info!(
            status = block0.command.status,
            residual = block0.command.residual,
            head = %hex::encode(&data[..data.len().min(64)]),
            "READ(10) LBA 0"
        ),
        Err(e) => {
            error!(errno = e.errno(), "READ(10) failed: {e}");
            bail!("READ(10) failed: {e}");
        },
    }

    session.shutdown();
    Ok(())
}
