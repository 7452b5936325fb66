// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::{Context, Result};
use iscsi_sanboot::{
    cfg::{config::Config, logger::init_logger},
    client::{connection::Connection, session::Session, transport::BufferedTransport},
    control_block::read_capacity::{parse_read_capacity10, read_capacity10_command},
};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::integration_tests::common::{BLOCK_LEN, LoopbackTarget, TargetOptions, runtime};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn login_plain_and_read_capacity() -> Result<()> {
    let _ = init_logger("tests/config_logger.yaml");

    let target = LoopbackTarget::start(64, TargetOptions::default()).await?;
    let cfg = Config::from_yaml(&format!(
        "target:\n  RootPath: \"{}\"\nidentity:\n  Hostname: loopback\n",
        target.root_path()
    ))?;

    let mut session: Session<BufferedTransport> =
        Session::new(cfg.session_config()?, BufferedTransport::new(4096))?;
    let mut conn = Connection::new(&runtime());
    let cancel = CancellationToken::new();

    let done = timeout(
        Duration::from_secs(20),
        conn.execute(&mut session, read_capacity10_command(), &cancel),
    )
    .await
    .context("READ CAPACITY(10) timeout")??;
    assert_eq!(done.result, Ok(()));

    let rc = parse_read_capacity10(&done.command.data_in)?;
    assert_eq!(rc.max_lba.get(), 63);
    assert_eq!(rc.block_len.get() as usize, BLOCK_LEN);
    assert_eq!(rc.total_bytes(), 64 * BLOCK_LEN as u64);

    assert!(session.status().is_full_feature());
    assert_eq!(session.tsih(), 0x0a0b);
    assert_eq!(session.peer().map(|p| p.port()), Some(target.addr.port()));
    assert!(conn.is_connected());

    session.shutdown();
    Ok(())
}
