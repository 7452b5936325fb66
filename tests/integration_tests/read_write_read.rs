// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::{Context, Result};
use iscsi_sanboot::{
    cfg::config::AuthConfig,
    client::{connection::Connection, session::Session, transport::BufferedTransport},
    control_block::{command::ScsiCommand, read::read10_command, write::write10_command},
    error::IscsiError,
    models::command::common::scsi_status,
};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::integration_tests::common::{
    BLOCK_LEN, LoopbackTarget, TargetOptions, pattern, runtime,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn read10_write10_read10() -> Result<()> {
    let target = LoopbackTarget::start(64, TargetOptions::default()).await?;
    let mut session: Session<BufferedTransport> = Session::new(
        target.session_config(AuthConfig::default()),
        BufferedTransport::new(4096),
    )?;
    let mut conn = Connection::new(&runtime());
    let cancel = CancellationToken::new();

    let lba = 5u32;
    let blocks = 5u16;
    let len = usize::from(blocks) * BLOCK_LEN;

    let before = timeout(
        Duration::from_secs(20),
        conn.execute(&mut session, read10_command(lba, blocks, BLOCK_LEN as u32), &cancel),
    )
    .await
    .context("READ(10) #1 timeout")??;
    assert_eq!(before.result, Ok(()));
    assert!(before.command.data_in.iter().all(|&b| b == 0));

    let data = pattern(len, 0x5a);
    let written = timeout(
        Duration::from_secs(20),
        conn.execute(
            &mut session,
            write10_command(lba, BLOCK_LEN as u32, data.clone()),
            &cancel,
        ),
    )
    .await
    .context("WRITE(10) timeout")??;
    assert_eq!(written.result, Ok(()));
    assert_eq!(written.command.status, scsi_status::GOOD);

    {
        let disk = target
            .disk
            .lock()
            .map_err(|_| anyhow::anyhow!("disk poisoned"))?;
        let start = lba as usize * BLOCK_LEN;
        assert_eq!(&disk[start..start + len], data.as_slice());
    }

    let after = timeout(
        Duration::from_secs(20),
        conn.execute(&mut session, read10_command(lba, blocks, BLOCK_LEN as u32), &cancel),
    )
    .await
    .context("READ(10) #2 timeout")??;
    assert_eq!(after.result, Ok(()));
    assert_eq!(after.command.data_in, data);

    // All three commands ran over one login.
    assert_eq!(target.connections.load(std::sync::atomic::Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unsupported_cdb_reports_check_condition() -> Result<()> {
    let target = LoopbackTarget::start(8, TargetOptions::default()).await?;
    let mut session: Session<BufferedTransport> = Session::new(
        target.session_config(AuthConfig::default()),
        BufferedTransport::new(4096),
    )?;
    let mut conn = Connection::new(&runtime());
    let cancel = CancellationToken::new();

    // TEST UNIT READY is not implemented by the RAM disk.
    let done = timeout(
        Duration::from_secs(20),
        conn.execute(&mut session, ScsiCommand::new([0u8; 16]), &cancel),
    )
    .await
    .context("command timeout")??;
    assert_eq!(done.result, Ok::<(), IscsiError>(()));
    assert_eq!(done.command.status, scsi_status::CHECK_CONDITION);
    assert_eq!(done.command.sense_response, 0x70);
    Ok(())
}
