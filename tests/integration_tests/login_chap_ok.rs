// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::{Context, Result};
use iscsi_sanboot::{
    cfg::config::AuthConfig,
    client::{connection::Connection, session::Session, transport::BufferedTransport},
    control_block::read_capacity::read_capacity10_command,
    error::IscsiError,
};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::integration_tests::common::{LoopbackTarget, TargetOptions, runtime};

fn chap_target() -> TargetOptions {
    TargetOptions {
        chap: Some(("boot".to_string(), "chap-secret-12".to_string())),
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn login_chap_ok() -> Result<()> {
    let target = LoopbackTarget::start(16, chap_target()).await?;
    let mut session: Session<BufferedTransport> = Session::new(
        target.session_config(AuthConfig::chap("boot", "chap-secret-12")),
        BufferedTransport::new(4096),
    )?;
    let mut conn = Connection::new(&runtime());
    let cancel = CancellationToken::new();

    let done = timeout(
        Duration::from_secs(20),
        conn.execute(&mut session, read_capacity10_command(), &cancel),
    )
    .await
    .context("login timeout")??;
    assert_eq!(done.result, Ok(()));
    assert!(session.status().is_full_feature());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn login_chap_wrong_secret_is_final() -> Result<()> {
    let target = LoopbackTarget::start(16, chap_target()).await?;
    let mut session: Session<BufferedTransport> = Session::new(
        target.session_config(AuthConfig::chap("boot", "not-the-secret")),
        BufferedTransport::new(4096),
    )?;
    let mut conn = Connection::new(&runtime());
    let cancel = CancellationToken::new();

    let done = timeout(
        Duration::from_secs(20),
        conn.execute(&mut session, read_capacity10_command(), &cancel),
    )
    .await
    .context("login timeout")??;
    assert!(matches!(done.result, Err(IscsiError::AccessDenied(_))));
    assert!(matches!(session.instant_error(), Some(IscsiError::AccessDenied(_))));
    assert_eq!(target.connections.load(std::sync::atomic::Ordering::SeqCst), 1);

    // A poisoned session refuses further work without touching the network.
    let again = conn
        .execute(&mut session, read_capacity10_command(), &cancel)
        .await;
    assert!(again.is_err());
    Ok(())
}
