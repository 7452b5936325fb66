// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result};
use iscsi_sanboot::{
    cfg::config::AuthConfig,
    control_block::read::read10_command,
    error::IscsiError,
    models::{
        command::{
            common::{ScsiCommandResponseFlags, scsi_status},
            response::ScsiCommandResponse,
        },
        data::{common::DataInFlags, response::ScsiDataIn},
        parse::Pdu,
    },
};

use crate::unit_tests::common::{encode, login_and_issue, new_session, sent};

fn data_in(itt: u32, offset: u32, flags: DataInFlags, stat_sn: u32) -> ScsiDataIn {
    let mut din = ScsiDataIn::new(itt);
    din.flags = flags.bits();
    din.buffer_offset.set(offset);
    din.stat_sn.set(stat_sn);
    din.exp_cmd_sn.set(2);
    din
}

#[test]
fn read10_cdb_layout() {
    let cmd = read10_command(0x0102_0304, 8, 512);
    assert_eq!(cmd.cdb[0], 0x28);
    assert_eq!(&cmd.cdb[2..6], &[0x01, 0x02, 0x03, 0x04]);
    assert_eq!(&cmd.cdb[7..9], &[0x00, 0x08]);
    assert_eq!(cmd.data_in.len(), 4096);
    assert!(cmd.data_out.is_empty());
}

#[test]
fn data_in_lands_at_offsets_and_completes_on_status() -> Result<()> {
    let mut session = new_session(AuthConfig::default())?;
    let cmd = login_and_issue(&mut session, read10_command(0, 2, 512))?;
    let itt = cmd.initiator_task_tag.get();
    assert_eq!(cmd.expected_data_transfer_length.get(), 1024);

    let first: Vec<u8> = (0..512u32).map(|i| i as u8).collect();
    let second: Vec<u8> = (0..512u32).map(|i| (i as u8) ^ 0xff).collect();

    let mut wire = encode(data_in(itt, 0, DataInFlags::empty(), 0), &first);
    wire.extend(encode(
        data_in(itt, 512, DataInFlags::FINAL | DataInFlags::S, 3),
        &second,
    ));

    let mut chunks = wire.chunks(7).peekable();
    while let Some(chunk) = chunks.next() {
        if chunks.peek().is_some() {
            session.deliver(chunk);
            assert!(session.take_completion().is_none());
        } else {
            session.deliver(chunk);
        }
    }

    let done = session.take_completion().context("command not completed")?;
    assert_eq!(done.result, Ok(()));
    assert_eq!(done.command.status, scsi_status::GOOD);
    assert_eq!(&done.command.data_in[..512], first.as_slice());
    assert_eq!(&done.command.data_in[512..], second.as_slice());
    assert!(!session.is_busy());
    assert!(session.transport().close_reasons().is_empty());
    Ok(())
}

#[test]
fn data_in_without_status_waits_for_response() -> Result<()> {
    let mut session = new_session(AuthConfig::default())?;
    let cmd = login_and_issue(&mut session, read10_command(0, 1, 512))?;
    let itt = cmd.initiator_task_tag.get();

    let mut din = data_in(itt, 0, DataInFlags::FINAL, 0);
    din.residual_count.set(512);
    session.deliver(&encode(din, &[0xab; 256]));
    assert!(session.take_completion().is_none());
    assert!(session.is_busy());

    let mut rsp = ScsiCommandResponse::new(itt);
    rsp.flags |= ScsiCommandResponseFlags::U_BIG.bits();
    rsp.residual_count.set(256);
    session.deliver(&encode(rsp, &[]));

    let done = session.take_completion().context("command not completed")?;
    assert_eq!(done.result, Ok(()));
    assert_eq!(done.command.residual, 256);
    assert!(done.command.data_in[..256].iter().all(|&b| b == 0xab));
    assert!(done.command.data_in[256..].iter().all(|&b| b == 0));
    Ok(())
}

#[test]
fn sense_code_is_captured_byte_by_byte() -> Result<()> {
    let mut session = new_session(AuthConfig::default())?;
    let cmd = login_and_issue(&mut session, read10_command(0, 1, 512))?;

    let mut rsp = ScsiCommandResponse::new(cmd.initiator_task_tag.get());
    rsp.status = scsi_status::CHECK_CONDITION;
    // SenseLength, then fixed-format sense data.
    let mut sense = vec![0x00, 0x12, 0x70, 0x00, 0x05];
    sense.resize(2 + 0x12, 0);

    for byte in encode(rsp, &sense) {
        session.deliver(&[byte]);
    }

    let done = session.take_completion().context("command not completed")?;
    assert_eq!(done.result, Ok(()));
    assert_eq!(done.command.status, scsi_status::CHECK_CONDITION);
    assert_eq!(done.command.sense_response, 0x70);
    Ok(())
}

#[test]
fn target_failure_response_is_io_error() -> Result<()> {
    let mut session = new_session(AuthConfig::default())?;
    let cmd = login_and_issue(&mut session, read10_command(0, 1, 512))?;

    let mut rsp = ScsiCommandResponse::new(cmd.initiator_task_tag.get());
    rsp.response = 0x01;
    session.deliver(&encode(rsp, &[]));

    let done = session.take_completion().context("command not completed")?;
    assert!(matches!(done.result, Err(IscsiError::Io(_))));
    // The connection itself is fine.
    assert!(session.status().is_full_feature());
    assert!(session.transport().close_reasons().is_empty());
    Ok(())
}

#[test]
fn data_in_outside_buffer_reconnects() -> Result<()> {
    let mut session = new_session(AuthConfig::default())?;
    let cmd = login_and_issue(&mut session, read10_command(0, 1, 512))?;

    let din = data_in(cmd.initiator_task_tag.get(), 500, DataInFlags::S, 0);
    session.deliver(&encode(din, &[0u8; 64]));

    assert!(matches!(
        session.transport().close_reasons(),
        [Some(IscsiError::Protocol(_))]
    ));
    assert_eq!(session.transport().open_count(), 2);
    assert!(session.is_busy());
    assert!(session.take_completion().is_none());
    Ok(())
}

#[test]
fn data_in_status_sequence_tracking() -> Result<()> {
    let mut session = new_session(AuthConfig::default())?;
    let cmd = login_and_issue(&mut session, read10_command(0, 1, 512))?;
    let itt = cmd.initiator_task_tag.get();

    // StatSN on a Data-In without S is ignored.
    session.deliver(&encode(data_in(itt, 0, DataInFlags::empty(), 77), &[1u8; 256]));
    session.deliver(&encode(
        data_in(itt, 256, DataInFlags::FINAL | DataInFlags::S, 5),
        &[2u8; 256],
    ));
    session.take_completion().context("command not completed")?;

    session.issue(read10_command(1, 1, 512))?;
    match sent(&mut session)?.as_slice() {
        [(Pdu::ScsiCommandRequest(req), _)] => {
            assert_eq!(req.exp_stat_sn.get(), 6);
            assert_eq!(req.cmd_sn.get(), 2);
        },
        other => anyhow::bail!("expected a SCSI command, got {other:?}"),
    }
    Ok(())
}
