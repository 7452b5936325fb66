// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Result, bail};
use bytes::Bytes;
use iscsi_sanboot::{
    client::transport::{BufferedTransport, Transport},
    models::{
        common::{BasicHeaderSegment, HEADER_LEN},
        data::response::ScsiDataIn,
        login::request::LoginRequestBuilder,
        parse::Pdu,
        ready_2_transfer::response::ReadyToTransfer,
    },
    state_machine::{
        rx_states::{RxEngine, RxState},
        tx_states::{TxEngine, TxPayload, TxProgress, TxState},
    },
};

use crate::unit_tests::common::parse_pdus;

/// Drain `engine` through a transport whose window is `window` bytes,
/// emptying it between steps. Returns the bytes sent and the step count.
fn drain(engine: &mut TxEngine, window: usize) -> Result<(Vec<u8>, usize)> {
    let mut transport = BufferedTransport::new(window);
    let mut wire = Vec::new();
    for steps in 1..=10_000 {
        let progress = engine.step(&mut transport)?;
        wire.extend_from_slice(&transport.take_outbound());
        match progress {
            TxProgress::Done(_) => return Ok((wire, steps)),
            TxProgress::Blocked => continue,
            TxProgress::Idle => bail!("engine went idle without finishing"),
        }
    }
    bail!("engine did not finish")
}

#[test]
fn tx_reaches_idle_for_every_window() -> Result<()> {
    for window in [1usize, 3, 7, 48, 49, 4096] {
        let mut engine = TxEngine::new();
        let header = LoginRequestBuilder::new().initiator_task_tag(1).build();
        engine.start(Pdu::LoginRequest(header), TxPayload::Owned(b"A=1\0B".to_vec()));

        let (wire, steps) = drain(&mut engine, window)?;
        assert!(engine.is_idle());
        assert_eq!(engine.state(), TxState::Idle);
        assert_eq!(wire.len(), HEADER_LEN + 8, "window {window}");
        assert!(steps <= wire.len() + 1);

        let pdus = parse_pdus(&wire)?;
        assert_eq!(pdus.len(), 1);
        assert_eq!(pdus[0].1, b"A=1\0B".to_vec());
    }
    Ok(())
}

#[test]
fn tx_sends_a_shared_data_out_slice() -> Result<()> {
    let buffer: Bytes = (0..=255u8).cycle().take(2048).collect();
    let mut engine = TxEngine::new();
    engine.start(
        Pdu::ScsiDataIn(ScsiDataIn::new(1)),
        TxPayload::DataOut(buffer.slice(1000..1006)),
    );
    let (wire, _) = drain(&mut engine, 5)?;
    assert_eq!(&wire[HEADER_LEN..HEADER_LEN + 6], &buffer[1000..1006]);
    assert_eq!(&wire[HEADER_LEN + 6..], &[0, 0]);
    Ok(())
}

#[test]
fn tx_blocks_on_closed_window_without_losing_bytes() -> Result<()> {
    let mut engine = TxEngine::new();
    engine.start(Pdu::ReadyToTransfer(ReadyToTransfer::new(1, 2, 0, 512)), TxPayload::Empty);

    let mut transport = BufferedTransport::new(20);
    assert_eq!(engine.step(&mut transport)?, TxProgress::Blocked);
    assert_eq!(transport.window(), 0);
    assert_eq!(engine.step(&mut transport)?, TxProgress::Blocked);
    assert_eq!(engine.state(), TxState::Bhs);

    let mut wire = transport.take_outbound().to_vec();
    transport.set_capacity(64);
    assert!(matches!(engine.step(&mut transport)?, TxProgress::Done(Pdu::ReadyToTransfer(_))));
    wire.extend_from_slice(&transport.take_outbound());
    assert_eq!(wire.len(), HEADER_LEN);
    assert_eq!(engine.step(&mut transport)?, TxProgress::Idle);
    Ok(())
}

#[test]
#[should_panic(expected = "TX engine busy")]
fn tx_refuses_a_second_pdu_in_flight() {
    let mut engine = TxEngine::new();
    engine.start(Pdu::ScsiDataIn(ScsiDataIn::new(1)), TxPayload::Empty);
    engine.start(Pdu::ScsiDataIn(ScsiDataIn::new(2)), TxPayload::Empty);
}

#[test]
fn rx_walks_every_segment_byte_by_byte() -> Result<()> {
    let mut header = ScsiDataIn::new(3);
    header.set_lengths(1, 5);
    let mut wire = header.bhs_bytes().to_vec();
    wire.extend_from_slice(&[0xee; 4]); // AHS
    wire.extend_from_slice(b"hello");
    wire.extend_from_slice(&[0; 3]);

    let mut rx = RxEngine::new();
    let mut states = Vec::new();
    let mut data = Vec::new();
    let mut last_remaining = None;
    for byte in wire.chunks(1) {
        let mut input = byte;
        while let Some(fragment) = rx.receive(&mut input)? {
            if !fragment.data.is_empty() || fragment.remaining == 0 {
                states.push(fragment.state);
            }
            if fragment.state == RxState::Data {
                assert_eq!(fragment.offset, data.len());
                data.extend_from_slice(fragment.data);
                last_remaining = Some(fragment.remaining);
            }
        }
    }

    let count = |s: RxState| states.iter().filter(|&&x| x == s).count();
    assert_eq!(count(RxState::Bhs), HEADER_LEN);
    assert_eq!(count(RxState::Ahs), 4);
    assert_eq!(count(RxState::Data), 5);
    assert_eq!(count(RxState::DataPadding), 3);
    assert_eq!(data, b"hello");
    assert_eq!(last_remaining, Some(0));
    assert_eq!(rx.state(), RxState::Bhs);
    assert!(matches!(rx.header(), Pdu::ScsiDataIn(h) if h.initiator_task_tag.get() == 3));
    Ok(())
}

#[test]
fn rx_signals_empty_data_segment_once() -> Result<()> {
    let wire = ReadyToTransfer::new(1, 2, 0, 512).bhs_bytes().to_vec();
    let mut rx = RxEngine::new();
    let mut input = wire.as_slice();
    let mut fragments = Vec::new();
    while let Some(fragment) = rx.receive(&mut input)? {
        fragments.push((fragment.state, fragment.data.len(), fragment.remaining));
    }
    assert_eq!(
        fragments,
        vec![
            (RxState::Bhs, HEADER_LEN, 0),
            (RxState::Ahs, 0, 0),
            (RxState::Data, 0, 0),
            (RxState::DataPadding, 0, 0),
        ]
    );
    assert_eq!(rx.state(), RxState::Bhs);
    Ok(())
}
