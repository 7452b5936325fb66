// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Full-feature phase: SCSI Command out, SCSI Response / Data-In / R2T in,
//! and the solicited Data-Out sequence.

use md5::Digest;
use tracing::debug;

use crate::{
    client::{
        session::{Session, Transfer},
        transport::Transport,
    },
    error::IscsiError,
    models::{
        command::{
            common::{ResponseCode, SENSE_RESPONSE_CODE_OFFSET},
            request::ScsiCommandRequestBuilder,
            response::ScsiCommandResponse,
        },
        data::{request::ScsiDataOut, response::ScsiDataIn},
        parse::Pdu,
        ready_2_transfer::response::ReadyToTransfer,
    },
    state_machine::tx_states::TxPayload,
};

/// Data-Out PDUs carry at most this many bytes, which stays below any
/// MaxRecvDataSegmentLength a target may declare.
pub const DATA_OUT_CHUNK: usize = 512;

fn no_command(what: &str) -> IscsiError {
    IscsiError::Protocol(format!("{what} without an outstanding command"))
}

impl<T: Transport, D: Digest> Session<T, D> {
    /// Send the SCSI Command PDU for the outstanding command.
    pub(crate) fn start_command(&mut self) -> Result<(), IscsiError> {
        if !self.tx.is_idle() {
            return Err(IscsiError::Protocol(
                "cannot start a command while a PDU is being sent".to_string(),
            ));
        }
        let itt = self.next_itt();
        let command = self.command.as_ref().ok_or_else(|| no_command("command start"))?;

        let mut builder = ScsiCommandRequestBuilder::new()
            .lun(self.lun)
            .initiator_task_tag(itt)
            .cmd_sn(self.cmd_sn)
            .exp_stat_sn(self.stat_sn.wrapping_add(1))
            .expected_data_transfer_length(command.expected_transfer_len() as u32)
            .scsi_descriptor_block(&command.cdb);
        if !command.data_in.is_empty() {
            builder = builder.read();
        }
        if !command.data_out.is_empty() {
            builder = builder.write();
        }

        debug!(
            itt,
            cmd_sn = self.cmd_sn,
            cdb = %hex::encode(command.cdb),
            in_len = command.data_in.len(),
            out_len = command.data_out.len(),
            "scsi command"
        );
        self.tx.start(Pdu::ScsiCommandRequest(builder.build()), TxPayload::Empty);
        Ok(())
    }

    /// SCSI Response. The sense response code is picked out of the data
    /// segment as it streams past.
    pub(crate) fn rx_scsi_response(
        &mut self,
        rsp: &ScsiCommandResponse,
        data: &[u8],
        offset: usize,
        remaining: usize,
    ) -> Result<(), IscsiError> {
        let sense_code = SENSE_RESPONSE_CODE_OFFSET
            .checked_sub(offset)
            .and_then(|idx| data.get(idx));
        if let (Some(command), Some(code)) = (self.command.as_mut(), sense_code) {
            command.sense_response = *code;
        }
        if remaining > 0 {
            return Ok(());
        }

        let command = self.command.as_mut().ok_or_else(|| no_command("SCSI response"))?;
        command.status = rsp.status;
        command.residual = rsp.residual();
        debug!(
            response = rsp.response,
            status = rsp.status,
            sense = command.sense_response,
            residual = command.residual,
            "scsi response"
        );

        if rsp.response == ResponseCode::CommandCompleted as u8 {
            self.scsi_done(Ok(()));
        } else {
            self.scsi_done(Err(IscsiError::Io(format!(
                "target failed the command (response {:#04x})",
                rsp.response
            ))));
        }
        Ok(())
    }

    /// Data-In: copied straight into the read buffer at the PDU's offset.
    pub(crate) fn rx_data_in(
        &mut self,
        din: &ScsiDataIn,
        data: &[u8],
        offset: usize,
        remaining: usize,
    ) -> Result<(), IscsiError> {
        let command = self.command.as_mut().ok_or_else(|| no_command("Data-In"))?;

        let start = din.buffer_offset.get() as usize + offset;
        let end = start + data.len();
        let buf_len = command.data_in.len();
        let dest = command.data_in.get_mut(start..end).ok_or_else(|| {
            IscsiError::Protocol(format!(
                "Data-In {start}..{end} outside {buf_len}-byte read buffer"
            ))
        })?;
        dest.copy_from_slice(data);

        if remaining > 0 || !din.has_status() {
            return Ok(());
        }

        command.status = din.status;
        command.residual = din.residual();
        debug!(status = din.status, residual = command.residual, "data-in status");
        self.scsi_done(Ok(()));
        Ok(())
    }

    /// R2T: remember the solicited window and start answering it.
    pub(crate) fn rx_r2t(
        &mut self,
        r2t: &ReadyToTransfer,
        remaining: usize,
    ) -> Result<(), IscsiError> {
        if remaining > 0 {
            return Ok(());
        }
        let command = self.command.as_ref().ok_or_else(|| no_command("R2T"))?;

        let transfer = Transfer {
            ttt: r2t.target_transfer_tag.get(),
            offset: r2t.buffer_offset.get() as usize,
            len: r2t.desired_data_transfer_length.get() as usize,
        };
        if transfer.len == 0 || transfer.offset + transfer.len > command.data_out.len() {
            return Err(IscsiError::Protocol(format!(
                "R2T {}+{} outside {}-byte write buffer",
                transfer.offset,
                transfer.len,
                command.data_out.len()
            )));
        }

        debug!(
            ttt = transfer.ttt,
            offset = transfer.offset,
            len = transfer.len,
            "r2t"
        );
        self.transfer = transfer;
        self.start_data_out(0)
    }

    /// Send Data-Out number `data_sn` of the current transfer.
    pub(crate) fn start_data_out(&mut self, data_sn: u32) -> Result<(), IscsiError> {
        if !self.tx.is_idle() {
            return Err(IscsiError::Protocol(
                "R2T received while a PDU is being sent".to_string(),
            ));
        }

        let sent = data_sn as usize * DATA_OUT_CHUNK;
        let len = DATA_OUT_CHUNK.min(self.transfer.len.saturating_sub(sent));
        let offset = self.transfer.offset + sent;
        let buffer = &self
            .command
            .as_ref()
            .ok_or_else(|| no_command("Data-Out"))?
            .data_out;
        if offset + len > buffer.len() {
            return Err(IscsiError::Protocol(format!(
                "Data-Out {offset}+{len} outside {}-byte write buffer",
                buffer.len()
            )));
        }
        let chunk = buffer.slice(offset..offset + len);

        let mut header = ScsiDataOut::new();
        header.lun.set(self.lun);
        header.initiator_task_tag.set(self.itt);
        header.target_transfer_tag.set(self.transfer.ttt);
        header.exp_stat_sn.set(self.stat_sn.wrapping_add(1));
        header.data_sn.set(data_sn);
        header.buffer_offset.set(offset as u32);
        if sent + len >= self.transfer.len {
            header.set_final();
        }

        debug!(data_sn, offset, len, last = header.is_final(), "data-out");
        self.tx.start(
            Pdu::ScsiDataOut(header),
            TxPayload::DataOut(chunk),
        );
        Ok(())
    }
}
