// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A tiny in-process iSCSI target serving a RAM disk over loopback TCP.

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::{Context, Result, bail};
use iscsi_sanboot::{
    cfg::config::{AuthConfig, RuntimeConfig},
    client::session::SessionConfig,
    models::{
        command::{
            common::scsi_status, request::ScsiCommandRequest, response::ScsiCommandResponse,
        },
        common::{BasicHeaderSegment, HEADER_LEN, pad_len},
        data::{common::DataInFlags, response::ScsiDataIn},
        login::{common::Stage, request::LoginRequest, response::LoginResponse},
        parse::Pdu,
        ready_2_transfer::response::ReadyToTransfer,
        text::builder::OperationalParams,
    },
};
use md5::{Digest, Md5};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};
use tracing::debug;

pub const BLOCK_LEN: usize = 512;
pub const TARGET_IQN: &str = "iqn.2004-04.com.example:ramdisk";
pub const INITIATOR_IQN: &str = "iqn.2010-04.org.ipxe:loopback";

const CHAP_ID: u8 = 1;
const CHAP_CHALLENGE: [u8; 16] = [0x3c; 16];
const DATA_IN_CHUNK: usize = 1024;

#[derive(Debug, Clone, Default)]
pub struct TargetOptions {
    /// Demand forward CHAP with these credentials.
    pub chap: Option<(String, String)>,
    /// Hang up on the first connection right after its first Login Request.
    pub drop_first_connection: bool,
    /// Read everything, answer nothing.
    pub silent: bool,
}

pub struct LoopbackTarget {
    pub addr: SocketAddr,
    pub disk: Arc<Mutex<Vec<u8>>>,
    pub connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl LoopbackTarget {
    pub async fn start(blocks: usize, options: TargetOptions) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let disk = Arc::new(Mutex::new(vec![0u8; blocks * BLOCK_LEN]));
        let connections = Arc::new(AtomicUsize::new(0));

        let task = {
            let disk = Arc::clone(&disk);
            let connections = Arc::clone(&connections);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let index = connections.fetch_add(1, Ordering::SeqCst);
                    let conn = TargetConnection {
                        stream,
                        index,
                        options: options.clone(),
                        disk: Arc::clone(&disk),
                        stat_sn: 0,
                    };
                    tokio::spawn(async move {
                        if let Err(e) = conn.serve().await {
                            debug!(error = %e, "loopback target connection ended");
                        }
                    });
                }
            })
        };

        Ok(Self {
            addr,
            disk,
            connections,
            task,
        })
    }

    pub fn session_config(&self, auth: AuthConfig) -> SessionConfig {
        SessionConfig {
            target_address: self.addr.ip().to_string(),
            target_port: self.addr.port(),
            target_iqn: TARGET_IQN.to_string(),
            initiator_iqn: INITIATOR_IQN.to_string(),
            lun: 0,
            auth,
            operational: OperationalParams::default(),
        }
    }

    pub fn root_path(&self) -> String {
        format!("iscsi:{}::{}:0:{TARGET_IQN}", self.addr.ip(), self.addr.port())
    }
}

impl Drop for LoopbackTarget {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn runtime() -> RuntimeConfig {
    RuntimeConfig {
        timeout_connection: Duration::from_secs(5),
        timeout_io: Duration::from_secs(5),
        tx_window: 4096,
    }
}

pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

/// Serialize a PDU with its data segment and padding.
pub fn encode(header: impl Into<Pdu>, data: &[u8]) -> Vec<u8> {
    let mut header: Pdu = header.into();
    header.set_lengths(0, data.len() as u32);
    let mut out = header.bhs_bytes().to_vec();
    out.extend_from_slice(data);
    out.resize(out.len() + pad_len(data.len()), 0);
    out
}

/// Read one PDU; `None` on a clean end of stream.
pub async fn read_pdu(stream: &mut TcpStream) -> Result<Option<(Pdu, Vec<u8>)>> {
    let mut bhs = [0u8; HEADER_LEN];
    match stream.read_exact(&mut bhs).await {
        Ok(_) => {},
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let pdu = Pdu::from_bhs_bytes(&bhs)?;
    let lengths = pdu.lengths();
    let mut rest = vec![0u8; lengths.ahs_len() + lengths.data_len() + lengths.pad_len()];
    stream.read_exact(&mut rest).await?;
    let start = lengths.ahs_len();
    Ok(Some((pdu, rest[start..start + lengths.data_len()].to_vec())))
}

fn text_pairs(data: &[u8]) -> Vec<(String, String)> {
    data.split(|&b| b == 0)
        .filter_map(|r| {
            let r = String::from_utf8_lossy(r);
            r.split_once('=').map(|(k, v)| (k.to_string(), v.to_string()))
        })
        .collect()
}

fn kv(pairs: &[(&str, &str)]) -> Vec<u8> {
    pairs
        .iter()
        .flat_map(|(k, v)| format!("{k}={v}\0").into_bytes())
        .collect()
}

struct TargetConnection {
    stream: TcpStream,
    index: usize,
    options: TargetOptions,
    disk: Arc<Mutex<Vec<u8>>>,
    stat_sn: u32,
}

impl TargetConnection {
    async fn serve(mut self) -> Result<()> {
        while let Some((pdu, data)) = read_pdu(&mut self.stream).await? {
            if self.options.silent {
                continue;
            }
            match pdu {
                Pdu::LoginRequest(req) => {
                    if self.options.drop_first_connection && self.index == 0 {
                        debug!("loopback target hanging up");
                        return Ok(());
                    }
                    let reply = self.login_reply(&req, &data);
                    self.stream.write_all(&reply).await?;
                },
                Pdu::ScsiCommandRequest(cmd) => self.command(&cmd).await?,
                other => bail!("loopback target got unexpected {other:?}"),
            }
        }
        Ok(())
    }

    fn next_stat_sn(&mut self) -> u32 {
        let sn = self.stat_sn;
        self.stat_sn = self.stat_sn.wrapping_add(1);
        sn
    }

    fn login_reply(&mut self, req: &LoginRequest, text: &[u8]) -> Vec<u8> {
        let keys = text_pairs(text);
        let get = |key: &str| {
            keys.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        let mut rsp = LoginResponse::new(req.initiator_task_tag.get());
        rsp.isid = req.isid;
        rsp.stat_sn.set(self.next_stat_sn());
        rsp.exp_cmd_sn.set(req.cmd_sn.get());
        rsp.max_cmd_sn.set(req.cmd_sn.get().wrapping_add(1));

        let mut out = Vec::new();
        match (req.flags.csg(), &self.options.chap) {
            (Some(Stage::Security), None) => {
                out = kv(&[("AuthMethod", "None"), ("TargetAlias", "ramdisk")]);
                rsp.set_transit(Stage::Security, Stage::Operational);
            },
            (Some(Stage::Security), Some((user, secret))) => {
                if get("AuthMethod").is_some() {
                    out = kv(&[("AuthMethod", "CHAP")]);
                } else if get("CHAP_A").is_some() {
                    let challenge = format!("0x{}", hex::encode(CHAP_CHALLENGE));
                    out = kv(&[
                        ("CHAP_A", "5"),
                        ("CHAP_I", &CHAP_ID.to_string()),
                        ("CHAP_C", &challenge),
                    ]);
                } else {
                    let mut h = Md5::new();
                    h.update([CHAP_ID]);
                    h.update(secret.as_bytes());
                    h.update(CHAP_CHALLENGE);
                    let expected = format!("0x{}", hex::encode(h.finalize()));
                    if get("CHAP_N") == Some(user.as_str())
                        && get("CHAP_R") == Some(expected.as_str())
                    {
                        rsp.set_transit(Stage::Security, Stage::Operational);
                    } else {
                        rsp.status_class = 0x02;
                        rsp.status_detail = 0x01;
                    }
                }
            },
            (Some(Stage::Operational), _) => {
                out = kv(&[
                    ("HeaderDigest", "None"),
                    ("DataDigest", "None"),
                    ("MaxRecvDataSegmentLength", "8192"),
                ]);
                rsp.set_transit(Stage::Operational, Stage::FullFeature);
                rsp.tsih.set(0x0a0b);
            },
            _ => {
                rsp.status_class = 0x02;
                rsp.status_detail = 0x00;
            },
        }
        encode(rsp, &out)
    }

    async fn command(&mut self, cmd: &ScsiCommandRequest) -> Result<()> {
        let itt = cmd.initiator_task_tag.get();
        let exp_cmd_sn = cmd.cmd_sn.get().wrapping_add(1);
        let cdb = cmd.scsi_descriptor_block;
        let lba = u32::from_be_bytes([cdb[2], cdb[3], cdb[4], cdb[5]]) as usize;
        let blocks = usize::from(u16::from_be_bytes([cdb[7], cdb[8]]));

        match cdb[0] {
            0x25 => {
                let max_lba = self.disk_len()? / BLOCK_LEN - 1;
                let mut data = (max_lba as u32).to_be_bytes().to_vec();
                data.extend_from_slice(&(BLOCK_LEN as u32).to_be_bytes());
                self.send_data_in(itt, exp_cmd_sn, &data).await
            },
            0x28 => {
                let data = {
                    let disk = self.disk.lock().map_err(|_| anyhow::anyhow!("disk poisoned"))?;
                    disk.get(lba * BLOCK_LEN..(lba + blocks) * BLOCK_LEN)
                        .context("read past the end of the RAM disk")?
                        .to_vec()
                };
                self.send_data_in(itt, exp_cmd_sn, &data).await
            },
            0x2A => {
                let len = cmd.expected_data_transfer_length.get();
                let mut r2t = ReadyToTransfer::new(itt, 0x1000 + itt, 0, len);
                r2t.stat_sn.set(self.stat_sn);
                r2t.exp_cmd_sn.set(exp_cmd_sn);
                r2t.max_cmd_sn.set(exp_cmd_sn);
                self.stream.write_all(&encode(r2t, &[])).await?;

                let mut buf = vec![0u8; len as usize];
                loop {
                    let Some((pdu, data)) = read_pdu(&mut self.stream).await? else {
                        bail!("initiator hung up during Data-Out");
                    };
                    let Pdu::ScsiDataOut(out) = pdu else {
                        bail!("expected Data-Out, got {pdu:?}");
                    };
                    let offset = out.buffer_offset.get() as usize;
                    buf.get_mut(offset..offset + data.len())
                        .context("Data-Out outside the solicited window")?
                        .copy_from_slice(&data);
                    if out.is_final() {
                        break;
                    }
                }
                {
                    let mut disk =
                        self.disk.lock().map_err(|_| anyhow::anyhow!("disk poisoned"))?;
                    disk.get_mut(lba * BLOCK_LEN..lba * BLOCK_LEN + buf.len())
                        .context("write past the end of the RAM disk")?
                        .copy_from_slice(&buf);
                }
                self.send_response(itt, exp_cmd_sn, scsi_status::GOOD, &[]).await
            },
            _ => {
                // ILLEGAL REQUEST / INVALID COMMAND OPERATION CODE
                let mut sense = vec![0x00, 0x12, 0x70, 0x00, 0x05];
                sense.resize(2 + 0x12, 0);
                sense[2 + 12] = 0x20;
                self.send_response(itt, exp_cmd_sn, scsi_status::CHECK_CONDITION, &sense)
                    .await
            },
        }
    }

    fn disk_len(&self) -> Result<usize> {
        Ok(self
            .disk
            .lock()
            .map_err(|_| anyhow::anyhow!("disk poisoned"))?
            .len())
    }

    async fn send_data_in(&mut self, itt: u32, exp_cmd_sn: u32, data: &[u8]) -> Result<()> {
        let count = data.chunks(DATA_IN_CHUNK).count();
        for (i, chunk) in data.chunks(DATA_IN_CHUNK).enumerate() {
            let mut din = ScsiDataIn::new(itt);
            din.data_sn.set(i as u32);
            din.buffer_offset.set((i * DATA_IN_CHUNK) as u32);
            din.exp_cmd_sn.set(exp_cmd_sn);
            din.max_cmd_sn.set(exp_cmd_sn);
            if i + 1 == count {
                din.flags = (DataInFlags::FINAL | DataInFlags::S).bits();
                din.status = scsi_status::GOOD;
                din.stat_sn.set(self.next_stat_sn());
            }
            self.stream.write_all(&encode(din, chunk)).await?;
        }
        Ok(())
    }

    async fn send_response(
        &mut self,
        itt: u32,
        exp_cmd_sn: u32,
        status: u8,
        sense: &[u8],
    ) -> Result<()> {
        let mut rsp = ScsiCommandResponse::new(itt);
        rsp.status = status;
        rsp.stat_sn.set(self.next_stat_sn());
        rsp.exp_cmd_sn.set(exp_cmd_sn);
        rsp.max_cmd_sn.set(exp_cmd_sn);
        self.stream.write_all(&encode(rsp, sense)).await?;
        Ok(())
    }
}
