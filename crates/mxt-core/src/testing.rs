//! Scriptable register device for unit tests

use crate::device::RegisterAccess;
use crate::error::{Error, Result};
use crate::info::{DeviceId, InfoBlock, ObjectEntry, REPORT_ID_INVALID};
use crate::objects::types;
use std::collections::VecDeque;

pub(crate) const T5_ADDR: u16 = 0x100;
pub(crate) const T5_SIZE: u16 = 10;
pub(crate) const T6_ADDR: u16 = 0x110;
pub(crate) const T7_ADDR: u16 = 0x120;
pub(crate) const T9_ADDR: u16 = 0x130;
pub(crate) const T25_ADDR: u16 = 0x150;
pub(crate) const T37_ADDR: u16 = 0x160;
pub(crate) const T37_SIZE: u16 = 10;
pub(crate) const T44_ADDR: u16 = 0x170;
pub(crate) const T66_ADDR: u16 = 0x180;
pub(crate) const T68_ADDR: u16 = 0x190;
pub(crate) const T68_SIZE: u16 = 11;

/// Report ids as laid out by `info_block()`
pub(crate) const T6_REPORT_ID: u8 = 1;
pub(crate) const T25_REPORT_ID: u8 = 6;
pub(crate) const T66_REPORT_ID: u8 = 7;

fn entry(object_type: u16, start_address: u16, size: u16, instances: u16, ids: u8) -> ObjectEntry {
    ObjectEntry {
        object_type: object_type as u8,
        start_address,
        size,
        instances,
        num_report_ids: ids,
    }
}

/// Small device: 3x2 matrix, tiny T37 pages, four byte T68 data chunks
pub(crate) fn info_block() -> InfoBlock {
    InfoBlock::new(
        DeviceId {
            family_id: 0xA4,
            variant_id: 0x0C,
            version: 0x10,
            build: 0xAA,
            matrix_x_size: 3,
            matrix_y_size: 2,
            num_objects: 0,
        },
        vec![
            entry(types::GEN_MESSAGEPROCESSOR_T5, T5_ADDR, T5_SIZE, 1, 0),
            entry(types::GEN_COMMANDPROCESSOR_T6, T6_ADDR, 6, 1, 1),
            entry(types::GEN_POWERCONFIG_T7, T7_ADDR, 4, 1, 0),
            entry(9, T9_ADDR, 10, 2, 2),
            entry(types::SPT_SELFTEST_T25, T25_ADDR, 6, 1, 1),
            entry(types::DEBUG_DIAGNOSTIC_T37, T37_ADDR, T37_SIZE, 1, 0),
            entry(types::SPT_MESSAGECOUNT_T44, T44_ADDR, 1, 1, 0),
            entry(types::SPT_GOLDENREFERENCES_T66, T66_ADDR, 5, 1, 1),
            entry(types::SPT_SERIALDATACOMMAND_T68, T68_ADDR, T68_SIZE, 1, 1),
        ],
    )
}

type WriteHook = Box<dyn FnMut(&mut MockState, u16, &[u8])>;

/// Register memory and message queue visible to write hooks
pub(crate) struct MockState {
    pub mem: Vec<u8>,
    pub messages: VecDeque<Vec<u8>>,
}

impl MockState {
    /// Queue a message for `report_id` with the given payload
    pub fn push_message(&mut self, report_id: u8, payload: &[u8]) {
        let mut msg = vec![report_id];
        msg.extend_from_slice(payload);
        self.messages.push_back(msg);
    }
}

/// Flat register memory with the info block at 0
pub(crate) struct MockDevice {
    pub state: MockState,
    pub writes: Vec<(u16, Vec<u8>)>,
    pub fail_writes_at: Option<u16>,
    pub delays: usize,
    hook: Option<WriteHook>,
}

impl MockDevice {
    pub fn new() -> Self {
        let info = info_block().to_bytes();
        let mut mem = vec![0u8; 0x400];
        mem[..info.len()].copy_from_slice(&info);
        Self {
            state: MockState {
                mem,
                messages: VecDeque::new(),
            },
            writes: Vec::new(),
            fail_writes_at: None,
            delays: 0,
            hook: None,
        }
    }

    /// React to writes
    pub fn on_write<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut MockState, u16, &[u8]) + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn mem(&self, addr: u16, len: usize) -> &[u8] {
        let start = usize::from(addr);
        &self.state.mem[start..start + len]
    }

    /// Writes that targeted exactly `addr`
    pub fn writes_to(&self, addr: u16) -> Vec<Vec<u8>> {
        self.writes
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, d)| d.clone())
            .collect()
    }
}

impl RegisterAccess for MockDevice {
    fn read_register(&mut self, addr: u16, buf: &mut [u8]) -> Result<()> {
        if addr == T5_ADDR {
            buf.fill(0);
            match self.state.messages.pop_front() {
                Some(msg) => {
                    let len = msg.len().min(buf.len());
                    buf[..len].copy_from_slice(&msg[..len]);
                }
                None => buf[0] = REPORT_ID_INVALID,
            }
            return Ok(());
        }

        let start = usize::from(addr);
        let end = start + buf.len();
        if end > self.state.mem.len() {
            return Err(Error::Transfer {
                addr,
                len: buf.len(),
                source: std::io::Error::other("out of range"),
            });
        }
        buf.copy_from_slice(&self.state.mem[start..end]);
        Ok(())
    }

    fn write_register(&mut self, addr: u16, data: &[u8]) -> Result<()> {
        if self.fail_writes_at == Some(addr) {
            return Err(Error::Transfer {
                addr,
                len: data.len(),
                source: std::io::Error::other("nack"),
            });
        }

        let start = usize::from(addr);
        self.state.mem[start..start + data.len()].copy_from_slice(data);
        self.writes.push((addr, data.to_vec()));

        if let Some(hook) = self.hook.as_mut() {
            hook(&mut self.state, addr, data);
        }
        Ok(())
    }

    fn delay_ms(&mut self, _ms: u32) {
        self.delays += 1;
    }
}
