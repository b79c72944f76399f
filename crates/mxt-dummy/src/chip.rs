//! Emulated controller state
//!
//! One `DummyChip` is shared by every connection a `DummyConnector` hands
//! out, so register contents, the message queue and the current mode
//! survive a reconnect the way a real part does.

use crate::DummyConfig;

use mxt_core::bootloader::{status as boot_status, UNLOCK_CMD};
use mxt_core::crc::crc24;
use mxt_core::info::{DeviceId, InfoBlock, ObjectEntry, REPORT_ID_INVALID};
use mxt_core::objects::{t25, t37, t6, t66, t68, types, NON_CONFIG_OBJECTS};
use mxt_core::{Error, Result};

use std::collections::VecDeque;

/// Size of the emulated register space
const MEMORY_SIZE: usize = 0x400;

/// First object address, right after room for the info block
const OBJECT_BASE: u16 = 0x100;

/// Bootloader ID and version reported in the extended ID
const BOOTLOADER_ID: u8 = 0x12;
const BOOTLOADER_VERSION: u8 = 0x07;

/// Object table: type, size, instances, report ids per instance
const OBJECTS: &[(u16, u16, u16, u8)] = &[
    (types::GEN_MESSAGEPROCESSOR_T5, 10, 1, 0),
    (types::GEN_COMMANDPROCESSOR_T6, 6, 1, 1),
    (types::GEN_POWERCONFIG_T7, 4, 1, 0),
    (9, 36, 2, 2),
    (types::SPT_SELFTEST_T25, 6, 1, 1),
    (types::DEBUG_DIAGNOSTIC_T37, 130, 1, 0),
    (types::SPT_MESSAGECOUNT_T44, 1, 1, 0),
    (types::SPT_GOLDENREFERENCES_T66, 5, 1, 1),
    (types::SPT_SERIALDATACOMMAND_T68, 39, 1, 1),
];

/// Which firmware the chip is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Application firmware, registers accessible
    Application,
    /// Bootloader, waiting for firmware
    Bootloader,
}

/// Counters tests use to check how the chip was driven
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DummyStats {
    /// Application mode connections opened
    pub connects: usize,
    /// Application mode connections released
    pub releases: usize,
    /// Bootloader connections opened
    pub bootloader_connects: usize,
    /// Bootloader connections released
    pub bootloader_releases: usize,
    /// Calls enabling kernel message debug
    pub debug_enables: usize,
    /// Calls disabling kernel message debug
    pub debug_disables: usize,
    /// Normal resets
    pub resets: usize,
    /// Backups to non-volatile memory
    pub backups: usize,
    /// Calibrations
    pub calibrations: usize,
    /// Golden reference stores
    pub golden_stores: usize,
    /// Register writes
    pub writes: usize,
}

#[derive(Debug, Default)]
struct BootEmulator {
    unlocked: bool,
    pending: VecDeque<u8>,
    crc_failures_left: u32,
    frames: Vec<Vec<u8>>,
}

/// Emulated maXTouch controller
#[derive(Debug)]
pub struct DummyChip {
    config: DummyConfig,
    info: InfoBlock,
    mem: Vec<u8>,
    nvram: Option<Vec<u8>>,
    messages: VecDeque<Vec<u8>>,
    mode: Mode,
    golden_state: u8,
    serial_buffer: Vec<u8>,
    serial_data: Option<(u16, Vec<u8>)>,
    boot: BootEmulator,
    stats: DummyStats,
}

fn covers(addr: u16, len: usize, reg: u16) -> bool {
    reg >= addr && usize::from(reg - addr) < len
}

fn build_info(config: &DummyConfig) -> InfoBlock {
    let mut next = OBJECT_BASE;
    let objects = OBJECTS
        .iter()
        .map(|&(object_type, size, instances, ids)| {
            let entry = ObjectEntry {
                object_type: object_type as u8,
                start_address: next,
                size,
                instances,
                num_report_ids: ids,
            };
            next += size * instances;
            entry
        })
        .collect();

    InfoBlock::new(
        DeviceId {
            family_id: config.family_id,
            variant_id: config.variant_id,
            version: config.version,
            build: config.build,
            matrix_x_size: config.matrix_x_size,
            matrix_y_size: config.matrix_y_size,
            num_objects: 0,
        },
        objects,
    )
}

impl DummyChip {
    /// Power up a chip with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let info = build_info(&config);
        let mut chip = Self {
            boot: BootEmulator {
                crc_failures_left: config.frame_crc_failures,
                ..Default::default()
            },
            config,
            info,
            mem: vec![0u8; MEMORY_SIZE],
            nvram: None,
            messages: VecDeque::new(),
            mode: Mode::Application,
            golden_state: t66::STATE_IDLE,
            serial_buffer: Vec::new(),
            serial_data: None,
            stats: DummyStats::default(),
        };
        chip.write_info();
        chip
    }

    fn write_info(&mut self) {
        let bytes = self.info.to_bytes();
        self.mem[..bytes.len()].copy_from_slice(&bytes);
        if self.config.corrupt_info_crc {
            let last = bytes.len() - 1;
            self.mem[last] ^= 0xFF;
        }
    }

    /// Info block as the chip reports it
    pub fn info(&self) -> &InfoBlock {
        &self.info
    }

    /// Current mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Counters
    pub fn stats(&self) -> &DummyStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut DummyStats {
        &mut self.stats
    }

    /// Register contents
    pub fn mem(&self, addr: u16, len: usize) -> &[u8] {
        let start = usize::from(addr);
        &self.mem[start..start + len]
    }

    /// Register contents saved by the last backup
    pub fn nvram(&self) -> Option<&[u8]> {
        self.nvram.as_deref()
    }

    /// Last completed T68 transfer: datatype and data
    pub fn serial_data(&self) -> Option<&(u16, Vec<u8>)> {
        self.serial_data.as_ref()
    }

    /// Frames accepted by the bootloader since it was entered
    pub fn frames(&self) -> &[Vec<u8>] {
        &self.boot.frames
    }

    /// Put the chip into bootloader mode without going through T6
    pub fn enter_bootloader(&mut self) {
        log::debug!("dummy: entering bootloader");
        self.mode = Mode::Bootloader;
        self.boot = BootEmulator {
            crc_failures_left: self.config.frame_crc_failures,
            ..Default::default()
        };
    }

    fn base(&self, object_type: u16) -> u16 {
        self.info
            .require(object_type, 0)
            .map(|a| a.base)
            .unwrap_or(0)
    }

    fn report_id(&self, object_type: u16, instance: u8) -> u8 {
        (1..=self.info.max_report_id())
            .filter_map(|id| u8::try_from(id).ok())
            .find(|&id| self.info.report_id_owner(id) == Some((object_type, instance)))
            .unwrap_or(REPORT_ID_INVALID)
    }

    /// Queue a message from `object_type` instance 0
    pub fn push_message(&mut self, object_type: u16, payload: &[u8]) {
        let mut msg = vec![self.report_id(object_type, 0)];
        msg.extend_from_slice(payload);
        log::trace!("dummy: message {:02X?}", msg);
        self.messages.push_back(msg);
    }

    fn config_crc(&self) -> u32 {
        let mut data = Vec::new();
        for entry in &self.info.objects {
            if NON_CONFIG_OBJECTS.contains(&u16::from(entry.object_type)) {
                continue;
            }
            let start = usize::from(entry.start_address);
            let len = usize::from(entry.size) * usize::from(entry.instances);
            data.extend_from_slice(&self.mem[start..start + len]);
        }
        crc24(&data)
    }

    fn nack(&self, addr: u16, len: usize) -> Error {
        Error::Transfer {
            addr,
            len,
            source: std::io::Error::other("no acknowledge"),
        }
    }

    fn check_range(&self, addr: u16, len: usize) -> Result<usize> {
        let start = usize::from(addr);
        if self.mode != Mode::Application || start + len > self.mem.len() {
            return Err(self.nack(addr, len));
        }
        Ok(start)
    }

    /// Register read in application mode
    pub fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<()> {
        let start = self.check_range(addr, buf.len())?;

        if addr == self.base(types::GEN_MESSAGEPROCESSOR_T5) && !buf.is_empty() {
            buf.fill(0);
            match self.messages.pop_front() {
                Some(msg) => {
                    let len = msg.len().min(buf.len());
                    buf[..len].copy_from_slice(&msg[..len]);
                }
                None => buf[0] = REPORT_ID_INVALID,
            }
            return Ok(());
        }

        buf.copy_from_slice(&self.mem[start..start + buf.len()]);
        Ok(())
    }

    /// Register write in application mode
    pub fn write(&mut self, addr: u16, data: &[u8]) -> Result<()> {
        let start = self.check_range(addr, data.len())?;
        self.mem[start..start + data.len()].copy_from_slice(data);
        self.stats.writes += 1;

        self.command_processor(addr, data.len());
        self.self_test(addr, data.len());
        self.golden_references(addr, data.len());
        self.serial_data_command(addr, data.len());
        Ok(())
    }

    /// Take and clear a command register
    fn take_command(&mut self, reg: u16) -> u8 {
        let value = self.mem[usize::from(reg)];
        self.mem[usize::from(reg)] = 0;
        value
    }

    fn command_processor(&mut self, addr: u16, len: usize) {
        let t6_base = self.base(types::GEN_COMMANDPROCESSOR_T6);

        if covers(addr, len, t6_base + t6::RESET) {
            match self.take_command(t6_base + t6::RESET) {
                0 => {}
                t6::BOOTLOADER_VALUE => self.enter_bootloader(),
                _ => {
                    self.stats.resets += 1;
                    self.messages.clear();
                    self.golden_state = t66::STATE_IDLE;
                    let crc = self.config_crc().to_le_bytes();
                    self.push_message(
                        types::GEN_COMMANDPROCESSOR_T6,
                        &[t6::Status::RESET.bits(), crc[0], crc[1], crc[2]],
                    );
                }
            }
        }

        if covers(addr, len, t6_base + t6::BACKUPNV)
            && self.take_command(t6_base + t6::BACKUPNV) == t6::BACKUP_VALUE
        {
            self.stats.backups += 1;
            self.nvram = Some(self.mem.clone());
        }

        if covers(addr, len, t6_base + t6::CALIBRATE)
            && self.take_command(t6_base + t6::CALIBRATE) != 0
        {
            self.stats.calibrations += 1;
            let crc = self.config_crc().to_le_bytes();
            self.push_message(
                types::GEN_COMMANDPROCESSOR_T6,
                &[t6::Status::CAL.bits(), crc[0], crc[1], crc[2]],
            );
        }

        if covers(addr, len, t6_base + t6::DIAGNOSTIC) {
            let t37_base = usize::from(self.base(types::DEBUG_DIAGNOSTIC_T37));
            match self.take_command(t6_base + t6::DIAGNOSTIC) {
                mode @ (t6::DIAG_DELTAS | t6::DIAG_REFS) => self.fill_diagnostic_page(mode, 0),
                t6::DIAG_PAGE_UP => {
                    let mode = self.mem[t37_base + t37::MODE as usize];
                    let page = self.mem[t37_base + t37::PAGE as usize].wrapping_add(1);
                    self.fill_diagnostic_page(mode, page);
                }
                _ => {}
            }
        }
    }

    /// Node value the emulated sensor reports
    pub fn diagnostic_value(&self, mode: u8, node: usize) -> i16 {
        let node = node as i16;
        if mode == t6::DIAG_REFS {
            8000 + node * 2
        } else {
            node * 3 - 10
        }
    }

    fn fill_diagnostic_page(&mut self, mode: u8, page: u8) {
        let Ok(t37) = self.info.require(types::DEBUG_DIAGNOSTIC_T37, 0) else {
            return;
        };
        let base = usize::from(t37.base);
        let per_page = (usize::from(t37.size) - t37::DATA as usize) / 2;
        let nodes = self.info.id.node_count();

        self.mem[base + t37::MODE as usize] = mode;
        self.mem[base + t37::PAGE as usize] = page;
        for i in 0..per_page {
            let node = usize::from(page) * per_page + i;
            let value = if node < nodes {
                self.diagnostic_value(mode, node)
            } else {
                0
            };
            let at = base + t37::DATA as usize + i * 2;
            self.mem[at..at + 2].copy_from_slice(&value.to_le_bytes());
        }
    }

    fn self_test(&mut self, addr: u16, len: usize) {
        let base = self.base(types::SPT_SELFTEST_T25);
        if !covers(addr, len, base + t25::CMD) {
            return;
        }
        let cmd = self.take_command(base + t25::CMD);
        let ctrl = self.mem[usize::from(base + t25::CTRL)];
        if cmd == 0 || ctrl & t25::CTRL_ENABLE_REPORT != t25::CTRL_ENABLE_REPORT {
            return;
        }
        let result = if cmd == t25::CMD_RUN_ALL {
            self.config.self_test_result
        } else {
            t25::RESULT_INVALID
        };
        self.push_message(types::SPT_SELFTEST_T25, &[result, 0, 0, 0, 0]);
    }

    fn golden_references(&mut self, addr: u16, len: usize) {
        let reg = self.base(types::SPT_GOLDENREFERENCES_T66) + t66::CTRL;
        if !covers(addr, len, reg) {
            return;
        }
        let ctrl = self.mem[usize::from(reg)];
        let command = ctrl & t66::CMD_STORE;
        self.mem[usize::from(reg)] = ctrl & !t66::CMD_STORE;
        if ctrl & t66::CTRL_ENABLE == 0 || command == 0 {
            return;
        }

        let seqerr = t66::Status::SEQERR.bits();
        let status = match (command, self.golden_state) {
            (t66::CMD_PRIME, _) => {
                self.golden_state = t66::STATE_PRIMED;
                t66::STATE_PRIMED
            }
            (t66::CMD_GENERATE, t66::STATE_PRIMED) if self.config.golden_generate_fails => {
                self.golden_state = t66::STATE_IDLE;
                t66::Status::FAIL.bits() | t66::STATE_GENERATED
            }
            (t66::CMD_GENERATE, t66::STATE_PRIMED) => {
                self.golden_state = t66::STATE_GENERATED;
                t66::Status::PASS.bits() | t66::STATE_GENERATED
            }
            (t66::CMD_STORE, t66::STATE_GENERATED) => {
                self.golden_state = t66::STATE_IDLE;
                self.stats.golden_stores += 1;
                t66::Status::SEQDONE.bits()
            }
            (_, state) => seqerr | state,
        };
        self.push_message(types::SPT_GOLDENREFERENCES_T66, &[status]);
    }

    fn serial_data_command(&mut self, addr: u16, len: usize) {
        let Ok(t68) = self.info.require(types::SPT_SERIALDATACOMMAND_T68, 0) else {
            return;
        };
        let capacity = usize::from(t68.size) - t68::OVERHEAD;
        let cmd_reg = t68.base + t68::DATA + capacity as u16;
        if !covers(addr, len, cmd_reg) {
            return;
        }

        let base = usize::from(t68.base);
        let datatype = u16::from_le_bytes([
            self.mem[base + t68::DATATYPE as usize],
            self.mem[base + t68::DATATYPE as usize + 1],
        ]);
        let length = usize::from(self.mem[base + t68::LENGTH as usize]).min(capacity);
        let data_start = base + t68::DATA as usize;
        let chunk = self.mem[data_start..data_start + length].to_vec();

        match self.take_command(cmd_reg) {
            t68::CMD_START => self.serial_buffer = chunk,
            t68::CMD_CONTINUE => self.serial_buffer.extend_from_slice(&chunk),
            t68::CMD_END => {
                let data = std::mem::take(&mut self.serial_buffer);
                log::debug!("dummy: T68 transfer of {} bytes", data.len());
                self.serial_data = Some((datatype, data));
            }
            _ => {}
        }
    }

    /// Bootloader status read
    pub fn boot_read(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.mode != Mode::Bootloader {
            return Err(Error::Bootloader("no bootloader answering".into()));
        }
        buf.fill(0);
        if buf.is_empty() {
            return Ok(());
        }

        if let Some(status) = self.boot.pending.pop_front() {
            buf[0] = status;
        } else if self.boot.unlocked {
            buf[0] = boot_status::WAITING_FRAME_DATA;
        } else {
            let id = [
                boot_status::WAITING_BOOTLOAD_CMD | boot_status::EXTENDED_ID,
                BOOTLOADER_ID,
                BOOTLOADER_VERSION,
            ];
            let len = buf.len().min(id.len());
            buf[..len].copy_from_slice(&id[..len]);
        }
        Ok(())
    }

    /// Bootloader command or frame write
    pub fn boot_write(&mut self, data: &[u8]) -> Result<()> {
        if self.mode != Mode::Bootloader {
            return Err(Error::Bootloader("no bootloader answering".into()));
        }

        if !self.boot.unlocked {
            if data == UNLOCK_CMD {
                self.boot.unlocked = true;
            } else {
                log::warn!("dummy: bootloader ignored {:02X?} while locked", data);
            }
            return Ok(());
        }

        self.boot.pending.push_back(boot_status::FRAME_CRC_CHECK);
        let well_formed = data.len() >= 2
            && usize::from(u16::from_be_bytes([data[0], data[1]])) + 2 == data.len();
        if !well_formed {
            self.boot.pending.push_back(boot_status::FRAME_CRC_FAIL);
        } else if self.boot.crc_failures_left > 0 {
            self.boot.crc_failures_left -= 1;
            self.boot.pending.push_back(boot_status::FRAME_CRC_FAIL);
        } else {
            self.boot.frames.push(data.to_vec());
            self.boot.pending.push_back(boot_status::FRAME_CRC_PASS);
        }
        Ok(())
    }

    /// The bootloader connection went away
    ///
    /// When frames were received the chip starts the new firmware. The
    /// emulator takes the version and build from the first two payload
    /// bytes of the first frame.
    pub(crate) fn boot_released(&mut self) {
        let Some(first) = self.boot.frames.first() else {
            return;
        };
        if let [_, _, version, build, ..] = first[..] {
            self.config.version = version;
            self.config.build = build;
        }
        log::debug!(
            "dummy: {} frames flashed, starting application",
            self.boot.frames.len()
        );
        self.info = build_info(&self.config);
        self.write_info();
        self.mode = Mode::Application;
        self.messages.clear();
    }
}
