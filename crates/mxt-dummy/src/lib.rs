//! mxt-dummy - In-memory maXTouch emulator for testing
//!
//! This crate emulates a maXTouch controller in memory: the info block,
//! the message queue and the command processor, self test, golden
//! reference, serial data and diagnostic objects, plus a bootloader that
//! accepts firmware frames. It's useful for testing and development
//! without real hardware.

mod chip;

pub use chip::{DummyChip, DummyStats, Mode};

use mxt_core::device::{BootloaderAccess, Connector, DeviceTarget, RegisterAccess};
use mxt_core::{Error, Result};

use std::cell::RefCell;
use std::rc::Rc;

/// Configuration for the emulated chip
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Family ID
    pub family_id: u8,
    /// Variant ID
    pub variant_id: u8,
    /// Firmware version, major in the high nibble
    pub version: u8,
    /// Firmware build
    pub build: u8,
    /// X lines
    pub matrix_x_size: u8,
    /// Y lines
    pub matrix_y_size: u8,
    /// Result code the self test reports
    pub self_test_result: u8,
    /// Make golden reference generation fail
    pub golden_generate_fails: bool,
    /// Number of frames the bootloader rejects before accepting any
    pub frame_crc_failures: u32,
    /// Store a wrong info block checksum
    pub corrupt_info_crc: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            family_id: 0xA4,
            variant_id: 0x12,
            version: 0x10,
            build: 0xAA,
            matrix_x_size: 4,
            matrix_y_size: 3,
            self_test_result: 0xFE,
            golden_generate_fails: false,
            frame_crc_failures: 0,
            corrupt_info_crc: false,
        }
    }
}

type SharedChip = Rc<RefCell<DummyChip>>;

/// Application mode connection to the emulated chip
pub struct DummyDevice {
    chip: SharedChip,
    released: bool,
}

impl DummyDevice {
    fn released_error(addr: u16, len: usize) -> Error {
        Error::Transfer {
            addr,
            len,
            source: std::io::Error::other("connection released"),
        }
    }
}

impl RegisterAccess for DummyDevice {
    fn read_register(&mut self, addr: u16, buf: &mut [u8]) -> Result<()> {
        if self.released {
            return Err(Self::released_error(addr, buf.len()));
        }
        self.chip.borrow_mut().read(addr, buf)
    }

    fn write_register(&mut self, addr: u16, data: &[u8]) -> Result<()> {
        if self.released {
            return Err(Self::released_error(addr, data.len()));
        }
        self.chip.borrow_mut().write(addr, data)
    }

    fn set_debug(&mut self, enabled: bool) -> Result<()> {
        let mut chip = self.chip.borrow_mut();
        let stats = chip.stats_mut();
        if enabled {
            stats.debug_enables += 1;
        } else {
            stats.debug_disables += 1;
        }
        Ok(())
    }

    fn release(&mut self) {
        self.released = true;
        self.chip.borrow_mut().stats_mut().releases += 1;
    }

    fn delay_ms(&mut self, _ms: u32) {}
}

/// Bootloader connection to the emulated chip
pub struct DummyBootloader {
    chip: SharedChip,
}

impl BootloaderAccess for DummyBootloader {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.chip.borrow_mut().boot_read(buf)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.chip.borrow_mut().boot_write(data)
    }

    fn release(&mut self) {
        let mut chip = self.chip.borrow_mut();
        chip.stats_mut().bootloader_releases += 1;
        chip.boot_released();
    }

    fn delay_ms(&mut self, _ms: u32) {}
}

/// Connector handing out connections to one emulated chip
///
/// Clones share the chip, so a test can keep a clone to inspect the chip
/// after handing the connector to the code under test.
#[derive(Clone)]
pub struct DummyConnector {
    chip: SharedChip,
}

impl Default for DummyConnector {
    fn default() -> Self {
        Self::new(DummyConfig::default())
    }
}

impl DummyConnector {
    /// Create a connector for a fresh chip
    pub fn new(config: DummyConfig) -> Self {
        Self {
            chip: Rc::new(RefCell::new(DummyChip::new(config))),
        }
    }

    /// Run `f` on the emulated chip
    pub fn with_chip<R>(&self, f: impl FnOnce(&mut DummyChip) -> R) -> R {
        f(&mut self.chip.borrow_mut())
    }

    /// Snapshot of the chip's counters
    pub fn stats(&self) -> DummyStats {
        self.chip.borrow().stats().clone()
    }
}

impl Connector for DummyConnector {
    fn connect(&mut self, target: &DeviceTarget) -> Result<Box<dyn RegisterAccess>> {
        let mut chip = self.chip.borrow_mut();
        if chip.mode() != Mode::Application {
            return Err(Error::DeviceNotFound(format!(
                "dummy device at {} is in bootloader mode",
                target
            )));
        }
        chip.stats_mut().connects += 1;
        log::debug!("dummy: connected ({})", target);
        Ok(Box::new(DummyDevice {
            chip: Rc::clone(&self.chip),
            released: false,
        }))
    }

    fn connect_bootloader(
        &mut self,
        target: &DeviceTarget,
        _family_id: Option<u8>,
    ) -> Result<Box<dyn BootloaderAccess>> {
        let mut chip = self.chip.borrow_mut();
        if chip.mode() != Mode::Bootloader {
            return Err(Error::DeviceNotFound(format!(
                "no dummy bootloader at {}",
                target
            )));
        }
        chip.stats_mut().bootloader_connects += 1;
        Ok(Box::new(DummyBootloader {
            chip: Rc::clone(&self.chip),
        }))
    }
}
