//! Linux i2c-dev transport
//!
//! This module provides `I2cDev`, a register transport over
//! `/dev/i2c-N`, and `I2cDevConnector`, which finds devices by scanning
//! every adapter for the usual maXTouch addresses.

use crate::error::{I2cDevError, Result};

use mxt_core::bootloader::bootloader_address;
use mxt_core::device::{BootloaderAccess, Connector, DeviceTarget, RegisterAccess};
use mxt_core::info::ID_SIZE;
use mxt_core::{Error as CoreError, Result as CoreResult};

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Addresses a maXTouch device answers on in application mode
pub const APP_ADDRESSES: &[u8] = &[0x4a, 0x4b, 0x4c, 0x4d, 0x5a, 0x5b];

/// Directory holding the adapter device nodes
const DEV_DIR: &str = "/dev";

/// Where the kernel driver exposes its debug switch
const SYSFS_DEVICES: &str = "/sys/bus/i2c/devices";

/// Linux i2c-dev ioctl constants
mod ioctl {
    use nix::ioctl_write_int_bad;

    /// Select the slave address for subsequent read/write calls
    const I2C_SLAVE: u16 = 0x0703;

    ioctl_write_int_bad!(i2c_set_slave, I2C_SLAVE);
}

/// Open `/dev/i2c-<adapter>` and select `address`
fn open_adapter(adapter: u32, address: u8) -> Result<File> {
    let path = format!("{}/i2c-{}", DEV_DIR, adapter);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .map_err(|e| I2cDevError::OpenFailed {
            path: path.clone(),
            source: e,
        })?;

    unsafe {
        ioctl::i2c_set_slave(file.as_raw_fd(), libc::c_int::from(address)).map_err(|e| {
            I2cDevError::SetAddressFailed {
                address,
                source: std::io::Error::from_raw_os_error(e as i32),
            }
        })?;
    }

    log::debug!("i2c-dev: Opened {} address 0x{:02x}", path, address);
    Ok(file)
}

fn write_all(file: &mut File, data: &[u8]) -> Result<()> {
    let written = file.write(data).map_err(I2cDevError::TransferFailed)?;
    if written != data.len() {
        return Err(I2cDevError::ShortTransfer {
            expected: data.len(),
            actual: written,
        });
    }
    Ok(())
}

fn read_exact(file: &mut File, buf: &mut [u8]) -> Result<()> {
    let read = file.read(buf).map_err(I2cDevError::TransferFailed)?;
    if read != buf.len() {
        return Err(I2cDevError::ShortTransfer {
            expected: buf.len(),
            actual: read,
        });
    }
    Ok(())
}

/// maXTouch device in application mode on an i2c-dev adapter
pub struct I2cDev {
    file: Option<File>,
    adapter: u32,
    address: u8,
}

impl I2cDev {
    /// Open the device at `address` on `/dev/i2c-<adapter>`
    pub fn open(adapter: u32, address: u8) -> Result<Self> {
        let file = open_adapter(adapter, address)?;
        Ok(Self {
            file: Some(file),
            adapter,
            address,
        })
    }

    /// Adapter number
    pub fn adapter(&self) -> u32 {
        self.adapter
    }

    /// 7-bit slave address
    pub fn address(&self) -> u8 {
        self.address
    }

    fn file(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or_else(|| {
            I2cDevError::TransferFailed(std::io::Error::other("device already released"))
        })
    }

    fn sysfs_debug_path(&self) -> PathBuf {
        Path::new(SYSFS_DEVICES)
            .join(format!("{}-{:04x}", self.adapter, self.address))
            .join("debug_enable")
    }

    /// Check that a maXTouch info block header can be read
    fn probe(&mut self) -> Result<()> {
        let mut id = [0u8; ID_SIZE];
        let file = self.file()?;
        write_all(file, &0u16.to_le_bytes())?;
        read_exact(file, &mut id)?;
        log::debug!(
            "i2c-dev: i2c-{} 0x{:02x} family 0x{:02x} variant 0x{:02x}",
            self.adapter,
            self.address,
            id[0],
            id[1]
        );
        Ok(())
    }
}

impl RegisterAccess for I2cDev {
    fn read_register(&mut self, addr: u16, buf: &mut [u8]) -> CoreResult<()> {
        let len = buf.len();
        let file = self.file().map_err(|e| e.into_transfer(addr, len))?;
        write_all(file, &addr.to_le_bytes()).map_err(|e| e.into_transfer(addr, len))?;
        read_exact(file, buf).map_err(|e| e.into_transfer(addr, len))?;
        log::trace!("i2c-dev: read {} bytes at 0x{:04x}", len, addr);
        Ok(())
    }

    fn write_register(&mut self, addr: u16, data: &[u8]) -> CoreResult<()> {
        let mut frame = Vec::with_capacity(data.len() + 2);
        frame.extend_from_slice(&addr.to_le_bytes());
        frame.extend_from_slice(data);

        let file = self.file().map_err(|e| e.into_transfer(addr, data.len()))?;
        write_all(file, &frame).map_err(|e| e.into_transfer(addr, data.len()))?;
        log::trace!("i2c-dev: wrote {} bytes at 0x{:04x}", data.len(), addr);
        Ok(())
    }

    fn set_debug(&mut self, enabled: bool) -> CoreResult<()> {
        let path = self.sysfs_debug_path();
        if !path.exists() {
            log::debug!("i2c-dev: {} not present, no kernel debug", path.display());
            return Ok(());
        }
        std::fs::write(&path, if enabled { "1" } else { "0" })?;
        log::debug!("i2c-dev: kernel message debug {}", if enabled { "on" } else { "off" });
        Ok(())
    }

    fn release(&mut self) {
        if self.file.take().is_some() {
            log::debug!("i2c-dev: Closed i2c-{} 0x{:02x}", self.adapter, self.address);
        }
    }
}

/// maXTouch device in bootloader mode
pub struct I2cBootloader {
    file: Option<File>,
    address: u8,
}

impl I2cBootloader {
    /// Open the bootloader at `address` on `/dev/i2c-<adapter>`
    pub fn open(adapter: u32, address: u8) -> Result<Self> {
        let file = open_adapter(adapter, address)?;
        log::info!("i2c-dev: Bootloader at i2c-{} 0x{:02x}", adapter, address);
        Ok(Self {
            file: Some(file),
            address,
        })
    }

    fn file(&mut self) -> CoreResult<&mut File> {
        let address = self.address;
        self.file.as_mut().ok_or_else(|| {
            CoreError::Bootloader(format!("bootloader 0x{:02x} already released", address))
        })
    }
}

impl BootloaderAccess for I2cBootloader {
    fn read_bytes(&mut self, buf: &mut [u8]) -> CoreResult<()> {
        read_exact(self.file()?, buf)?;
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8]) -> CoreResult<()> {
        write_all(self.file()?, data)?;
        Ok(())
    }

    fn release(&mut self) {
        self.file.take();
    }
}

/// List adapter numbers from `/dev/i2c-*`, lowest first
pub fn list_adapters() -> Vec<u32> {
    let Ok(entries) = std::fs::read_dir(DEV_DIR) else {
        log::warn!("i2c-dev: Cannot read {}", DEV_DIR);
        return Vec::new();
    };

    let mut adapters: Vec<u32> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            e.file_name()
                .to_str()
                .and_then(|n| n.strip_prefix("i2c-"))
                .and_then(|n| n.parse().ok())
        })
        .collect();
    adapters.sort_unstable();
    adapters
}

/// Connector for i2c-dev adapters
///
/// Remembers where the device was found so that the bootloader can be
/// reached after a reset into bootloader mode.
#[derive(Debug, Default)]
pub struct I2cDevConnector {
    last_found: Option<(u32, u8)>,
}

impl I2cDevConnector {
    /// Create a connector
    pub fn new() -> Self {
        Self::default()
    }

    fn scan(&mut self) -> Result<I2cDev> {
        for adapter in list_adapters() {
            for &address in APP_ADDRESSES {
                let mut dev = match I2cDev::open(adapter, address) {
                    Ok(dev) => dev,
                    Err(e @ I2cDevError::OpenFailed { .. }) => {
                        log::debug!("i2c-dev: {}", e);
                        break;
                    }
                    Err(e) => {
                        log::debug!("i2c-dev: {}", e);
                        continue;
                    }
                };
                if dev.probe().is_ok() {
                    log::info!("Found device at i2c-{} 0x{:02x}", adapter, address);
                    return Ok(dev);
                }
            }
        }
        Err(I2cDevError::NoDevice)
    }
}

impl Connector for I2cDevConnector {
    fn connect(&mut self, target: &DeviceTarget) -> CoreResult<Box<dyn RegisterAccess>> {
        let dev = match *target {
            DeviceTarget::Explicit { adapter, address } => I2cDev::open(adapter, address)?,
            DeviceTarget::Scan => self.scan()?,
        };
        self.last_found = Some((dev.adapter(), dev.address()));
        Ok(Box::new(dev))
    }

    fn connect_bootloader(
        &mut self,
        target: &DeviceTarget,
        family_id: Option<u8>,
    ) -> CoreResult<Box<dyn BootloaderAccess>> {
        let (adapter, app_address) = match *target {
            DeviceTarget::Explicit { adapter, address } => (adapter, address),
            DeviceTarget::Scan => self
                .last_found
                .ok_or_else(|| CoreError::from(I2cDevError::NoDevice))?,
        };

        let address = bootloader_address(app_address, family_id)
            .ok_or(I2cDevError::NoBootloaderAddress(app_address))?;
        Ok(Box::new(I2cBootloader::open(adapter, address)?))
    }
}
