//! Device access traits
//!
//! Backends (i2c-dev, the in-memory emulator) implement these traits. The
//! rest of the crate only ever sees a `RegisterAccess` for application mode
//! and a `BootloaderAccess` for firmware updates.

use crate::error::Result;
use crate::params::ParameterSet;
use std::fmt;
use std::time::Duration;

/// Register access to a device running its application firmware
pub trait RegisterAccess {
    /// Read `buf.len()` bytes starting at register `addr`
    fn read_register(&mut self, addr: u16, buf: &mut [u8]) -> Result<()>;

    /// Write `data` starting at register `addr`
    fn write_register(&mut self, addr: u16, data: &[u8]) -> Result<()>;

    /// Enable or disable kernel-side message debug output, if the backend
    /// has such a thing
    fn set_debug(&mut self, _enabled: bool) -> Result<()> {
        Ok(())
    }

    /// Release the underlying bus handle
    ///
    /// Called exactly once by the owner of the transport.
    fn release(&mut self) {}

    /// Sleep between polls
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

impl<T: RegisterAccess + ?Sized> RegisterAccess for Box<T> {
    fn read_register(&mut self, addr: u16, buf: &mut [u8]) -> Result<()> {
        (**self).read_register(addr, buf)
    }

    fn write_register(&mut self, addr: u16, data: &[u8]) -> Result<()> {
        (**self).write_register(addr, data)
    }

    fn set_debug(&mut self, enabled: bool) -> Result<()> {
        (**self).set_debug(enabled)
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

impl<T: RegisterAccess + ?Sized> RegisterAccess for &mut T {
    fn read_register(&mut self, addr: u16, buf: &mut [u8]) -> Result<()> {
        (**self).read_register(addr, buf)
    }

    fn write_register(&mut self, addr: u16, data: &[u8]) -> Result<()> {
        (**self).write_register(addr, data)
    }

    fn set_debug(&mut self, enabled: bool) -> Result<()> {
        (**self).set_debug(enabled)
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

/// Raw access to a device in bootloader mode
///
/// The bootloader has no register map: every read returns status bytes and
/// every write is a command or a firmware frame.
pub trait BootloaderAccess {
    /// Read raw bytes (status, optionally followed by the bootloader ID)
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Write raw bytes
    fn write_bytes(&mut self, data: &[u8]) -> Result<()>;

    /// Release the underlying bus handle
    fn release(&mut self) {}

    /// Sleep between polls
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

impl<T: BootloaderAccess + ?Sized> BootloaderAccess for Box<T> {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read_bytes(buf)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_bytes(data)
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

/// Which device to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceTarget {
    /// Use the first device that answers on any bus
    Scan,
    /// Use the device at the given adapter and 7-bit address
    Explicit {
        /// Bus adapter number (e.g. 2 for `/dev/i2c-2`)
        adapter: u32,
        /// 7-bit device address
        address: u8,
    },
}

impl DeviceTarget {
    /// Build the target from the adapter/address options
    ///
    /// Both must be given for an explicit target; a lone adapter or address
    /// falls back to scanning.
    pub fn from_params(params: &ParameterSet) -> Self {
        match (params.i2c_adapter, params.i2c_address) {
            (Some(adapter), Some(address)) if address > 0 => Self::Explicit { adapter, address },
            (None, None) => Self::Scan,
            _ => {
                log::warn!("Both i2c adapter and i2c address are needed, scanning instead");
                Self::Scan
            }
        }
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scan => write!(f, "scan"),
            Self::Explicit { adapter, address } => {
                write!(f, "i2c-{} address 0x{:02x}", adapter, address)
            }
        }
    }
}

/// Factory for device transports
///
/// A connector knows how to reach devices on one kind of bus. It is kept for
/// the whole invocation so that the bootloader connection can reuse what was
/// learnt while scanning in application mode.
pub trait Connector {
    /// Open a transport to a device in application mode
    fn connect(&mut self, target: &DeviceTarget) -> Result<Box<dyn RegisterAccess>>;

    /// Open a transport to a device in bootloader mode
    ///
    /// `family_id` comes from the info block when the device was seen in
    /// application mode first; some families use a different bootloader
    /// address.
    fn connect_bootloader(
        &mut self,
        target: &DeviceTarget,
        family_id: Option<u8>,
    ) -> Result<Box<dyn BootloaderAccess>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_needs_both_adapter_and_address() {
        let mut params = ParameterSet::default();
        assert_eq!(DeviceTarget::from_params(&params), DeviceTarget::Scan);

        params.i2c_adapter = Some(2);
        assert_eq!(DeviceTarget::from_params(&params), DeviceTarget::Scan);

        params.i2c_address = Some(0x4a);
        assert_eq!(
            DeviceTarget::from_params(&params),
            DeviceTarget::Explicit {
                adapter: 2,
                address: 0x4a
            }
        );
    }
}
