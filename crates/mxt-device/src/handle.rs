//! DeviceHandle - an open device together with its info block
//!
//! Opening a handle connects through a `Connector` and reads the info
//! block. The transport is released exactly once when the handle goes
//! away, whether the command succeeded, failed, or the info block could
//! not even be read.

use mxt_core::device::{Connector, DeviceTarget, RegisterAccess};
use mxt_core::info::InfoBlock;
use mxt_core::{Error, Result};

/// Owns a transport and releases it on drop
struct Transport {
    inner: Box<dyn RegisterAccess>,
}

impl Drop for Transport {
    fn drop(&mut self) {
        log::debug!("Releasing device");
        self.inner.release();
    }
}

/// An open device in application mode
///
/// The CLI works with this type for every command except flashing, which
/// manages the application and bootloader connections itself.
pub struct DeviceHandle {
    transport: Transport,
    info: InfoBlock,
}

impl DeviceHandle {
    /// Connect to `target` and read the info block
    pub fn open(connector: &mut dyn Connector, target: &DeviceTarget) -> Result<Self> {
        log::debug!("Opening device ({})", target);
        let mut transport = Transport {
            inner: connector.connect(target)?,
        };

        let info = InfoBlock::read(&mut transport.inner).map_err(|e| match e {
            Error::InfoBlock(_) => e,
            other => Error::InfoBlock(format!("cannot read info block: {}", other)),
        })?;

        if let Err(e) = transport.inner.set_debug(true) {
            log::warn!("Could not enable kernel message debug: {}", e);
        }

        log::info!(
            "Opened device: family 0x{:02X} variant 0x{:02X} firmware {}",
            info.id.family_id,
            info.id.variant_id,
            info.id.firmware_version()
        );

        Ok(Self { transport, info })
    }

    /// Info block read when the device was opened
    pub fn info(&self) -> &InfoBlock {
        &self.info
    }

    /// Register transport
    pub fn device(&mut self) -> &mut dyn RegisterAccess {
        self.transport.inner.as_mut()
    }

    /// Transport and info block at once, for operations that need both
    pub fn parts(&mut self) -> (&mut dyn RegisterAccess, &InfoBlock) {
        (self.transport.inner.as_mut(), &self.info)
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        if let Err(e) = self.transport.inner.set_debug(false) {
            log::warn!("Could not disable kernel message debug: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxt_dummy::{DummyConfig, DummyConnector};

    #[test]
    fn test_release_once_on_success() {
        let mut connector = DummyConnector::default();
        {
            let mut handle = DeviceHandle::open(&mut connector, &DeviceTarget::Scan).unwrap();
            let (dev, info) = handle.parts();
            mxt_core::ops::calibrate(dev, info).unwrap();
        }
        let stats = connector.stats();
        assert_eq!(stats.connects, 1);
        assert_eq!(stats.releases, 1);
        assert_eq!(stats.debug_enables, 1);
        assert_eq!(stats.debug_disables, 1);
    }

    #[test]
    fn test_release_once_on_bad_info_block() {
        let mut connector = DummyConnector::new(DummyConfig {
            corrupt_info_crc: true,
            ..Default::default()
        });
        let result = DeviceHandle::open(&mut connector, &DeviceTarget::Scan);
        assert!(matches!(result, Err(Error::InfoBlock(_))));
        let stats = connector.stats();
        assert_eq!(stats.releases, 1);
        assert_eq!(stats.debug_enables, 0);
    }

    #[test]
    fn test_no_release_without_connection() {
        let mut connector = DummyConnector::default();
        connector.with_chip(|chip| chip.enter_bootloader());
        let result = DeviceHandle::open(&mut connector, &DeviceTarget::Scan);
        assert!(matches!(result, Err(Error::DeviceNotFound(_))));
        assert_eq!(connector.stats().releases, 0);
    }
}
