//! Flash command implementation
//!
//! Flashing drives its own device connections: the device is reset into
//! the bootloader through an application mode connection, the firmware is
//! sent through a bootloader connection, and the device is opened again to
//! check the new version.

use crate::progress::BarProgress;
use mxt_core::bootloader::{flash_firmware, FirmwareImage};
use mxt_core::device::{Connector, DeviceTarget};
use mxt_core::ops::{self, Progress};
use mxt_core::{Error, Result};
use mxt_device::DeviceHandle;
use std::path::Path;
use std::time::Duration;

/// Attempts to reach the device after it leaves the bootloader
const REOPEN_ATTEMPTS: u32 = 10;

/// Delay between reopen attempts
const REOPEN_DELAY: Duration = Duration::from_millis(200);

/// Run the flash command
pub fn run_flash(
    connector: &mut dyn Connector,
    target: &DeviceTarget,
    path: &Path,
    version: Option<&str>,
) -> Result<()> {
    flash_with_progress(connector, target, path, version, &mut BarProgress::new())
}

/// Flash `path`, reporting frames to `progress`
///
/// With `version` given, flashing is skipped when the device already runs
/// that version and the new version is checked afterwards.
pub fn flash_with_progress(
    connector: &mut dyn Connector,
    target: &DeviceTarget,
    path: &Path,
    version: Option<&str>,
    progress: &mut dyn Progress,
) -> Result<()> {
    let image = FirmwareImage::load(path)?;

    let family_id = match DeviceHandle::open(connector, target) {
        Ok(mut handle) => {
            let current = handle.info().id.firmware_version();
            log::info!("Current firmware version {}", current);
            if version == Some(current.as_str()) {
                log::info!("Already at version {}, skipping flash", current);
                return Ok(());
            }

            let family_id = handle.info().id.family_id;
            let (dev, info) = handle.parts();
            ops::reset(dev, info, true)?;
            Some(family_id)
        }
        Err(e) => {
            log::warn!(
                "Could not open device in application mode ({}), trying bootloader",
                e
            );
            None
        }
    };

    let mut bl = connector.connect_bootloader(target, family_id)?;
    let result = flash_firmware(&mut bl, &image, progress);
    bl.release();
    result?;

    let handle = reopen(connector, target)?;
    let flashed = handle.info().id.firmware_version();
    match version {
        Some(expected) if expected != flashed => Err(Error::Firmware(format!(
            "version mismatch after flash: expected {}, device reports {}",
            expected, flashed
        ))),
        _ => {
            log::info!("Firmware {} running", flashed);
            Ok(())
        }
    }
}

/// Open the device once it is back in application mode
fn reopen(connector: &mut dyn Connector, target: &DeviceTarget) -> Result<DeviceHandle> {
    let mut attempt = 1;
    loop {
        match DeviceHandle::open(connector, target) {
            Ok(handle) => return Ok(handle),
            Err(e) if attempt < REOPEN_ATTEMPTS => {
                log::debug!("Device not back yet (attempt {}): {}", attempt, e);
                std::thread::sleep(REOPEN_DELAY);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxt_core::ops::NoProgress;
    use mxt_dummy::{DummyConfig, DummyConnector};
    use std::path::PathBuf;

    /// Two frames; the first carries version 2.1 build BB for the emulator
    fn firmware_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("fw.enc");
        std::fs::write(&path, "000221BB\n0003010203\n").unwrap();
        path
    }

    fn flash(connector: &mut DummyConnector, path: &Path, version: Option<&str>) -> Result<()> {
        flash_with_progress(connector, &DeviceTarget::Scan, path, version, &mut NoProgress)
    }

    #[test]
    fn test_flash_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let path = firmware_file(&dir);
        let mut connector = DummyConnector::default();

        flash(&mut connector, &path, Some("2.1.BB")).unwrap();

        assert_eq!(connector.with_chip(|chip| chip.frames().len()), 2);
        let stats = connector.stats();
        assert_eq!(stats.bootloader_connects, 1);
        assert_eq!(stats.bootloader_releases, 1);
        assert_eq!(stats.connects, stats.releases);
    }

    #[test]
    fn test_skip_when_already_at_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = firmware_file(&dir);
        let mut connector = DummyConnector::default();

        flash(&mut connector, &path, Some("1.0.AA")).unwrap();

        let stats = connector.stats();
        assert_eq!(stats.bootloader_connects, 0);
        assert_eq!(stats.connects, 1);
        assert_eq!(stats.releases, 1);
    }

    #[test]
    fn test_version_mismatch_after_flash() {
        let dir = tempfile::tempdir().unwrap();
        let path = firmware_file(&dir);
        let mut connector = DummyConnector::default();

        let err = flash(&mut connector, &path, Some("3.0.01")).unwrap_err();
        assert!(matches!(err, Error::Firmware(_)));
    }

    #[test]
    fn test_device_already_in_bootloader() {
        let dir = tempfile::tempdir().unwrap();
        let path = firmware_file(&dir);
        let mut connector = DummyConnector::default();
        connector.with_chip(|chip| chip.enter_bootloader());

        flash(&mut connector, &path, None).unwrap();
        assert_eq!(connector.stats().bootloader_connects, 1);
    }

    #[test]
    fn test_frame_crc_failures_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = firmware_file(&dir);
        let mut connector = DummyConnector::new(DummyConfig {
            frame_crc_failures: 2,
            ..Default::default()
        });

        flash(&mut connector, &path, Some("2.1.BB")).unwrap();
        assert_eq!(connector.with_chip(|chip| chip.frames().len()), 2);
    }

    #[test]
    fn test_bad_firmware_file_leaves_device_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.enc");
        std::fs::write(&path, "0010AA").unwrap();
        let mut connector = DummyConnector::default();

        assert!(matches!(
            flash(&mut connector, &path, None),
            Err(Error::Firmware(_))
        ));
        assert_eq!(connector.stats().connects, 0);
    }
}
