//! Command processor (T6) operations

use crate::device::RegisterAccess;
use crate::error::Result;
use crate::info::InfoBlock;
use crate::objects::{t6, types};

/// Time the device needs to commit a backup before it may be reset
const BACKUP_TIME_MS: u32 = 50;

/// Write a single command byte to the command processor
pub fn write_command<D: RegisterAccess + ?Sized>(
    device: &mut D,
    info: &InfoBlock,
    register: u16,
    value: u8,
) -> Result<()> {
    let t6 = info.require(types::GEN_COMMANDPROCESSOR_T6, 0)?;
    device.write_register(t6.base + register, &[value])
}

/// Reset the device, into the bootloader if `bootloader` is set
pub fn reset<D: RegisterAccess + ?Sized>(
    device: &mut D,
    info: &InfoBlock,
    bootloader: bool,
) -> Result<()> {
    let value = if bootloader {
        t6::BOOTLOADER_VALUE
    } else {
        t6::RESET_VALUE
    };
    write_command(device, info, t6::RESET, value)?;
    if bootloader {
        log::info!("Reset into bootloader mode");
    } else {
        log::info!("Reset device");
    }
    Ok(())
}

/// Back up the configuration to non-volatile memory
pub fn backup<D: RegisterAccess + ?Sized>(device: &mut D, info: &InfoBlock) -> Result<()> {
    write_command(device, info, t6::BACKUPNV, t6::BACKUP_VALUE)?;
    device.delay_ms(BACKUP_TIME_MS);
    log::info!("Backed up configuration to NVRAM");
    Ok(())
}

/// Start a calibration
pub fn calibrate<D: RegisterAccess + ?Sized>(device: &mut D, info: &InfoBlock) -> Result<()> {
    write_command(device, info, t6::CALIBRATE, t6::CALIBRATE_VALUE)?;
    log::info!("Sent calibrate command");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{info_block, MockDevice, T6_ADDR};

    #[test]
    fn test_command_values() {
        let info = info_block();
        let mut dev = MockDevice::new();

        reset(&mut dev, &info, false).unwrap();
        reset(&mut dev, &info, true).unwrap();
        backup(&mut dev, &info).unwrap();
        calibrate(&mut dev, &info).unwrap();

        assert_eq!(dev.writes_to(T6_ADDR), vec![vec![0x01], vec![0xA5]]);
        assert_eq!(dev.writes_to(T6_ADDR + 1), vec![vec![0x55]]);
        assert_eq!(dev.writes_to(T6_ADDR + 2), vec![vec![0x01]]);
        assert_eq!(dev.delays, 1);
    }

    #[test]
    fn test_write_failure_propagates() {
        let info = info_block();
        let mut dev = MockDevice::new();
        dev.fail_writes_at = Some(T6_ADDR + 1);
        assert!(backup(&mut dev, &info).is_err());
    }
}
