//! Serial data command (T68) upload
//!
//! The payload is sent in chunks of the object's data area. Every chunk is
//! followed by a command byte (START for the first chunk, CONTINUE for the
//! rest) which the device clears once it has taken the chunk. An END
//! command with zero length finishes the transfer.

use super::POLL_INTERVAL_MS;
use crate::device::RegisterAccess;
use crate::error::{Error, Result};
use crate::hex::decode_hex_text;
use crate::info::InfoBlock;
use crate::objects::{t68, types};
use std::path::Path;

/// Time the device may take to accept a chunk
const COMMAND_TIMEOUT_MS: u32 = 1000;

/// Upload a hex text file through T68
pub fn upload_serial_data<D: RegisterAccess + ?Sized>(
    device: &mut D,
    info: &InfoBlock,
    path: &Path,
    datatype: u16,
) -> Result<()> {
    log::info!("Opening serial data file {}", path.display());
    let text = std::fs::read_to_string(path)?;
    let data = decode_hex_text(&text)?;
    upload_serial_bytes(device, info, &data, datatype)
}

/// Upload `data` through T68
pub fn upload_serial_bytes<D: RegisterAccess + ?Sized>(
    device: &mut D,
    info: &InfoBlock,
    data: &[u8],
    datatype: u16,
) -> Result<()> {
    if data.is_empty() {
        return Err(Error::Config("serial data file holds no data".into()));
    }

    let t68 = info.require(types::SPT_SERIALDATACOMMAND_T68, 0)?;
    let capacity = usize::from(t68.size)
        .checked_sub(t68::OVERHEAD)
        .filter(|&n| n > 0)
        .ok_or_else(|| Error::Config(format!("T68 object too small ({} bytes)", t68.size)))?;
    // The command byte follows the data area and is the highest register used
    let cmd_addr = t68
        .base
        .checked_add(t68::DATA + capacity as u16)
        .ok_or_else(|| {
            Error::InfoBlock(format!(
                "T68 at 0x{:04X} ({} bytes) runs past the register space",
                t68.base, t68.size
            ))
        })?;

    log::debug!(
        "T68 at 0x{:04X}, {} data bytes per chunk, datatype {}",
        t68.base,
        capacity,
        datatype
    );

    device.write_register(
        t68.base + t68::CTRL,
        &[t68::CTRL_ENABLE | t68::CTRL_RPTEN],
    )?;
    device.write_register(t68.base + t68::DATATYPE, &datatype.to_le_bytes())?;

    for (i, chunk) in data.chunks(capacity).enumerate() {
        let command = if i == 0 {
            t68::CMD_START
        } else {
            t68::CMD_CONTINUE
        };

        let mut frame = vec![0u8; capacity + 1];
        frame[0] = chunk.len() as u8;
        frame[1..=chunk.len()].copy_from_slice(chunk);
        device.write_register(t68.base + t68::LENGTH, &frame)?;
        device.write_register(cmd_addr, &[command])?;
        wait_command_clear(device, cmd_addr)?;
        log::trace!("T68 chunk {} ({} bytes) accepted", i, chunk.len());
    }

    device.write_register(t68.base + t68::LENGTH, &[0])?;
    device.write_register(cmd_addr, &[t68::CMD_END])?;
    wait_command_clear(device, cmd_addr)?;

    log::info!("Uploaded {} bytes of serial data", data.len());
    Ok(())
}

fn wait_command_clear<D: RegisterAccess + ?Sized>(device: &mut D, cmd_addr: u16) -> Result<()> {
    let mut waited = 0;
    loop {
        let mut cmd = [0u8; 1];
        device.read_register(cmd_addr, &mut cmd)?;
        if cmd[0] == 0 {
            return Ok(());
        }
        if waited >= COMMAND_TIMEOUT_MS {
            return Err(Error::Timeout("T68 command"));
        }
        device.delay_ms(POLL_INTERVAL_MS);
        waited += POLL_INTERVAL_MS;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{info_block, MockDevice, T68_ADDR};
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;

    const CMD_ADDR: u16 = T68_ADDR + 10;

    /// Device that takes every chunk immediately, recording (command, data)
    fn accepting_device() -> (MockDevice, Rc<RefCell<Vec<(u8, Vec<u8>)>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let seen = log.clone();
        let dev = MockDevice::new().on_write(move |state, addr, data| {
            if addr == CMD_ADDR {
                let base = usize::from(T68_ADDR);
                let len = usize::from(state.mem[base + 5]);
                let chunk = state.mem[base + 6..base + 6 + len].to_vec();
                seen.borrow_mut().push((data[0], chunk));
                state.mem[usize::from(CMD_ADDR)] = 0;
            }
        });
        (dev, log)
    }

    #[test]
    fn test_chunks() {
        let info = info_block();
        let (mut dev, log) = accepting_device();
        upload_serial_bytes(&mut dev, &info, &[1, 2, 3, 4, 5, 6, 7, 8, 9], 0x0102).unwrap();

        assert_eq!(dev.writes_to(T68_ADDR + 3), vec![vec![0x02, 0x01]]);
        assert_eq!(
            *log.borrow(),
            vec![
                (1, vec![1, 2, 3, 4]),
                (2, vec![5, 6, 7, 8]),
                (2, vec![9]),
                (3, vec![]),
            ]
        );
    }

    #[test]
    fn test_upload_file() {
        let info = info_block();
        let (mut dev, log) = accepting_device();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# calibration").unwrap();
        writeln!(file, "0A 0B").unwrap();
        writeln!(file, "0C").unwrap();

        upload_serial_data(&mut dev, &info, file.path(), 1).unwrap();
        assert_eq!(log.borrow()[0], (1, vec![0x0A, 0x0B, 0x0C]));
    }

    #[test]
    fn test_device_never_accepts() {
        let info = info_block();
        let mut dev = MockDevice::new();
        assert!(matches!(
            upload_serial_bytes(&mut dev, &info, &[1], 1),
            Err(Error::Timeout("T68 command"))
        ));
    }

    #[test]
    fn test_object_past_register_space() {
        let mut info = info_block();
        for object in info.objects.iter_mut() {
            if u16::from(object.object_type) == types::SPT_SERIALDATACOMMAND_T68 {
                object.start_address = 0xFFF8;
            }
        }
        let mut dev = MockDevice::new();
        assert!(matches!(
            upload_serial_bytes(&mut dev, &info, &[1], 1),
            Err(Error::InfoBlock(_))
        ));
        assert!(dev.writes.is_empty());
    }

    #[test]
    fn test_empty_data() {
        let info = info_block();
        let mut dev = MockDevice::new();
        assert!(matches!(
            upload_serial_bytes(&mut dev, &info, &[], 1),
            Err(Error::Config(_))
        ));
        assert!(dev.writes.is_empty());
    }
}
