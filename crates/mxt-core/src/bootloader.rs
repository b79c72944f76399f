//! Bootloader firmware update protocol
//!
//! In bootloader mode the device has no register map. Every read returns a
//! status byte whose top bits encode the state; every write is either the
//! unlock command or one firmware frame. Frames are taken from an `.enc`
//! file, each starting with its big endian payload length.

use crate::device::BootloaderAccess;
use crate::error::{Error, Result};
use crate::hex::decode_hex_text;
use crate::ops::{Progress, POLL_INTERVAL_MS};
use std::fmt;
use std::path::Path;

/// Status byte values and masks
pub mod status {
    /// Waiting for the unlock command, low bits carry the bootloader ID
    pub const WAITING_BOOTLOAD_CMD: u8 = 0xC0;
    /// Waiting for the next frame
    pub const WAITING_FRAME_DATA: u8 = 0x80;
    /// Checking the frame CRC
    pub const FRAME_CRC_CHECK: u8 = 0x02;
    /// Frame CRC failed
    pub const FRAME_CRC_FAIL: u8 = 0x03;
    /// Frame CRC passed
    pub const FRAME_CRC_PASS: u8 = 0x04;
    /// Application CRC failed, the bootloader runs on its own
    pub const APP_CRC_FAIL: u8 = 0x40;
    /// Bits carrying the bootloader ID in the waiting states
    pub const STATUS_MASK: u8 = 0x3F;
    /// Set when an extended ID follows the status byte
    pub const EXTENDED_ID: u8 = 0x20;
}

/// Unlock command, sent once before the first frame
pub const UNLOCK_CMD: [u8; 2] = [0xAA, 0xDC];

/// How often a frame is resent after a CRC failure
pub const FRAME_RETRIES: u32 = 10;

/// Time the bootloader may take to change state
const STATE_TIMEOUT_MS: u32 = 2000;

/// State decoded from a status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    /// Waiting for the unlock command
    WaitingBootloadCmd,
    /// Waiting for frame data
    WaitingFrameData,
    /// Checking the last frame
    FrameCrcCheck,
    /// Last frame was corrupted
    FrameCrcFail,
    /// Last frame was accepted
    FrameCrcPass,
    /// No valid application present
    AppCrcFail,
    /// Anything else
    Unknown(u8),
}

impl BootState {
    /// Decode a status byte
    pub fn from_status(byte: u8) -> Self {
        match byte & !status::STATUS_MASK {
            status::WAITING_BOOTLOAD_CMD => Self::WaitingBootloadCmd,
            status::WAITING_FRAME_DATA => Self::WaitingFrameData,
            status::APP_CRC_FAIL => Self::AppCrcFail,
            _ => match byte {
                status::FRAME_CRC_CHECK => Self::FrameCrcCheck,
                status::FRAME_CRC_FAIL => Self::FrameCrcFail,
                status::FRAME_CRC_PASS => Self::FrameCrcPass,
                other => Self::Unknown(other),
            },
        }
    }
}

impl fmt::Display for BootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitingBootloadCmd => write!(f, "waiting for unlock"),
            Self::WaitingFrameData => write!(f, "waiting for frame"),
            Self::FrameCrcCheck => write!(f, "checking frame"),
            Self::FrameCrcFail => write!(f, "frame CRC fail"),
            Self::FrameCrcPass => write!(f, "frame CRC pass"),
            Self::AppCrcFail => write!(f, "application CRC fail"),
            Self::Unknown(b) => write!(f, "unknown status 0x{:02X}", b),
        }
    }
}

/// Bootloader address for a device answering at `app_address`
///
/// `family_id` is known when the device was seen in application mode;
/// families from 0xA2 on use a different offset on the first two addresses.
pub fn bootloader_address(app_address: u8, family_id: Option<u8>) -> Option<u8> {
    match app_address {
        0x4a | 0x4b if family_id.is_some_and(|f| f >= 0xA2) => Some(app_address - 0x24),
        0x4a | 0x4b | 0x4c | 0x4d | 0x5a | 0x5b => Some(app_address - 0x26),
        _ => None,
    }
}

/// Firmware image split into frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    frames: Vec<Vec<u8>>,
}

impl FirmwareImage {
    /// Split raw image bytes into frames
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut frames = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            let header = data
                .get(pos..pos + 2)
                .ok_or_else(|| Error::Firmware(format!("truncated frame header at {}", pos)))?;
            let len = usize::from(u16::from_be_bytes([header[0], header[1]])) + 2;
            let frame = data.get(pos..pos + len).ok_or_else(|| {
                Error::Firmware(format!(
                    "frame at {} needs {} bytes, {} left",
                    pos,
                    len,
                    data.len() - pos
                ))
            })?;
            frames.push(frame.to_vec());
            pos += len;
        }

        if frames.is_empty() {
            return Err(Error::Firmware("image holds no frames".into()));
        }
        Ok(Self { frames })
    }

    /// Load an `.enc` file: hex text, or raw binary if it is not hex
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path)?;
        let data = match std::str::from_utf8(&raw).ok().map(decode_hex_text) {
            Some(Ok(data)) => data,
            _ => {
                log::debug!("{} is not hex text, using it as binary", path.display());
                raw
            }
        };
        let image = Self::from_bytes(&data)?;
        log::info!(
            "Opened {}: {} frames, {} bytes",
            path.display(),
            image.frames.len(),
            data.len()
        );
        Ok(image)
    }

    /// Frames in send order
    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }
}

fn read_state<B: BootloaderAccess + ?Sized>(bl: &mut B) -> Result<BootState> {
    let mut status = [0u8; 1];
    bl.read_bytes(&mut status)?;
    Ok(BootState::from_status(status[0]))
}

/// Poll until the bootloader reports a state accepted by `done`
fn wait_state<B, F>(bl: &mut B, what: &'static str, mut done: F) -> Result<BootState>
where
    B: BootloaderAccess + ?Sized,
    F: FnMut(BootState) -> bool,
{
    let mut waited = 0;
    loop {
        let state = read_state(bl)?;
        if done(state) {
            return Ok(state);
        }
        log::trace!("Bootloader {} while waiting for {}", state, what);
        if waited >= STATE_TIMEOUT_MS {
            return Err(Error::Timeout(what));
        }
        bl.delay_ms(POLL_INTERVAL_MS);
        waited += POLL_INTERVAL_MS;
    }
}

/// Read the bootloader ID and version
///
/// Only valid while waiting for the unlock command.
pub fn read_bootloader_id<B: BootloaderAccess + ?Sized>(bl: &mut B) -> Result<(u8, Option<u8>)> {
    let mut buf = [0u8; 3];
    bl.read_bytes(&mut buf)?;
    if buf[0] & status::EXTENDED_ID != 0 {
        Ok((buf[1], Some(buf[2])))
    } else {
        Ok((buf[0] & status::STATUS_MASK, None))
    }
}

/// Send every frame of `image`
///
/// The device must already be in bootloader mode.
pub fn flash_firmware<B: BootloaderAccess + ?Sized>(
    bl: &mut B,
    image: &FirmwareImage,
    progress: &mut dyn Progress,
) -> Result<()> {
    let state = wait_state(bl, "bootloader", |s| {
        matches!(
            s,
            BootState::WaitingBootloadCmd | BootState::AppCrcFail | BootState::WaitingFrameData
        )
    })?;

    match state {
        BootState::WaitingFrameData => log::info!("Bootloader already unlocked"),
        BootState::AppCrcFail => {
            log::warn!("Bootloader reports application CRC failure");
            wait_state(bl, "unlock prompt", |s| s == BootState::WaitingBootloadCmd)?;
            unlock(bl)?;
        }
        _ => unlock(bl)?,
    }

    let total = image.frames.len();
    progress.start(total, "frames");
    for (i, frame) in image.frames.iter().enumerate() {
        send_frame(bl, frame, i)?;
        progress.advance(i + 1);
    }
    progress.finish();

    log::info!("Sent {} frames", total);
    Ok(())
}

fn unlock<B: BootloaderAccess + ?Sized>(bl: &mut B) -> Result<()> {
    let (id, version) = read_bootloader_id(bl)?;
    match version {
        Some(v) => log::info!("Bootloader ID {} version {}", id, v),
        None => log::info!("Bootloader ID {}", id),
    }
    bl.write_bytes(&UNLOCK_CMD)?;
    log::debug!("Unlocked bootloader");
    Ok(())
}

fn send_frame<B: BootloaderAccess + ?Sized>(bl: &mut B, frame: &[u8], index: usize) -> Result<()> {
    let mut attempt = 0;
    loop {
        wait_state(bl, "frame data request", |s| s == BootState::WaitingFrameData)?;
        bl.write_bytes(frame)?;

        let result = wait_state(bl, "frame CRC result", |s| {
            matches!(s, BootState::FrameCrcPass | BootState::FrameCrcFail)
        })?;
        if result == BootState::FrameCrcPass {
            log::trace!("Frame {} ({} bytes) accepted", index, frame.len());
            return Ok(());
        }

        attempt += 1;
        log::warn!("Frame {} CRC failure, attempt {}", index, attempt);
        if attempt >= FRAME_RETRIES {
            return Err(Error::Bootloader(format!(
                "frame {} failed CRC check {} times",
                index, attempt
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::NoProgress;
    use std::collections::VecDeque;

    /// Bootloader answering from a scripted state machine
    struct ScriptedBootloader {
        unlocked: bool,
        pending: VecDeque<u8>,
        fail_frames: u32,
        frames: Vec<Vec<u8>>,
    }

    impl ScriptedBootloader {
        fn new(fail_frames: u32) -> Self {
            Self {
                unlocked: false,
                pending: VecDeque::new(),
                fail_frames,
                frames: Vec::new(),
            }
        }
    }

    impl BootloaderAccess for ScriptedBootloader {
        fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
            buf.fill(0);
            buf[0] = match self.pending.pop_front() {
                Some(status) => status,
                None if self.unlocked => status::WAITING_FRAME_DATA,
                None => status::WAITING_BOOTLOAD_CMD | 0x05,
            };
            Ok(())
        }

        fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
            if !self.unlocked {
                assert_eq!(data, UNLOCK_CMD);
                self.unlocked = true;
                return Ok(());
            }
            self.frames.push(data.to_vec());
            self.pending.push_back(status::FRAME_CRC_CHECK);
            if self.fail_frames > 0 {
                self.fail_frames -= 1;
                self.pending.push_back(status::FRAME_CRC_FAIL);
            } else {
                self.pending.push_back(status::FRAME_CRC_PASS);
            }
            Ok(())
        }

        fn delay_ms(&mut self, _ms: u32) {}
    }

    fn image() -> FirmwareImage {
        FirmwareImage::from_bytes(&[0x00, 0x02, 0xAA, 0xBB, 0x00, 0x01, 0xCC]).unwrap()
    }

    #[test]
    fn test_frames() {
        let image = image();
        assert_eq!(
            image.frames(),
            &[vec![0x00, 0x02, 0xAA, 0xBB], vec![0x00, 0x01, 0xCC]]
        );
        assert!(matches!(
            FirmwareImage::from_bytes(&[0x00, 0x05, 0x01]),
            Err(Error::Firmware(_))
        ));
        assert!(matches!(
            FirmwareImage::from_bytes(&[]),
            Err(Error::Firmware(_))
        ));
    }

    #[test]
    fn test_state_decoding() {
        assert_eq!(BootState::from_status(0xC5), BootState::WaitingBootloadCmd);
        assert_eq!(BootState::from_status(0x80), BootState::WaitingFrameData);
        assert_eq!(BootState::from_status(0x40), BootState::AppCrcFail);
        assert_eq!(BootState::from_status(0x04), BootState::FrameCrcPass);
        assert_eq!(BootState::from_status(0x03), BootState::FrameCrcFail);
        assert_eq!(BootState::from_status(0x11), BootState::Unknown(0x11));
    }

    #[test]
    fn test_flash_sends_every_frame() {
        let mut bl = ScriptedBootloader::new(0);
        flash_firmware(&mut bl, &image(), &mut NoProgress).unwrap();
        assert_eq!(bl.frames, image().frames);
    }

    #[test]
    fn test_flash_retries_crc_failures() {
        let mut bl = ScriptedBootloader::new(2);
        flash_firmware(&mut bl, &image(), &mut NoProgress).unwrap();
        assert_eq!(bl.frames.len(), 4);
        assert_eq!(bl.frames[0], bl.frames[2]);
    }

    #[test]
    fn test_flash_gives_up() {
        let mut bl = ScriptedBootloader::new(FRAME_RETRIES);
        assert!(matches!(
            flash_firmware(&mut bl, &image(), &mut NoProgress),
            Err(Error::Bootloader(_))
        ));
        assert_eq!(bl.frames.len(), FRAME_RETRIES as usize);
    }

    #[test]
    fn test_bootloader_address() {
        assert_eq!(bootloader_address(0x4a, None), Some(0x24));
        assert_eq!(bootloader_address(0x4b, Some(0xA0)), Some(0x25));
        assert_eq!(bootloader_address(0x4a, Some(0xA2)), Some(0x26));
        assert_eq!(bootloader_address(0x4c, Some(0xA4)), Some(0x26));
        assert_eq!(bootloader_address(0x5b, None), Some(0x35));
        assert_eq!(bootloader_address(0x10, None), None);
    }

    #[test]
    fn test_load_hex_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0002AABB").unwrap();
        writeln!(file, "0001CC").unwrap();
        assert_eq!(FirmwareImage::load(file.path()).unwrap(), image());
    }
}
