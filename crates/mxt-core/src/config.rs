//! OBP_RAW configuration files
//!
//! ```text
//! OBP_RAW V1
//! A4 0C 10 AA 03 02 09
//! 5E21C7
//! 0B3A91
//! 0007 0000 0004 20 FF 32 03
//! 0009 0001 000A 83 00 00 ...
//! ```
//!
//! The header is followed by the device ID, the info block checksum and the
//! checksum over all configuration bytes. Every further line is one object
//! instance: type, instance and size as four hex digits, then the bytes.

use crate::crc::crc24;
use crate::device::RegisterAccess;
use crate::error::{Error, Result};
use crate::hex::{decode_hex_into, encode_hex};
use crate::info::{DeviceId, InfoBlock, ObjectDirectory, ID_SIZE};
use crate::objects::NON_CONFIG_OBJECTS;
use std::fmt::Write as _;
use std::path::Path;

/// First line of every configuration file
pub const OBP_RAW_MAGIC: &str = "OBP_RAW V1";

/// Configuration of one object instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigObject {
    /// Object type
    pub object_type: u16,
    /// Instance
    pub instance: u8,
    /// Register contents
    pub data: Vec<u8>,
}

/// Parsed configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    /// ID of the device the configuration was saved from
    pub id: DeviceId,
    /// Info block checksum of that device
    pub info_crc: u32,
    /// Checksum over every object's data
    pub config_crc: u32,
    /// Object instances in file order
    pub objects: Vec<ConfigObject>,
}

fn config_error(line: usize, msg: impl std::fmt::Display) -> Error {
    Error::Config(format!("line {}: {}", line + 1, msg))
}

fn parse_field<T>(
    line: usize,
    field: Option<&str>,
    what: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<T> {
    field
        .and_then(parse)
        .ok_or_else(|| config_error(line, format_args!("bad {}", what)))
}

fn hex_u16(s: &str) -> Option<u16> {
    u16::from_str_radix(s, 16).ok()
}

fn hex_u32(s: &str) -> Option<u32> {
    u32::from_str_radix(s, 16).ok()
}

fn hex_u8(s: &str) -> Option<u8> {
    u8::from_str_radix(s, 16).ok()
}

impl ConfigFile {
    /// Checksum over the data of every object, in file order
    pub fn calculate_crc(objects: &[ConfigObject]) -> u32 {
        let data: Vec<u8> = objects.iter().flat_map(|o| o.data.iter().copied()).collect();
        crc24(&data)
    }

    /// Parse OBP_RAW text
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(n, l)| (n, l.trim()))
            .filter(|(_, l)| !l.is_empty());

        match lines.next() {
            Some((_, OBP_RAW_MAGIC)) => {}
            Some((n, other)) => {
                return Err(config_error(n, format_args!("unknown format '{}'", other)))
            }
            None => return Err(Error::Config("empty file".into())),
        }

        let (n, id_line) = lines
            .next()
            .ok_or_else(|| Error::Config("missing ID line".into()))?;
        let id_bytes: Vec<u8> = id_line
            .split_whitespace()
            .map(hex_u8)
            .collect::<Option<_>>()
            .ok_or_else(|| config_error(n, "bad ID"))?;
        let id_bytes: [u8; ID_SIZE] = id_bytes
            .try_into()
            .map_err(|_| config_error(n, "ID must be 7 bytes"))?;
        let id = DeviceId::parse(&id_bytes);

        let (n, crc_line) = lines
            .next()
            .ok_or_else(|| Error::Config("missing info block checksum".into()))?;
        let info_crc = parse_field(n, Some(crc_line), "info block checksum", hex_u32)?;

        let (n, crc_line) = lines
            .next()
            .ok_or_else(|| Error::Config("missing config checksum".into()))?;
        let config_crc = parse_field(n, Some(crc_line), "config checksum", hex_u32)?;

        let mut objects = Vec::new();
        for (n, line) in lines {
            let mut fields = line.split_whitespace();
            let object_type = parse_field(n, fields.next(), "object type", hex_u16)?;
            let instance = parse_field(n, fields.next(), "instance", hex_u16)?;
            let instance =
                u8::try_from(instance).map_err(|_| config_error(n, "instance out of range"))?;
            let size = usize::from(parse_field(n, fields.next(), "size", hex_u16)?);

            let hex: String = fields.collect();
            let data = if hex.is_empty() {
                Vec::new()
            } else {
                decode_hex_into(&hex, size).map_err(|e| config_error(n, e))?
            };
            if data.len() != size {
                return Err(config_error(
                    n,
                    format_args!("T{} has {} bytes, size says {}", object_type, data.len(), size),
                ));
            }

            objects.push(ConfigObject {
                object_type,
                instance,
                data,
            });
        }

        let file = Self {
            id,
            info_crc,
            config_crc,
            objects,
        };
        let calculated = Self::calculate_crc(&file.objects);
        if file.config_crc != calculated {
            log::warn!(
                "Config checksum mismatch: file 0x{:06X}, calculated 0x{:06X}",
                file.config_crc,
                calculated
            );
        }
        Ok(file)
    }

    /// Format as OBP_RAW text
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", OBP_RAW_MAGIC);
        let _ = writeln!(out, "{}", encode_hex(&self.id.to_bytes(), " "));
        let _ = writeln!(out, "{:06X}", self.info_crc);
        let _ = writeln!(out, "{:06X}", self.config_crc);
        for object in &self.objects {
            let _ = write!(
                out,
                "{:04X} {:04X} {:04X}",
                object.object_type,
                object.instance,
                object.data.len()
            );
            if !object.data.is_empty() {
                let _ = write!(out, " {}", encode_hex(&object.data, " "));
            }
            out.push('\n');
        }
        out
    }
}

/// Read every configuration object from the device
pub fn read_config<D: RegisterAccess + ?Sized>(
    device: &mut D,
    info: &InfoBlock,
) -> Result<ConfigFile> {
    let mut objects = Vec::new();
    for entry in &info.objects {
        let object_type = u16::from(entry.object_type);
        if NON_CONFIG_OBJECTS.contains(&object_type) {
            continue;
        }
        for instance in 0..entry.instances {
            let instance = u8::try_from(instance)
                .map_err(|_| Error::InfoBlock(format!("T{} has too many instances", object_type)))?;
            let address = info.require(object_type, instance)?;
            let mut data = vec![0u8; usize::from(address.size)];
            device.read_register(address.base, &mut data)?;
            objects.push(ConfigObject {
                object_type,
                instance,
                data,
            });
        }
    }

    Ok(ConfigFile {
        id: info.id,
        info_crc: info.crc,
        config_crc: ConfigFile::calculate_crc(&objects),
        objects,
    })
}

/// Write a configuration to the device
///
/// Objects the device does not have are skipped with a warning. Data is
/// truncated or zero padded to the size the device declares.
pub fn write_config<D: RegisterAccess + ?Sized>(
    device: &mut D,
    info: &InfoBlock,
    config: &ConfigFile,
) -> Result<()> {
    if config.id != info.id {
        log::warn!(
            "Config was saved from a different device: {} vs {}",
            encode_hex(&config.id.to_bytes(), " "),
            encode_hex(&info.id.to_bytes(), " ")
        );
    }
    if config.info_crc != info.crc {
        log::warn!(
            "Info block checksum mismatch: config 0x{:06X}, device 0x{:06X}",
            config.info_crc,
            info.crc
        );
    }

    let mut written = 0;
    for object in &config.objects {
        if NON_CONFIG_OBJECTS.contains(&object.object_type) {
            log::warn!("Skipping T{}: not a configuration object", object.object_type);
            continue;
        }
        let Some(address) = info.object_address(object.object_type, object.instance) else {
            log::warn!(
                "Skipping T{} instance {}: not present on device",
                object.object_type,
                object.instance
            );
            continue;
        };

        let size = usize::from(address.size);
        let mut data = object.data.clone();
        if data.len() != size {
            log::warn!(
                "T{} instance {}: file has {} bytes, device has {}",
                object.object_type,
                object.instance,
                data.len(),
                size
            );
            data.resize(size, 0);
        }

        device.write_register(address.base, &data)?;
        written += 1;
    }

    log::debug!("Wrote {} object instances", written);
    Ok(())
}

/// Save the device configuration to `path`
pub fn save_config_file<D: RegisterAccess + ?Sized>(
    device: &mut D,
    info: &InfoBlock,
    path: &Path,
) -> Result<()> {
    let config = read_config(device, info)?;
    std::fs::write(path, config.to_text())?;
    log::info!(
        "Saved {} objects to {}",
        config.objects.len(),
        path.display()
    );
    Ok(())
}

/// Load a configuration from `path` and write it to the device
pub fn load_config_file<D: RegisterAccess + ?Sized>(
    device: &mut D,
    info: &InfoBlock,
    path: &Path,
) -> Result<()> {
    log::info!("Opening config file {}", path.display());
    let text = std::fs::read_to_string(path)?;
    let config = ConfigFile::parse(&text)?;
    write_config(device, info, &config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{info_block, MockDevice, T6_ADDR, T7_ADDR};

    #[test]
    fn test_save_skips_non_config_objects() {
        let info = info_block();
        let mut dev = MockDevice::new();
        let config = read_config(&mut dev, &info).unwrap();

        let types: Vec<u16> = config.objects.iter().map(|o| o.object_type).collect();
        assert_eq!(types, vec![7, 9, 9, 25, 66, 68]);
        assert_eq!(config.objects[2].instance, 1);
        assert_eq!(config.id, info.id);
    }

    #[test]
    fn test_text_format() {
        let info = info_block();
        let mut dev = MockDevice::new();
        dev.write_register(T7_ADDR, &[0x20, 0xFF, 0x32, 0x03]).unwrap();
        let config = read_config(&mut dev, &info).unwrap();
        let text = config.to_text();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "OBP_RAW V1");
        assert_eq!(lines[1], "A4 0C 10 AA 03 02 09");
        assert_eq!(lines[2], format!("{:06X}", info.crc));
        assert_eq!(lines[4], "0007 0000 0004 20 FF 32 03");

        assert_eq!(ConfigFile::parse(&text).unwrap(), config);
    }

    #[test]
    fn test_write_pads_and_skips() {
        let info = info_block();
        let mut dev = MockDevice::new();
        let config = ConfigFile {
            id: info.id,
            info_crc: info.crc,
            config_crc: 0,
            objects: vec![
                ConfigObject {
                    object_type: 7,
                    instance: 0,
                    data: vec![1, 2],
                },
                ConfigObject {
                    object_type: 100,
                    instance: 0,
                    data: vec![1],
                },
                ConfigObject {
                    object_type: 6,
                    instance: 0,
                    data: vec![1],
                },
            ],
        };
        write_config(&mut dev, &info, &config).unwrap();
        assert_eq!(dev.writes_to(T7_ADDR), vec![vec![1, 2, 0, 0]]);
        assert!(dev.writes_to(T6_ADDR).is_empty());
        assert_eq!(dev.writes.len(), 1);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(ConfigFile::parse(""), Err(Error::Config(_))));
        assert!(matches!(
            ConfigFile::parse("OBP_RAW V2\n"),
            Err(Error::Config(_))
        ));
        let short_id = "OBP_RAW V1\nA4 0C\n000000\n000000\n";
        assert!(matches!(ConfigFile::parse(short_id), Err(Error::Config(_))));
        let bad_size = "OBP_RAW V1\nA4 0C 10 AA 03 02 09\n000000\n000000\n0007 0000 0004 20 FF\n";
        assert!(matches!(ConfigFile::parse(bad_size), Err(Error::Config(_))));
    }

    #[test]
    fn test_file_round_trip() {
        let info = info_block();
        let mut dev = MockDevice::new();
        dev.write_register(T7_ADDR, &[0x40, 0x0A, 0x32, 0x00]).unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();
        save_config_file(&mut dev, &info, file.path()).unwrap();

        let mut other = MockDevice::new();
        load_config_file(&mut other, &info, file.path()).unwrap();
        assert_eq!(other.mem(T7_ADDR, 4), &[0x40, 0x0A, 0x32, 0x00]);
    }
}
