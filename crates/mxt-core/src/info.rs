//! Info block parsing and the object directory
//!
//! The info block sits at register 0 and describes the device:
//!
//! ```text
//! +---------+------------------------------+---------+
//! | ID (7)  | object table (6 * objects)   | CRC (3) |
//! +---------+------------------------------+---------+
//! ```
//!
//! Each object table entry is `type, start (LE16), size - 1,
//! instances - 1, report ids per instance`. Report ids are handed out in
//! table order starting at 1; id 0 is reserved and 0xFF means "no message".

use crate::crc::{crc24, read_crc24};
use crate::device::RegisterAccess;
use crate::error::{Error, Result};

/// Size of the ID header
pub const ID_SIZE: usize = 7;
/// Size of one object table entry
pub const OBJECT_ENTRY_SIZE: usize = 6;
/// Size of the trailing checksum
pub const CRC_SIZE: usize = 3;

/// Report id meaning "no message pending"
pub const REPORT_ID_INVALID: u8 = 0xFF;

/// Device identification header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId {
    /// Family
    pub family_id: u8,
    /// Variant within the family
    pub variant_id: u8,
    /// Firmware version, major in the high nibble
    pub version: u8,
    /// Firmware build
    pub build: u8,
    /// Number of X lines
    pub matrix_x_size: u8,
    /// Number of Y lines
    pub matrix_y_size: u8,
    /// Number of entries in the object table
    pub num_objects: u8,
}

impl DeviceId {
    pub(crate) fn parse(bytes: &[u8; ID_SIZE]) -> Self {
        Self {
            family_id: bytes[0],
            variant_id: bytes[1],
            version: bytes[2],
            build: bytes[3],
            matrix_x_size: bytes[4],
            matrix_y_size: bytes[5],
            num_objects: bytes[6],
        }
    }

    /// Encode back into the 7 byte wire form
    pub fn to_bytes(&self) -> [u8; ID_SIZE] {
        [
            self.family_id,
            self.variant_id,
            self.version,
            self.build,
            self.matrix_x_size,
            self.matrix_y_size,
            self.num_objects,
        ]
    }

    /// Firmware version string, e.g. `1.0.AA`
    pub fn firmware_version(&self) -> String {
        format!(
            "{}.{}.{:02X}",
            self.version >> 4,
            self.version & 0x0F,
            self.build
        )
    }

    /// Number of touch nodes in the sensor matrix
    pub fn node_count(&self) -> usize {
        usize::from(self.matrix_x_size) * usize::from(self.matrix_y_size)
    }
}

/// One entry of the object table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Object type
    pub object_type: u8,
    /// Address of instance 0
    pub start_address: u16,
    /// Size of one instance in bytes
    pub size: u16,
    /// Number of instances
    pub instances: u16,
    /// Report ids per instance
    pub num_report_ids: u8,
}

impl ObjectEntry {
    fn parse(bytes: &[u8]) -> Self {
        Self {
            object_type: bytes[0],
            start_address: u16::from_le_bytes([bytes[1], bytes[2]]),
            size: u16::from(bytes[3]) + 1,
            instances: u16::from(bytes[4]) + 1,
            num_report_ids: bytes[5],
        }
    }

    fn to_bytes(self) -> [u8; OBJECT_ENTRY_SIZE] {
        let [lo, hi] = self.start_address.to_le_bytes();
        [
            self.object_type,
            lo,
            hi,
            (self.size - 1) as u8,
            (self.instances - 1) as u8,
            self.num_report_ids,
        ]
    }

    /// Address of the given instance
    pub fn instance_address(&self, instance: u8) -> Option<u16> {
        if u16::from(instance) >= self.instances {
            return None;
        }
        u16::from(instance)
            .checked_mul(self.size)
            .and_then(|offset| self.start_address.checked_add(offset))
    }
}

/// Base address and declared size of one object instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectAddress {
    /// Address of the instance
    pub base: u16,
    /// Declared size of the instance
    pub size: u16,
}

/// Lookup of object instances by type
pub trait ObjectDirectory {
    /// Find the address and size of `(object_type, instance)`
    fn object_address(&self, object_type: u16, instance: u8) -> Option<ObjectAddress>;
}

/// Parsed info block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoBlock {
    /// ID header
    pub id: DeviceId,
    /// Object table
    pub objects: Vec<ObjectEntry>,
    /// Checksum stored on the device
    pub crc: u32,
    /// `(type, instance)` owning each report id, indexed by id - 1
    report_ids: Vec<(u16, u8)>,
}

impl InfoBlock {
    /// Build an info block from its parts, computing the checksum
    pub fn new(mut id: DeviceId, objects: Vec<ObjectEntry>) -> Self {
        id.num_objects = objects.len() as u8;
        let mut info = Self {
            id,
            report_ids: build_report_ids(&objects),
            objects,
            crc: 0,
        };
        info.crc = crc24(&info.to_bytes_without_crc());
        info
    }

    /// Total length of an info block with `num_objects` entries
    pub fn encoded_len(num_objects: u8) -> usize {
        ID_SIZE + usize::from(num_objects) * OBJECT_ENTRY_SIZE + CRC_SIZE
    }

    /// Parse and validate an info block
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ID_SIZE {
            return Err(Error::InfoBlock("truncated ID header".into()));
        }

        let mut id_bytes = [0u8; ID_SIZE];
        id_bytes.copy_from_slice(&bytes[..ID_SIZE]);
        let id = DeviceId::parse(&id_bytes);

        let total = Self::encoded_len(id.num_objects);
        if bytes.len() < total {
            return Err(Error::InfoBlock(format!(
                "truncated object table: {} of {} bytes",
                bytes.len(),
                total
            )));
        }

        let table_end = total - CRC_SIZE;
        let objects: Vec<ObjectEntry> = bytes[ID_SIZE..table_end]
            .chunks_exact(OBJECT_ENTRY_SIZE)
            .map(ObjectEntry::parse)
            .collect();

        let mut crc_bytes = [0u8; CRC_SIZE];
        crc_bytes.copy_from_slice(&bytes[table_end..total]);
        let stored = read_crc24(&crc_bytes);
        let calculated = crc24(&bytes[..table_end]);
        if stored != calculated {
            return Err(Error::InfoBlock(format!(
                "checksum mismatch: stored 0x{:06X}, calculated 0x{:06X}",
                stored, calculated
            )));
        }

        Ok(Self {
            id,
            report_ids: build_report_ids(&objects),
            objects,
            crc: stored,
        })
    }

    /// Read the info block from a device
    pub fn read<D: RegisterAccess + ?Sized>(device: &mut D) -> Result<Self> {
        let mut id = [0u8; ID_SIZE];
        device.read_register(0, &mut id)?;

        let mut bytes = vec![0u8; Self::encoded_len(id[6])];
        device.read_register(0, &mut bytes)?;

        let info = Self::parse(&bytes)?;
        log::debug!(
            "Family 0x{:02X} variant 0x{:02X} firmware {} with {} objects",
            info.id.family_id,
            info.id.variant_id,
            info.id.firmware_version(),
            info.objects.len()
        );
        Ok(info)
    }

    fn to_bytes_without_crc(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::encoded_len(self.id.num_objects));
        bytes.extend_from_slice(&self.id.to_bytes());
        for object in &self.objects {
            bytes.extend_from_slice(&object.to_bytes());
        }
        bytes
    }

    /// Encode into the on-device form including the checksum
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.to_bytes_without_crc();
        bytes.extend_from_slice(&self.crc.to_le_bytes()[..CRC_SIZE]);
        bytes
    }

    /// Find an object table entry by type
    pub fn object(&self, object_type: u16) -> Option<&ObjectEntry> {
        let object_type = u8::try_from(object_type).ok()?;
        self.objects.iter().find(|o| o.object_type == object_type)
    }

    /// Find the `(type, instance)` that owns a report id
    pub fn report_id_owner(&self, report_id: u8) -> Option<(u16, u8)> {
        if report_id == 0 {
            return None;
        }
        self.report_ids.get(usize::from(report_id) - 1).copied()
    }

    /// Address of the object instance, or `ObjectNotFound`
    pub fn require(&self, object_type: u16, instance: u8) -> Result<ObjectAddress> {
        self.object_address(object_type, instance)
            .ok_or(Error::ObjectNotFound {
                object_type,
                instance,
            })
    }

    /// Number of report ids in use
    pub fn max_report_id(&self) -> usize {
        self.report_ids.len()
    }
}

impl ObjectDirectory for InfoBlock {
    fn object_address(&self, object_type: u16, instance: u8) -> Option<ObjectAddress> {
        let object = self.object(object_type)?;
        let base = object.instance_address(instance)?;
        Some(ObjectAddress {
            base,
            size: object.size,
        })
    }
}

fn build_report_ids(objects: &[ObjectEntry]) -> Vec<(u16, u8)> {
    let mut ids = Vec::new();
    for object in objects {
        if object.num_report_ids == 0 {
            continue;
        }
        for instance in 0..object.instances {
            for _ in 0..object.num_report_ids {
                ids.push((u16::from(object.object_type), instance as u8));
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InfoBlock {
        InfoBlock::new(
            DeviceId {
                family_id: 0xA4,
                variant_id: 0x01,
                version: 0x10,
                build: 0xAA,
                matrix_x_size: 4,
                matrix_y_size: 3,
                num_objects: 0,
            },
            vec![
                ObjectEntry {
                    object_type: 6,
                    start_address: 100,
                    size: 6,
                    instances: 1,
                    num_report_ids: 1,
                },
                ObjectEntry {
                    object_type: 9,
                    start_address: 200,
                    size: 8,
                    instances: 2,
                    num_report_ids: 2,
                },
            ],
        )
    }

    #[test]
    fn test_roundtrip_and_crc() {
        let info = sample();
        let bytes = info.to_bytes();
        assert_eq!(bytes.len(), InfoBlock::encoded_len(2));
        assert_eq!(InfoBlock::parse(&bytes).unwrap(), info);
    }

    #[test]
    fn test_crc_mismatch_rejected() {
        let mut bytes = sample().to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(InfoBlock::parse(&bytes), Err(Error::InfoBlock(_))));
    }

    #[test]
    fn test_truncated_rejected() {
        let bytes = sample().to_bytes();
        assert!(InfoBlock::parse(&bytes[..10]).is_err());
        assert!(InfoBlock::parse(&bytes[..3]).is_err());
    }

    #[test]
    fn test_instance_addresses() {
        let info = sample();
        assert_eq!(
            info.object_address(9, 1),
            Some(ObjectAddress { base: 208, size: 8 })
        );
        assert_eq!(info.object_address(9, 2), None);
        assert_eq!(info.object_address(7, 0), None);
        assert_eq!(info.object_address(0x109, 0), None);
    }

    #[test]
    fn test_report_ids() {
        let info = sample();
        assert_eq!(info.max_report_id(), 5);
        assert_eq!(info.report_id_owner(0), None);
        assert_eq!(info.report_id_owner(1), Some((6, 0)));
        assert_eq!(info.report_id_owner(2), Some((9, 0)));
        assert_eq!(info.report_id_owner(3), Some((9, 0)));
        assert_eq!(info.report_id_owner(4), Some((9, 1)));
        assert_eq!(info.report_id_owner(6), None);
    }

    #[test]
    fn test_firmware_version() {
        assert_eq!(sample().id.firmware_version(), "1.0.AA");
    }
}
