//! Register window resolution
//!
//! Operators address registers either symbolically (object type, instance
//! and an offset into the object) or directly (object type 0 and an
//! absolute register address). Both end up as a `RegisterWindow`.

use crate::error::{Error, Result};
use crate::info::ObjectDirectory;

/// Capacity of the buffer used to stage transferred bytes
pub const MAX_TRANSFER: usize = 1024;

/// Concrete register range targeted by a read or write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWindow {
    /// First register
    pub address: u16,
    /// Number of bytes
    pub length: usize,
}

/// Resolve an object reference into a register window
///
/// * `object_type == 0`: `offset` is an absolute register address and
///   `count` must be non-zero.
/// * otherwise the object instance is looked up in `directory`; the window
///   starts `offset` bytes into it and covers `count` bytes, or the declared
///   object size when `count` is 0.
///
/// The window is rejected if it does not fit the staging buffer.
pub fn resolve<D: ObjectDirectory + ?Sized>(
    directory: &D,
    object_type: u16,
    instance: u8,
    offset: u16,
    count: u16,
) -> Result<RegisterWindow> {
    let window = if object_type == 0 {
        if count == 0 {
            return Err(Error::MissingCount);
        }
        RegisterWindow {
            address: offset,
            length: usize::from(count),
        }
    } else {
        let object = directory
            .object_address(object_type, instance)
            .ok_or(Error::ObjectNotFound {
                object_type,
                instance,
            })?;

        log::debug!(
            "T{} address:{} offset:{}",
            object_type,
            object.base,
            offset
        );

        let address = object
            .base
            .checked_add(offset)
            .ok_or(Error::AddressOverflow {
                base: object.base,
                offset,
            })?;
        let length = if count != 0 { count } else { object.size };

        RegisterWindow {
            address,
            length: usize::from(length),
        }
    };

    if window.length > MAX_TRANSFER {
        return Err(Error::WindowTooLarge {
            length: window.length,
            capacity: MAX_TRANSFER,
        });
    }

    Ok(window)
}
