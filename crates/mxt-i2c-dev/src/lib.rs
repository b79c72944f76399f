//! mxt-i2c-dev - Linux i2c-dev backend
//!
//! This crate talks to maXTouch controllers through the Linux
//! `/dev/i2c-N` character devices.
//!
//! # Overview
//!
//! Registers are addressed with a 16-bit little endian register address
//! written before every transfer. The device is either given explicitly
//! (adapter and address) or found by scanning every adapter for the
//! addresses maXTouch parts answer on. In bootloader mode the device moves
//! to a different address derived from the application address.
//!
//! # Example
//!
//! ```no_run
//! use mxt_core::device::RegisterAccess;
//! use mxt_i2c_dev::I2cDev;
//!
//! let mut dev = I2cDev::open(2, 0x4a)?;
//! let mut id = [0u8; 7];
//! dev.read_register(0, &mut id)?;
//! println!("Family {:02X} variant {:02X}", id[0], id[1]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with `CONFIG_I2C_CHARDEV`
//! - Read/write access to `/dev/i2c-N` (usually the `i2c` group)
//! - The kernel touchscreen driver must not be bound to the address

pub mod device;
pub mod error;

// Re-exports
pub use device::{list_adapters, I2cBootloader, I2cDev, I2cDevConnector, APP_ADDRESSES};
pub use error::{I2cDevError, Result};
