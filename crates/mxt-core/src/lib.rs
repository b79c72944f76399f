//! mxt-core - Core library for maXTouch controller tooling
//!
//! This crate holds everything that does not depend on a particular bus
//! backend:
//!
//! - the invocation model (`ParameterSet`, `Command` and the single
//!   assignment command selector)
//! - register addressing (`resolve` turns an object reference into a
//!   `RegisterWindow`)
//! - the step orchestrator that executes a selected command, including the
//!   fail-fast `StepChain` used by composite commands
//! - the info block / object directory and the per-object protocols
//!   (command processor, message processor, self test, golden references,
//!   serial data, diagnostic debug)
//! - the OBP_RAW configuration codec, the bootloader flash protocol and the
//!   TCP bridge
//!
//! Backends implement [`device::RegisterAccess`] (and
//! [`device::BootloaderAccess`] for firmware updates) and hand them out
//! through a [`device::Connector`].
//!
//! # Example
//!
//! ```ignore
//! use mxt_core::address::resolve;
//! use mxt_core::info::InfoBlock;
//!
//! let info = InfoBlock::read(&mut device)?;
//! let window = resolve(&info, 9, 0, 0, 0)?;
//! println!("T9 lives at 0x{:04X} ({} bytes)", window.address, window.length);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod address;
pub mod bootloader;
pub mod bridge;
pub mod chain;
pub mod command;
pub mod config;
pub mod crc;
pub mod device;
pub mod error;
pub mod hex;
pub mod info;
pub mod objects;
pub mod ops;
pub mod orchestrator;
pub mod params;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
