//! Device handles and backend selection
//!
//! The CLI only interacts with types from this crate and `mxt-core`; it
//! never names a backend crate directly.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        CLI (mxt-app)                         │
//! │  - option parsing, command selection, output                 │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     mxt-device (this crate)                  │
//! │  - DeviceHandle: transport + info block, released on drop    │
//! │  - registry: opens a Connector by backend name               │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!               ┌───────────────┴───────────────┐
//!               ▼                               ▼
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │    mxt-core              │   │  Backend crates          │
//! │  - RegisterAccess trait  │   │  - i2c-dev, dummy        │
//! │  - object protocols      │   │  - implement Connector   │
//! └──────────────────────────┘   └──────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mxt_core::device::DeviceTarget;
//! use mxt_device::{connector_from_env, DeviceHandle};
//!
//! let mut connector = connector_from_env()?;
//! let handle = DeviceHandle::open(connector.as_mut(), &DeviceTarget::Scan)?;
//! println!("Firmware {}", handle.info().id.firmware_version());
//! ```

mod handle;
mod registry;

pub use handle::DeviceHandle;
pub use registry::{
    available_backends, backend_names_short, connector_from_env, open_connector, BackendInfo,
    BACKEND_ENV, DEFAULT_BACKEND,
};
