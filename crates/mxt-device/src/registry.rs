//! Backend registry
//!
//! Maps backend names to connectors. The backend is chosen with the
//! `MXT_APP_BACKEND` environment variable; only backends enabled at
//! compile time are available.

use mxt_core::device::Connector;
use mxt_core::{Error, Result};

/// Environment variable selecting the backend
pub const BACKEND_ENV: &str = "MXT_APP_BACKEND";

/// Backend used when `MXT_APP_BACKEND` is not set
#[cfg(feature = "i2c-dev")]
pub const DEFAULT_BACKEND: &str = "i2c-dev";
/// Backend used when `MXT_APP_BACKEND` is not set
#[cfg(not(feature = "i2c-dev"))]
pub const DEFAULT_BACKEND: &str = "dummy";

/// Information about a backend
pub struct BackendInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<BackendInfo> {
    let mut backends = Vec::new();

    #[cfg(feature = "i2c-dev")]
    backends.push(BackendInfo {
        name: "i2c-dev",
        aliases: &["i2c", "linux-i2c"],
        description: "Linux i2c-dev adapters (/dev/i2c-N)",
    });

    #[cfg(feature = "dummy")]
    backends.push(BackendInfo {
        name: "dummy",
        aliases: &[],
        description: "In-memory maXTouch emulator for testing",
    });

    backends
}

/// Generate a short list of backend names for CLI help
pub fn backend_names_short() -> String {
    let backends = available_backends();
    if backends.is_empty() {
        return "none (recompile with features)".to_string();
    }
    let names: Vec<&str> = backends.iter().map(|b| b.name).collect();
    names.join(", ")
}

/// Resolve an alias to the backend's primary name
fn canonical_name(name: &str) -> Option<&'static str> {
    available_backends()
        .into_iter()
        .find(|b| b.name == name || b.aliases.contains(&name))
        .map(|b| b.name)
}

/// Open a connector by backend name
pub fn open_connector(name: &str) -> Result<Box<dyn Connector>> {
    match canonical_name(name) {
        #[cfg(feature = "i2c-dev")]
        Some("i2c-dev") => Ok(Box::new(mxt_i2c_dev::I2cDevConnector::new())),

        #[cfg(feature = "dummy")]
        Some("dummy") => Ok(Box::new(mxt_dummy::DummyConnector::default())),

        _ => Err(Error::DeviceNotFound(format!(
            "Unknown backend '{}' (available: {})",
            name,
            backend_names_short()
        ))),
    }
}

/// Open the connector named by `MXT_APP_BACKEND`, or the default one
pub fn connector_from_env() -> Result<Box<dyn Connector>> {
    let name = std::env::var(BACKEND_ENV).unwrap_or_else(|_| DEFAULT_BACKEND.to_string());
    log::debug!("Using backend {}", name);
    open_connector(&name)
}
