//! Error types for i2c-dev access

use thiserror::Error;

/// i2c-dev specific errors
#[derive(Debug, Error)]
pub enum I2cDevError {
    /// Failed to open the adapter
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to select the slave address
    #[error("Failed to set slave address 0x{address:02x}: {source}")]
    SetAddressFailed {
        address: u8,
        #[source]
        source: std::io::Error,
    },

    /// Read or write on the bus failed
    #[error("I2C transfer failed: {0}")]
    TransferFailed(#[source] std::io::Error),

    /// Fewer bytes were transferred than requested
    #[error("Short transfer: {actual} of {expected} bytes")]
    ShortTransfer { expected: usize, actual: usize },

    /// No adapter/address answered during the scan
    #[error("No maXTouch device found on any i2c adapter")]
    NoDevice,

    /// The application address has no known bootloader address
    #[error("No bootloader address known for 0x{0:02x}")]
    NoBootloaderAddress(u8),
}

impl I2cDevError {
    /// Convert into the core error of a failed register access
    pub fn into_transfer(self, addr: u16, len: usize) -> mxt_core::Error {
        let source = match self {
            Self::TransferFailed(e) => e,
            other => std::io::Error::other(other.to_string()),
        };
        mxt_core::Error::Transfer { addr, len, source }
    }
}

impl From<I2cDevError> for mxt_core::Error {
    fn from(e: I2cDevError) -> Self {
        match e {
            I2cDevError::TransferFailed(e) => mxt_core::Error::Io(e),
            short @ I2cDevError::ShortTransfer { .. } => {
                mxt_core::Error::Io(std::io::Error::other(short.to_string()))
            }
            other => mxt_core::Error::DeviceNotFound(other.to_string()),
        }
    }
}

/// Result type for i2c-dev operations
pub type Result<T> = std::result::Result<T, I2cDevError>;
