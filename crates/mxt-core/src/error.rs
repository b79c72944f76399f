//! Error types for mxt-core
//!
//! A single error enum covers the whole invocation: usage problems found
//! while building the command, device acquisition failures, addressing
//! failures, transfer failures and failures reported by the object
//! protocols.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    // Usage errors
    /// A second primary command was requested
    #[error("conflicting commands: {first} and {second}")]
    ConflictingCommands {
        /// Command that was selected first
        first: &'static str,
        /// Command that caused the conflict
        second: &'static str,
    },
    /// Missing or invalid argument
    #[error("{0}")]
    Usage(String),

    // Device acquisition
    /// No responding device, or the explicit adapter/address is invalid
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    /// Info block could not be read or failed validation
    #[error("error reading info block: {0}")]
    InfoBlock(String),

    // Addressing errors
    /// Object type/instance is not present in the object table
    #[error("no such object: T{object_type} instance {instance}")]
    ObjectNotFound {
        /// Requested object type
        object_type: u16,
        /// Requested instance
        instance: u8,
    },
    /// Raw register access without an explicit count
    #[error("not enough arguments: a count is required when no object type is given")]
    MissingCount,
    /// Register window does not fit the staging buffer
    #[error("register window of {length} bytes exceeds buffer capacity of {capacity} bytes")]
    WindowTooLarge {
        /// Requested length
        length: usize,
        /// Buffer capacity
        capacity: usize,
    },
    /// Object base plus offset leaves the 16-bit register space
    #[error("register offset {offset} from 0x{base:04X} is outside the register space")]
    AddressOverflow {
        /// Object base address
        base: u16,
        /// User offset
        offset: u16,
    },
    /// Hex input contains an invalid digit or an odd number of digits
    #[error("hex convert error at position {position}")]
    HexParse {
        /// Character position of the problem
        position: usize,
    },
    /// Hex input holds more bytes than the register window
    #[error("hex input of {given} bytes does not fit {capacity} byte window")]
    HexOverflow {
        /// Bytes supplied
        given: usize,
        /// Window length
        capacity: usize,
    },

    // I/O errors
    /// Register transfer failed
    #[error("register transfer of {len} bytes at 0x{addr:04X} failed: {source}")]
    Transfer {
        /// Register address
        addr: u16,
        /// Transfer length
        len: usize,
        /// Underlying bus error
        #[source]
        source: std::io::Error,
    },
    /// File or socket I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    // Orchestration
    /// A composite command aborted at the named step
    #[error("step '{step}' failed: {source}")]
    ChainStepFailure {
        /// Name of the failed step
        step: &'static str,
        /// Why the step failed
        #[source]
        source: Box<Error>,
    },
    /// Device did not respond in time
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    // Collaborator failures
    /// Self test reported a failure code
    #[error("self test failed with code 0x{0:02X}")]
    SelfTest(u8),
    /// Golden reference sequence reported an error status
    #[error("golden references failed: status 0x{0:02X}")]
    GoldenReferences(u8),
    /// Bootloader protocol error
    #[error("bootloader: {0}")]
    Bootloader(String),
    /// Firmware file or firmware version problem
    #[error("firmware: {0}")]
    Firmware(String),
    /// Configuration file problem
    #[error("config: {0}")]
    Config(String),
    /// Bridge protocol problem
    #[error("bridge: {0}")]
    Bridge(String),
}

impl Error {
    /// Whether the error is a usage error (bad command line)
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::ConflictingCommands { .. }
                | Self::Usage(_)
                | Self::MissingCount
                | Self::HexParse { .. }
                | Self::HexOverflow { .. }
                | Self::WindowTooLarge { .. }
                | Self::AddressOverflow { .. }
        )
    }

    /// Whether the error means the device could not be acquired
    pub fn is_device_unavailable(&self) -> bool {
        matches!(self, Self::DeviceNotFound(_) | Self::InfoBlock(_))
    }
}

/// Result type alias using the core Error type
pub type Result<T> = std::result::Result<T, Error>;
