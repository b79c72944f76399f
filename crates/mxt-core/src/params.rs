//! Invocation parameters
//!
//! `ParameterSet` is filled in by the command line front end and is treated
//! as read-only once command selection has finished.

/// Default TCP port for the bridge
pub const DEFAULT_BRIDGE_PORT: u16 = 4000;

/// Default T68 datatype
pub const DEFAULT_T68_DATATYPE: u16 = 1;

/// What the T37 diagnostic object should capture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiagMode {
    /// Signal deltas
    #[default]
    Deltas,
    /// Reference values
    References,
}

impl DiagMode {
    /// Name used in log output and file headers
    pub fn name(self) -> &'static str {
        match self {
            Self::Deltas => "deltas",
            Self::References => "refs",
        }
    }
}

/// All user supplied scalars for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSet {
    /// Register address, or offset into the object when an object type is given
    pub register: u16,
    /// Number of bytes to read/write; 0 means "use the object size"
    pub count: u16,
    /// Object type; 0 means raw register addressing
    pub object_type: u16,
    /// Object instance
    pub instance: u8,
    /// Verbosity level
    pub verbose: u8,
    /// Formatted register output
    pub format: bool,
    /// TCP port for the bridge
    pub port: u16,
    /// Firmware version to check before and after a flash
    pub firmware_version: Option<String>,
    /// Number of T37 frames to capture
    pub frames: u16,
    /// T37 capture mode
    pub diag_mode: DiagMode,
    /// T68 serial datatype
    pub t68_datatype: u16,
    /// I2C adapter number
    pub i2c_adapter: Option<u32>,
    /// I2C 7-bit device address
    pub i2c_address: Option<u8>,
    /// Trailing positional arguments (hex data for writes)
    pub positional: Vec<String>,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            register: 0,
            count: 0,
            object_type: 0,
            instance: 0,
            verbose: 0,
            format: false,
            port: DEFAULT_BRIDGE_PORT,
            firmware_version: None,
            frames: 1,
            diag_mode: DiagMode::Deltas,
            t68_datatype: DEFAULT_T68_DATATYPE,
            i2c_adapter: None,
            i2c_address: None,
            positional: Vec::new(),
        }
    }
}

impl ParameterSet {
    /// Addressing parameters used by read and write, one `name:value` each
    pub fn addressing(&self) -> [(&'static str, String); 5] {
        [
            ("instance", self.instance.to_string()),
            ("count", self.count.to_string()),
            ("address", self.register.to_string()),
            ("object_type", self.object_type.to_string()),
            ("format", self.format.to_string()),
        ]
    }

    /// Log the addressing parameters used by read and write
    pub fn log_addressing(&self) {
        for (name, value) in self.addressing() {
            log::debug!("{}:{}", name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addressing() {
        let params = ParameterSet {
            register: 0x120,
            count: 4,
            object_type: 7,
            instance: 1,
            format: true,
            ..Default::default()
        };
        let addressing = params.addressing();
        assert_eq!(addressing[0], ("instance", "1".to_string()));
        assert_eq!(addressing[1], ("count", "4".to_string()));
        assert_eq!(addressing[2], ("address", "288".to_string()));
        assert_eq!(addressing[3], ("object_type", "7".to_string()));
        assert_eq!(addressing[4], ("format", "true".to_string()));
    }
}
