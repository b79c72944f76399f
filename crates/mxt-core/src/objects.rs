//! Object type numbers and register layouts
//!
//! Offsets are relative to the start of the object instance.

/// Object types known to the tool
pub mod types {
    /// Message processor
    pub const GEN_MESSAGEPROCESSOR_T5: u16 = 5;
    /// Command processor
    pub const GEN_COMMANDPROCESSOR_T6: u16 = 6;
    /// Power configuration
    pub const GEN_POWERCONFIG_T7: u16 = 7;
    /// Self test
    pub const SPT_SELFTEST_T25: u16 = 25;
    /// Diagnostic debug
    pub const DEBUG_DIAGNOSTIC_T37: u16 = 37;
    /// Message count
    pub const SPT_MESSAGECOUNT_T44: u16 = 44;
    /// Golden references
    pub const SPT_GOLDENREFERENCES_T66: u16 = 66;
    /// Serial data command
    pub const SPT_SERIALDATACOMMAND_T68: u16 = 68;
}

/// Objects that never belong in a saved configuration
pub const NON_CONFIG_OBJECTS: &[u16] = &[
    types::GEN_MESSAGEPROCESSOR_T5,
    types::GEN_COMMANDPROCESSOR_T6,
    types::DEBUG_DIAGNOSTIC_T37,
    types::SPT_MESSAGECOUNT_T44,
];

/// Command processor (T6)
pub mod t6 {
    use bitflags::bitflags;

    /// Reset register
    pub const RESET: u16 = 0;
    /// Backup to non-volatile memory register
    pub const BACKUPNV: u16 = 1;
    /// Calibrate register
    pub const CALIBRATE: u16 = 2;
    /// Report all register
    pub const REPORTALL: u16 = 3;
    /// Diagnostic register
    pub const DIAGNOSTIC: u16 = 5;

    /// Value written to RESET for a normal reset
    pub const RESET_VALUE: u8 = 0x01;
    /// Value written to RESET to enter the bootloader
    pub const BOOTLOADER_VALUE: u8 = 0xA5;
    /// Value written to BACKUPNV
    pub const BACKUP_VALUE: u8 = 0x55;
    /// Value written to CALIBRATE
    pub const CALIBRATE_VALUE: u8 = 0x01;

    /// Diagnostic: next page
    pub const DIAG_PAGE_UP: u8 = 0x01;
    /// Diagnostic: capture deltas
    pub const DIAG_DELTAS: u8 = 0x10;
    /// Diagnostic: capture references
    pub const DIAG_REFS: u8 = 0x11;

    bitflags! {
        /// Status byte of a T6 message
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct Status: u8 {
            /// Device has reset
            const RESET = 0x80;
            /// Overflow
            const OFL = 0x40;
            /// Acquisition error
            const SIGERR = 0x20;
            /// Calibration in progress
            const CAL = 0x10;
            /// Configuration error
            const CFGERR = 0x08;
            /// Communication error
            const COMSERR = 0x04;
        }
    }
}

/// Self test (T25)
pub mod t25 {
    /// Control register
    pub const CTRL: u16 = 0;
    /// Command register
    pub const CMD: u16 = 1;
    /// Enable with reporting
    pub const CTRL_ENABLE_REPORT: u8 = 0x03;
    /// Run all tests
    pub const CMD_RUN_ALL: u8 = 0xFE;
    /// Result code: all tests passed
    pub const RESULT_PASS: u8 = 0xFE;
    /// Result code: test code not supported
    pub const RESULT_INVALID: u8 = 0xFD;
}

/// Diagnostic debug (T37)
pub mod t37 {
    /// Mode byte
    pub const MODE: u16 = 0;
    /// Page byte
    pub const PAGE: u16 = 1;
    /// First data byte
    pub const DATA: u16 = 2;
}

/// Golden references (T66)
pub mod t66 {
    use bitflags::bitflags;

    /// Control register
    pub const CTRL: u16 = 0;
    /// Enable bit
    pub const CTRL_ENABLE: u8 = 0x01;
    /// Report enable bit
    pub const CTRL_RPTEN: u8 = 0x02;
    /// Prime command
    pub const CMD_PRIME: u8 = 0x04;
    /// Generate command
    pub const CMD_GENERATE: u8 = 0x08;
    /// Store command
    pub const CMD_STORE: u8 = 0x0C;

    /// Mask for the sequence state field
    pub const STATE_MASK: u8 = 0x06;
    /// Sequence idle
    pub const STATE_IDLE: u8 = 0x00;
    /// References primed
    pub const STATE_PRIMED: u8 = 0x02;
    /// References generated
    pub const STATE_GENERATED: u8 = 0x04;

    bitflags! {
        /// Status byte of a T66 message
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct Status: u8 {
            /// Bad stored data
            const BADSTOREDATA = 0x01;
            /// Sequence error
            const SEQERR = 0x08;
            /// Sequence timeout
            const SEQTO = 0x10;
            /// Sequence done
            const SEQDONE = 0x20;
            /// Generation passed
            const PASS = 0x40;
            /// Generation failed
            const FAIL = 0x80;
        }
    }
}

/// Serial data command (T68)
pub mod t68 {
    /// Control register
    pub const CTRL: u16 = 0;
    /// Datatype (16 bit, little endian)
    pub const DATATYPE: u16 = 3;
    /// Length of the data in the current chunk
    pub const LENGTH: u16 = 5;
    /// First data byte
    pub const DATA: u16 = 6;
    /// Bytes in the object that are not data
    pub const OVERHEAD: usize = 7;

    /// Enable
    pub const CTRL_ENABLE: u8 = 0x01;
    /// Report enable
    pub const CTRL_RPTEN: u8 = 0x02;

    /// Start a new transfer
    pub const CMD_START: u8 = 0x01;
    /// Continue the transfer
    pub const CMD_CONTINUE: u8 = 0x02;
    /// End the transfer
    pub const CMD_END: u8 = 0x03;
}
