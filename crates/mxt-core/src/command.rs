//! Primary commands and the command selector
//!
//! Exactly one primary command may be chosen per invocation. Several of them
//! are destructive (flash, reset into bootloader), so a second command flag
//! is rejected instead of silently replacing the first one.

use crate::error::{Error, Result};
use std::path::PathBuf;

/// The primary operation of an invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Command {
    /// No command given; the interactive menu runs
    #[default]
    None,
    /// Read registers
    Read,
    /// Write registers from the positional hex argument
    Write,
    /// Run all self tests
    Test,
    /// Store golden references
    GoldenReferences,
    /// Connect to a bridge host
    BridgeClient(String),
    /// Serve the bridge protocol on the TCP port
    BridgeServer,
    /// Upload a T68 serial data file
    SerialDataUpload(PathBuf),
    /// Flash a firmware file through the bootloader
    Flash(PathBuf),
    /// Reset the device
    Reset,
    /// Reset the device into bootloader mode
    ResetBootloader,
    /// Back up the configuration to non-volatile memory
    Backup,
    /// Calibrate
    Calibrate,
    /// Capture T37 diagnostic frames to a file
    DebugDump(PathBuf),
    /// Load configuration from a file, back it up and reset
    LoadConfig(PathBuf),
    /// Save configuration to a file
    SaveConfig(PathBuf),
}

impl Command {
    /// Name of the command as shown in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Write => "write",
            Self::Test => "test",
            Self::GoldenReferences => "golden-references",
            Self::BridgeClient(_) => "bridge-client",
            Self::BridgeServer => "bridge-server",
            Self::SerialDataUpload(_) => "t68-file",
            Self::Flash(_) => "flash",
            Self::Reset => "reset",
            Self::ResetBootloader => "reset-bootloader",
            Self::Backup => "backup",
            Self::Calibrate => "calibrate",
            Self::DebugDump(_) => "debug-dump",
            Self::LoadConfig(_) => "load",
            Self::SaveConfig(_) => "save",
        }
    }

    /// Whether the command needs the device to be opened in application mode
    ///
    /// Flash does its own device handshake.
    pub fn needs_device(&self) -> bool {
        !matches!(self, Self::Flash(_))
    }

    /// Whether the command is `None`
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Select `requested` as the command of this invocation
///
/// Returns the new selection when nothing was selected yet, or a
/// `ConflictingCommands` error when a command was already chosen.
pub fn select(current: Command, requested: Command) -> Result<Command> {
    if current.is_none() {
        log::debug!("Selected command: {}", requested.name());
        Ok(requested)
    } else {
        Err(Error::ConflictingCommands {
            first: current.name(),
            second: requested.name(),
        })
    }
}

/// Fold a sequence of requested commands through the selector
///
/// Stops at the first conflict.
pub fn select_all<I>(requests: I) -> Result<Command>
where
    I: IntoIterator<Item = Command>,
{
    requests.into_iter().try_fold(Command::None, select)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_from_none() {
        assert_eq!(select(Command::None, Command::Read).unwrap(), Command::Read);
    }

    #[test]
    fn test_select_conflict() {
        let err = select(Command::Read, Command::Flash("fw.enc".into())).unwrap_err();
        match err {
            Error::ConflictingCommands { first, second } => {
                assert_eq!(first, "read");
                assert_eq!(second, "flash");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_same_command_twice_conflicts() {
        assert!(select(Command::Reset, Command::Reset).is_err());
    }

    #[test]
    fn test_select_all() {
        assert_eq!(select_all(Vec::new()).unwrap(), Command::None);
        assert_eq!(
            select_all(vec![Command::Backup]).unwrap(),
            Command::Backup
        );

        let err = select_all(vec![Command::Backup, Command::Calibrate, Command::Reset]).unwrap_err();
        assert!(matches!(
            err,
            Error::ConflictingCommands {
                first: "backup",
                second: "calibrate"
            }
        ));
    }

    #[test]
    fn test_every_pair_conflicts() {
        let all = [
            Command::Read,
            Command::Write,
            Command::Test,
            Command::GoldenReferences,
            Command::BridgeClient("host".into()),
            Command::BridgeServer,
            Command::SerialDataUpload("t68.txt".into()),
            Command::Flash("fw.enc".into()),
            Command::Reset,
            Command::ResetBootloader,
            Command::Backup,
            Command::Calibrate,
            Command::DebugDump("dump.csv".into()),
            Command::LoadConfig("cfg.raw".into()),
            Command::SaveConfig("cfg.raw".into()),
        ];

        for a in &all {
            for b in &all {
                let err = select_all(vec![a.clone(), b.clone()]).unwrap_err();
                assert!(err.is_usage());
            }
        }
    }
}
