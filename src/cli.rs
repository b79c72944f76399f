//! CLI argument parsing
//!
//! The command line is a flat list of options. Command options select the
//! operation and may appear at most once in total; modifier options may be
//! repeated and the last one wins.

use clap::parser::ValueSource;
use clap::{ArgAction, ArgMatches, Parser};
use mxt_core::command::{select_all, Command};
use mxt_core::params::{DiagMode, ParameterSet, DEFAULT_BRIDGE_PORT, DEFAULT_T68_DATATYPE};
use mxt_core::{Error, Result};
use std::path::PathBuf;

/// Parse a number with a C-style prefix: `0x` hex, leading `0` octal,
/// decimal otherwise
fn parse_number<T: TryFrom<u64>>(s: &str) -> std::result::Result<T, String> {
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };

    let value =
        u64::from_str_radix(digits, radix).map_err(|e| format!("Invalid number '{}': {}", s, e))?;
    T::try_from(value).map_err(|_| format!("Value {} is out of range", s))
}

/// Parse an I2C address, always hexadecimal (`4a` or `0x4a`)
fn parse_hex_address(s: &str) -> std::result::Result<u8, String> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let address =
        u8::from_str_radix(digits, 16).map_err(|e| format!("Invalid hex address '{}': {}", s, e))?;
    if address > 0x7f {
        return Err(format!("Address 0x{:02x} is not a 7-bit address", address));
    }
    Ok(address)
}

/// Generate the backend note shown below the option list
fn backend_help() -> String {
    format!(
        "The bus backend is chosen with {} [available: {}]",
        mxt_device::BACKEND_ENV,
        mxt_device::backend_names_short()
    )
}

#[derive(Parser, Debug)]
#[command(name = "mxt-app")]
#[command(author, version, about = "Command line tool for maXTouch touch controllers", long_about = None)]
#[command(after_help = backend_help())]
pub struct Cli {
    /// Read from object
    #[arg(short = 'R', long, action = ArgAction::Count, help_heading = "Commands")]
    pub read: u8,

    /// Write to object (hex data as trailing argument)
    #[arg(short = 'W', long, action = ArgAction::Count, help_heading = "Commands")]
    pub write: u8,

    /// Run all self tests
    #[arg(short = 't', long, action = ArgAction::Count, help_heading = "Commands")]
    pub test: u8,

    /// Store golden references
    #[arg(short = 'g', action = ArgAction::Count, help_heading = "Commands")]
    pub golden_references: u8,

    /// Connect to a bridge server at HOST
    #[arg(short = 'C', long, value_name = "HOST", help_heading = "Commands")]
    pub bridge_client: Vec<String>,

    /// Start a bridge server on the TCP port
    #[arg(short = 'S', long, action = ArgAction::Count, help_heading = "Commands")]
    pub bridge_server: u8,

    /// Send firmware FIRMWARE to the bootloader
    #[arg(long, value_name = "FIRMWARE", help_heading = "Commands")]
    pub flash: Vec<PathBuf>,

    /// Reset device
    #[arg(long, action = ArgAction::Count, help_heading = "Commands")]
    pub reset: u8,

    /// Reset device into bootloader mode
    #[arg(long, action = ArgAction::Count, help_heading = "Commands")]
    pub reset_bootloader: u8,

    /// Back up configuration to non-volatile memory
    #[arg(long, action = ArgAction::Count, help_heading = "Commands")]
    pub backup: u8,

    /// Send calibrate command
    #[arg(long, action = ArgAction::Count, help_heading = "Commands")]
    pub calibrate: u8,

    /// Capture T37 diagnostic data to FILE
    #[arg(long, value_name = "FILE", help_heading = "Commands")]
    pub debug_dump: Vec<PathBuf>,

    /// Upload config from FILE, back it up and reset
    #[arg(long, value_name = "FILE", help_heading = "Commands")]
    pub load: Vec<PathBuf>,

    /// Save config to FILE
    #[arg(long, value_name = "FILE", help_heading = "Commands")]
    pub save: Vec<PathBuf>,

    /// Upload T68 serial data from FILE
    #[arg(long, value_name = "FILE", help_heading = "Commands")]
    pub t68_file: Vec<PathBuf>,

    /// Number of bytes to read or write
    #[arg(short = 'n', long, default_value_t = 0, hide_default_value = true,
          value_parser = parse_number::<u16>, overrides_with = "count")]
    pub count: u16,

    /// Format register output
    #[arg(short = 'f', long, overrides_with = "format")]
    pub format: bool,

    /// Object instance
    #[arg(short = 'I', long, default_value_t = 0, hide_default_value = true,
          value_parser = parse_number::<u8>, overrides_with = "instance")]
    pub instance: u8,

    /// Start register, or offset into the object when a type is given
    #[arg(short = 'r', long, value_name = "ADDR", default_value_t = 0, hide_default_value = true,
          value_parser = parse_number::<u16>, overrides_with = "register")]
    pub register: u16,

    /// Object type
    #[arg(short = 'T', long = "type", value_name = "TYPE", default_value_t = 0,
          hide_default_value = true, value_parser = parse_number::<u16>,
          overrides_with = "object_type")]
    pub object_type: u16,

    /// Verbosity level (0 info, 1 debug, 2 trace)
    #[arg(short = 'v', long, value_name = "LEVEL", default_value_t = 0, hide_default_value = true,
          value_parser = parse_number::<u8>, overrides_with = "verbose")]
    pub verbose: u8,

    /// TCP port for the bridge
    #[arg(short = 'p', long, default_value_t = DEFAULT_BRIDGE_PORT,
          value_parser = parse_number::<u16>, overrides_with = "port")]
    pub port: u16,

    /// I2C adapter number
    #[arg(short = 'd', long, value_name = "ADAPTER",
          value_parser = parse_number::<u32>, overrides_with = "i2c_adapter")]
    pub i2c_adapter: Option<u32>,

    /// I2C device address in hex
    #[arg(short = 'a', long, value_name = "ADDRESS",
          value_parser = parse_hex_address, overrides_with = "i2c_address")]
    pub i2c_address: Option<u8>,

    /// Check the firmware version before and after flashing
    #[arg(long, value_name = "VERSION", overrides_with = "firmware_version")]
    pub firmware_version: Option<String>,

    /// Number of T37 frames to capture
    #[arg(long, default_value_t = 1, value_parser = parse_number::<u16>, overrides_with = "frames")]
    pub frames: u16,

    /// Capture references instead of deltas
    #[arg(long, overrides_with = "references")]
    pub references: bool,

    /// T68 serial data type
    #[arg(long, value_name = "DATATYPE", default_value_t = DEFAULT_T68_DATATYPE,
          value_parser = parse_number::<u16>, overrides_with = "t68_datatype")]
    pub t68_datatype: u16,

    /// Hex data for --write
    #[arg(value_name = "HEX")]
    pub positional: Vec<String>,
}

/// Record `command` once per occurrence of a counted flag
///
/// clap only keeps the index of the last occurrence of a flag, so repeats
/// are placed there.
fn push_flag(
    requested: &mut Vec<(usize, Command)>,
    matches: &ArgMatches,
    id: &str,
    command: Command,
) {
    if matches.value_source(id) != Some(ValueSource::CommandLine) {
        return;
    }
    let Some(index) = matches.indices_of(id).and_then(|indices| indices.last()) else {
        return;
    };
    let count = usize::from(matches.get_count(id));
    requested.extend(std::iter::repeat_n((index, command), count));
}

/// Record one command per value of a command option
fn push_values<T: Clone>(
    requested: &mut Vec<(usize, Command)>,
    matches: &ArgMatches,
    id: &str,
    values: &[T],
    make: impl Fn(T) -> Command,
) {
    if let Some(indices) = matches.indices_of(id) {
        requested.extend(indices.zip(values.iter().cloned().map(make)));
    }
}

impl Cli {
    /// Command options in the order they were given
    fn requested_commands(&self, matches: &ArgMatches) -> Vec<Command> {
        let mut requested = Vec::new();

        push_flag(&mut requested, matches, "read", Command::Read);
        push_flag(&mut requested, matches, "write", Command::Write);
        push_flag(&mut requested, matches, "test", Command::Test);
        push_flag(&mut requested, matches, "golden_references", Command::GoldenReferences);
        push_flag(&mut requested, matches, "bridge_server", Command::BridgeServer);
        push_flag(&mut requested, matches, "reset", Command::Reset);
        push_flag(&mut requested, matches, "reset_bootloader", Command::ResetBootloader);
        push_flag(&mut requested, matches, "backup", Command::Backup);
        push_flag(&mut requested, matches, "calibrate", Command::Calibrate);

        push_values(&mut requested, matches, "bridge_client", &self.bridge_client, Command::BridgeClient);
        push_values(&mut requested, matches, "flash", &self.flash, Command::Flash);
        push_values(&mut requested, matches, "debug_dump", &self.debug_dump, Command::DebugDump);
        push_values(&mut requested, matches, "load", &self.load, Command::LoadConfig);
        push_values(&mut requested, matches, "save", &self.save, Command::SaveConfig);
        push_values(&mut requested, matches, "t68_file", &self.t68_file, Command::SerialDataUpload);

        requested.sort_by_key(|&(index, _)| index);
        requested.into_iter().map(|(_, command)| command).collect()
    }

    /// Select the command of this invocation
    ///
    /// Fails on a second command option, or on positional arguments for
    /// anything but a write.
    pub fn command(&self, matches: &ArgMatches) -> Result<Command> {
        let command = select_all(self.requested_commands(matches))?;
        if !self.positional.is_empty() && command != Command::Write {
            return Err(Error::Usage(format!(
                "unexpected argument '{}'",
                self.positional[0]
            )));
        }
        Ok(command)
    }

    /// Collect the modifiers into a parameter set
    pub fn parameters(&self) -> ParameterSet {
        ParameterSet {
            register: self.register,
            count: self.count,
            object_type: self.object_type,
            instance: self.instance,
            verbose: self.verbose,
            format: self.format,
            port: self.port,
            firmware_version: self.firmware_version.clone(),
            frames: self.frames,
            diag_mode: if self.references {
                DiagMode::References
            } else {
                DiagMode::Deltas
            },
            t68_datatype: self.t68_datatype,
            i2c_adapter: self.i2c_adapter,
            i2c_address: self.i2c_address,
            positional: self.positional.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};

    fn parse(args: &[&str]) -> std::result::Result<(Cli, ArgMatches), clap::Error> {
        let matches =
            <Cli as CommandFactory>::command().try_get_matches_from(std::iter::once("mxt-app").chain(args.iter().copied()))?;
        let cli = Cli::from_arg_matches(&matches)?;
        Ok((cli, matches))
    }

    fn command(args: &[&str]) -> Result<Command> {
        let (cli, matches) = parse(args).unwrap();
        cli.command(&matches)
    }

    #[test]
    fn test_cli_is_well_formed() {
        <Cli as CommandFactory>::command().debug_assert();
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number::<u16>("0x10"), Ok(16));
        assert_eq!(parse_number::<u16>("010"), Ok(8));
        assert_eq!(parse_number::<u16>("10"), Ok(10));
        assert_eq!(parse_number::<u16>("0"), Ok(0));
        assert!(parse_number::<u8>("256").is_err());
        assert!(parse_number::<u16>("09").is_err());
        assert!(parse_number::<u16>("x").is_err());
    }

    #[test]
    fn test_hex_address() {
        assert_eq!(parse_hex_address("4a"), Ok(0x4a));
        assert_eq!(parse_hex_address("0x4A"), Ok(0x4a));
        assert!(parse_hex_address("80").is_err());
        assert!(parse_hex_address("zz").is_err());
    }

    #[test]
    fn test_no_command_means_menu() {
        assert_eq!(command(&[]).unwrap(), Command::None);
    }

    #[test]
    fn test_single_commands() {
        assert_eq!(command(&["-R", "-T", "7"]).unwrap(), Command::Read);
        assert_eq!(command(&["-g"]).unwrap(), Command::GoldenReferences);
        assert_eq!(
            command(&["--flash", "fw.enc"]).unwrap(),
            Command::Flash("fw.enc".into())
        );
        assert_eq!(
            command(&["-C", "host"]).unwrap(),
            Command::BridgeClient("host".into())
        );
        assert_eq!(
            command(&["--t68-file", "serial.txt"]).unwrap(),
            Command::SerialDataUpload("serial.txt".into())
        );
    }

    #[test]
    fn test_conflict_reports_argv_order() {
        let err = command(&["--backup", "--flash", "fw.enc"]).unwrap_err();
        assert!(matches!(
            err,
            Error::ConflictingCommands {
                first: "backup",
                second: "flash"
            }
        ));

        let err = command(&["--flash", "fw.enc", "--backup"]).unwrap_err();
        assert!(matches!(
            err,
            Error::ConflictingCommands {
                first: "flash",
                second: "backup"
            }
        ));
    }

    #[test]
    fn test_repeated_command_conflicts() {
        assert!(command(&["--reset", "--reset"]).unwrap_err().is_usage());
        assert!(command(&["--save", "a", "--save", "b"]).unwrap_err().is_usage());
    }

    #[test]
    fn test_positional_only_for_write() {
        assert_eq!(command(&["-W", "-T", "7", "0102"]).unwrap(), Command::Write);
        assert!(matches!(
            command(&["--reset", "0102"]),
            Err(Error::Usage(_))
        ));
    }

    #[test]
    fn test_modifiers_last_wins() {
        let (cli, _) = parse(&["-n", "4", "-n", "0x10", "-T", "9", "-T", "7"]).unwrap();
        let params = cli.parameters();
        assert_eq!(params.count, 16);
        assert_eq!(params.object_type, 7);
    }

    #[test]
    fn test_parameters() {
        let (cli, _) = parse(&[
            "-d", "2", "-a", "4a", "-I", "1", "-r", "010", "--references", "--frames", "3",
        ])
        .unwrap();
        let params = cli.parameters();
        assert_eq!(params.i2c_adapter, Some(2));
        assert_eq!(params.i2c_address, Some(0x4a));
        assert_eq!(params.instance, 1);
        assert_eq!(params.register, 8);
        assert_eq!(params.diag_mode, DiagMode::References);
        assert_eq!(params.frames, 3);
        assert_eq!(params.port, DEFAULT_BRIDGE_PORT);
        assert_eq!(params.t68_datatype, DEFAULT_T68_DATATYPE);
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(parse(&["-I", "300"]).is_err());
        assert!(parse(&["-p", "port"]).is_err());
        assert!(parse(&["--unknown"]).is_err());
    }
}
