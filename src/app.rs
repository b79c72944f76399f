//! Invocation driver
//!
//! Parses the command line, selects the command, opens the device and
//! hands the command to the orchestrator. Returns the process exit status.

use crate::cli::Cli;
use crate::commands;
use crate::session::Session;
use clap::{CommandFactory, FromArgMatches};
use mxt_core::command::Command;
use mxt_core::device::{Connector, DeviceTarget};
use mxt_core::orchestrator::execute;
use mxt_core::params::ParameterSet;
use mxt_core::{Error, Result};
use mxt_device::DeviceHandle;
use std::ffi::OsString;
use std::io::{BufRead, Write};

/// Successful termination
pub const EXIT_OK: u8 = 0;
/// Any failure that is not a usage or device problem
pub const EXIT_FAILURE: u8 = 1;
/// Bad command line
pub const EXIT_USAGE: u8 = 64;
/// Device could not be opened
pub const EXIT_UNAVAILABLE: u8 = 69;

/// Exit status for an error
pub fn exit_code(error: &Error) -> u8 {
    if error.is_usage() {
        EXIT_USAGE
    } else if error.is_device_unavailable() {
        EXIT_UNAVAILABLE
    } else {
        EXIT_FAILURE
    }
}

/// Raise the log level according to `-v`
fn apply_verbosity(verbose: u8) {
    match verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }
}

/// Parse `args` into a parameter set and the selected command
///
/// `Err(code)` means the invocation is already over: help or version was
/// printed, or the command line was rejected by the parser.
fn parse<I, T>(args: I) -> std::result::Result<(ParameterSet, Result<Command>), u8>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let parsed = <Cli as CommandFactory>::command()
        .try_get_matches_from(args)
        .and_then(|matches| Cli::from_arg_matches(&matches).map(|cli| (cli, matches)));

    let (cli, matches) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => {
            let _ = e.print();
            return Err(if e.use_stderr() { EXIT_USAGE } else { EXIT_OK });
        }
    };

    apply_verbosity(cli.verbose);
    Ok((cli.parameters(), cli.command(&matches)))
}

/// Open the device and run a command on it
///
/// The device is released when the handle goes out of scope, whatever the
/// command returned.
fn run_on_device(
    connector: &mut dyn Connector,
    command: &Command,
    params: &ParameterSet,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<()> {
    let target = DeviceTarget::from_params(params);
    let mut handle = DeviceHandle::open(connector, &target)?;
    let mut session = Session::new(&mut handle, input, output);
    execute(&mut session, command, params)
}

/// Run one invocation with the given terminal
///
/// `open_connector` is only called once a command actually needs the bus.
pub fn run_with<I, T, F>(
    args: I,
    open_connector: F,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    F: FnOnce() -> Result<Box<dyn Connector>>,
{
    let (params, command) = match parse(args) {
        Ok(parsed) => parsed,
        Err(code) => return code,
    };

    let command = match command {
        Ok(command) => command,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("{}", <Cli as CommandFactory>::command().render_usage());
            return exit_code(&e);
        }
    };

    if matches!(command, Command::Read | Command::Write) {
        params.log_addressing();
    }

    let result = open_connector().and_then(|mut connector| match &command {
        Command::Flash(path) => commands::flash::run_flash(
            connector.as_mut(),
            &DeviceTarget::from_params(&params),
            path,
            params.firmware_version.as_deref(),
        ),
        _ => run_on_device(connector.as_mut(), &command, &params, input, output),
    });

    match result {
        Ok(()) => EXIT_OK,
        Err(e) => {
            log::error!("{}", e);
            exit_code(&e)
        }
    }
}

/// Run one invocation on the process terminal
pub fn run<I, T, F>(args: I, open_connector: F) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    F: FnOnce() -> Result<Box<dyn Connector>>,
{
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();
    run_with(args, open_connector, &mut input, &mut output)
}
