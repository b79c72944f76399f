//! Command execution
//!
//! `execute` dispatches the selected command onto an `Operations`
//! implementation. Most commands are a single call whose result is passed
//! through unchanged. Loading a configuration is a chain: the configuration
//! is only backed up once it loaded, and the device is only reset once the
//! configuration is backed up.

use crate::address::{resolve, RegisterWindow};
use crate::chain::StepChain;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::hex::decode_hex_into;
use crate::info::ObjectDirectory;
use crate::params::{DiagMode, ParameterSet};
use std::path::Path;

/// A resolved read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    /// Registers to read
    pub window: RegisterWindow,
    /// Object type and instance, when the read was symbolic
    pub object: Option<(u16, u8)>,
    /// Formatted output
    pub format: bool,
}

/// Everything a command can ask of an open device
pub trait Operations {
    /// Object directory of the open device
    fn directory(&self) -> &dyn ObjectDirectory;

    /// Read and print registers
    fn read_registers(&mut self, request: &ReadRequest) -> Result<()>;

    /// Write registers
    fn write_registers(&mut self, window: RegisterWindow, data: &[u8]) -> Result<()>;

    /// Run all self tests
    fn self_test(&mut self) -> Result<()>;

    /// Store golden references
    fn store_golden_references(&mut self) -> Result<()>;

    /// Connect to a bridge host and serve requests
    fn bridge_client(&mut self, host: &str, port: u16) -> Result<()>;

    /// Listen for bridge clients and serve requests
    fn bridge_server(&mut self, port: u16) -> Result<()>;

    /// Upload a T68 serial data file
    fn serial_data_upload(&mut self, path: &Path, datatype: u16) -> Result<()>;

    /// Reset the device, optionally into the bootloader
    fn reset(&mut self, bootloader: bool) -> Result<()>;

    /// Back up the configuration to non-volatile memory
    fn backup(&mut self) -> Result<()>;

    /// Calibrate
    fn calibrate(&mut self) -> Result<()>;

    /// Capture T37 diagnostic frames to a file
    fn debug_dump(&mut self, mode: DiagMode, path: &Path, frames: u16) -> Result<()>;

    /// Write the configuration from a file to the device
    fn load_config(&mut self, path: &Path) -> Result<()>;

    /// Save the device configuration to a file
    fn save_config(&mut self, path: &Path) -> Result<()>;

    /// Run the interactive menu
    fn menu(&mut self) -> Result<()>;
}

/// The chain run for `--load`: load, back up, reset
pub fn load_config_chain<'a, O: Operations + ?Sized>(path: &'a Path) -> StepChain<'a, O> {
    StepChain::new()
        .step("load", "Configuration loaded", move |ops: &mut O| {
            ops.load_config(path)
        })
        .step("backup", "Configuration backed up", |ops: &mut O| ops.backup())
        .step("reset", "Chip reset", |ops: &mut O| ops.reset(false))
}

/// Execute `command` against an open device
pub fn execute<O: Operations + ?Sized>(
    ops: &mut O,
    command: &Command,
    params: &ParameterSet,
) -> Result<()> {
    match command {
        Command::Write => {
            log::debug!("Write command");
            let window = resolve(
                ops.directory(),
                params.object_type,
                params.instance,
                params.register,
                params.count,
            )?;

            let [hex] = params.positional.as_slice() else {
                return Err(Error::Usage("Must give hex input".into()));
            };

            let data = decode_hex_into(hex, window.length)?;
            let window = RegisterWindow {
                address: window.address,
                length: data.len(),
            };
            ops.write_registers(window, &data)
        }
        Command::Read => {
            log::debug!("Read command");
            let window = resolve(
                ops.directory(),
                params.object_type,
                params.instance,
                params.register,
                params.count,
            )?;
            let object = (params.object_type != 0).then_some((params.object_type, params.instance));
            ops.read_registers(&ReadRequest {
                window,
                object,
                format: params.format,
            })
        }
        Command::GoldenReferences => ops.store_golden_references(),
        Command::BridgeServer => {
            log::debug!("port:{}", params.port);
            ops.bridge_server(params.port)
        }
        Command::BridgeClient(host) => ops.bridge_client(host, params.port),
        Command::SerialDataUpload(path) => {
            log::debug!("t68_datatype:{}", params.t68_datatype);
            ops.serial_data_upload(path, params.t68_datatype)
        }
        Command::Test => ops.self_test(),
        Command::Reset => ops.reset(false),
        Command::ResetBootloader => ops.reset(true),
        Command::Backup => ops.backup(),
        Command::Calibrate => ops.calibrate(),
        Command::DebugDump(path) => {
            log::debug!("mode:{}", params.diag_mode.name());
            log::debug!("frames:{}", params.frames);
            ops.debug_dump(params.diag_mode, path, params.frames)
        }
        Command::LoadConfig(path) => {
            log::debug!("filename:{}", path.display());
            load_config_chain(path).run(ops)
        }
        Command::SaveConfig(path) => {
            log::debug!("filename:{}", path.display());
            ops.save_config(path)
        }
        Command::Flash(_) => Err(Error::Usage(
            "flash manages its own device connection".into(),
        )),
        Command::None => ops.menu(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::ObjectAddress;
    use std::collections::HashMap;

    struct Directory;

    impl ObjectDirectory for Directory {
        fn object_address(&self, object_type: u16, instance: u8) -> Option<ObjectAddress> {
            (object_type == 7 && instance == 0).then_some(ObjectAddress { base: 100, size: 8 })
        }
    }

    /// Records every call; named operations can be told to fail
    #[derive(Default)]
    struct MockOps {
        calls: HashMap<&'static str, usize>,
        failing: Vec<&'static str>,
        writes: Vec<(RegisterWindow, Vec<u8>)>,
        reads: Vec<ReadRequest>,
    }

    impl MockOps {
        fn failing(names: &[&'static str]) -> Self {
            Self {
                failing: names.to_vec(),
                ..Default::default()
            }
        }

        fn record(&mut self, name: &'static str) -> Result<()> {
            *self.calls.entry(name).or_default() += 1;
            if self.failing.contains(&name) {
                Err(Error::Timeout(name))
            } else {
                Ok(())
            }
        }

        fn count(&self, name: &str) -> usize {
            self.calls.get(name).copied().unwrap_or(0)
        }
    }

    impl Operations for MockOps {
        fn directory(&self) -> &dyn ObjectDirectory {
            &Directory
        }
        fn read_registers(&mut self, request: &ReadRequest) -> Result<()> {
            self.reads.push(*request);
            self.record("read")
        }
        fn write_registers(&mut self, window: RegisterWindow, data: &[u8]) -> Result<()> {
            self.writes.push((window, data.to_vec()));
            self.record("write")
        }
        fn self_test(&mut self) -> Result<()> {
            self.record("self_test")
        }
        fn store_golden_references(&mut self) -> Result<()> {
            self.record("golden")
        }
        fn bridge_client(&mut self, _host: &str, _port: u16) -> Result<()> {
            self.record("bridge_client")
        }
        fn bridge_server(&mut self, _port: u16) -> Result<()> {
            self.record("bridge_server")
        }
        fn serial_data_upload(&mut self, _path: &Path, _datatype: u16) -> Result<()> {
            self.record("serial_data")
        }
        fn reset(&mut self, bootloader: bool) -> Result<()> {
            self.record(if bootloader { "reset_bootloader" } else { "reset" })
        }
        fn backup(&mut self) -> Result<()> {
            self.record("backup")
        }
        fn calibrate(&mut self) -> Result<()> {
            self.record("calibrate")
        }
        fn debug_dump(&mut self, _mode: DiagMode, _path: &Path, _frames: u16) -> Result<()> {
            self.record("debug_dump")
        }
        fn load_config(&mut self, _path: &Path) -> Result<()> {
            self.record("load")
        }
        fn save_config(&mut self, _path: &Path) -> Result<()> {
            self.record("save")
        }
        fn menu(&mut self) -> Result<()> {
            self.record("menu")
        }
    }

    fn load() -> Command {
        Command::LoadConfig("config.raw".into())
    }

    #[test]
    fn test_load_chain_steps() {
        let chain = load_config_chain::<MockOps>(Path::new("config.raw"));
        assert_eq!(chain.names(), vec!["load", "backup", "reset"]);
    }

    #[test]
    fn test_load_chain_success() {
        let mut ops = MockOps::default();
        execute(&mut ops, &load(), &ParameterSet::default()).unwrap();
        assert_eq!(ops.count("load"), 1);
        assert_eq!(ops.count("backup"), 1);
        assert_eq!(ops.count("reset"), 1);
    }

    #[test]
    fn test_load_failure_skips_backup_and_reset() {
        let mut ops = MockOps::failing(&["load"]);
        let err = execute(&mut ops, &load(), &ParameterSet::default()).unwrap_err();
        assert!(matches!(err, Error::ChainStepFailure { step: "load", .. }));
        assert_eq!(ops.count("backup"), 0);
        assert_eq!(ops.count("reset"), 0);
    }

    #[test]
    fn test_backup_failure_skips_reset() {
        let mut ops = MockOps::failing(&["backup"]);
        let err = execute(&mut ops, &load(), &ParameterSet::default()).unwrap_err();
        assert!(matches!(err, Error::ChainStepFailure { step: "backup", .. }));
        assert_eq!(ops.count("load"), 1);
        assert_eq!(ops.count("reset"), 0);
    }

    #[test]
    fn test_reset_failure_is_reported() {
        let mut ops = MockOps::failing(&["reset"]);
        let err = execute(&mut ops, &load(), &ParameterSet::default()).unwrap_err();
        assert!(matches!(err, Error::ChainStepFailure { step: "reset", .. }));
    }

    #[test]
    fn test_atomic_commands_pass_results_through() {
        let params = ParameterSet::default();
        let cases = [
            (Command::Test, "self_test"),
            (Command::GoldenReferences, "golden"),
            (Command::BridgeClient("host".into()), "bridge_client"),
            (Command::BridgeServer, "bridge_server"),
            (Command::SerialDataUpload("t68.txt".into()), "serial_data"),
            (Command::Reset, "reset"),
            (Command::ResetBootloader, "reset_bootloader"),
            (Command::Backup, "backup"),
            (Command::Calibrate, "calibrate"),
            (Command::DebugDump("dump.csv".into()), "debug_dump"),
            (Command::SaveConfig("config.raw".into()), "save"),
            (Command::None, "menu"),
        ];

        for (command, name) in cases {
            let mut ops = MockOps::default();
            execute(&mut ops, &command, &params).unwrap();
            assert_eq!(ops.count(name), 1, "{name}");

            let mut ops = MockOps::failing(&[name]);
            assert!(matches!(
                execute(&mut ops, &command, &params),
                Err(Error::Timeout(n)) if n == name
            ));
        }
    }

    #[test]
    fn test_write_short_hex_writes_parsed_length() {
        let mut ops = MockOps::default();
        let params = ParameterSet {
            object_type: 7,
            register: 2,
            positional: vec!["0102".into()],
            ..Default::default()
        };
        execute(&mut ops, &Command::Write, &params).unwrap();
        assert_eq!(
            ops.writes,
            vec![(
                RegisterWindow {
                    address: 102,
                    length: 2
                },
                vec![1, 2]
            )]
        );
    }

    #[test]
    fn test_write_long_hex_overflows() {
        let mut ops = MockOps::default();
        let params = ParameterSet {
            object_type: 7,
            count: 2,
            positional: vec!["010203".into()],
            ..Default::default()
        };
        assert!(matches!(
            execute(&mut ops, &Command::Write, &params),
            Err(Error::HexOverflow { .. })
        ));
        assert_eq!(ops.count("write"), 0);
    }

    #[test]
    fn test_write_requires_one_positional() {
        let mut params = ParameterSet {
            object_type: 7,
            ..Default::default()
        };
        let mut ops = MockOps::default();
        assert!(matches!(
            execute(&mut ops, &Command::Write, &params),
            Err(Error::Usage(_))
        ));

        params.positional = vec!["00".into(), "00".into()];
        assert!(matches!(
            execute(&mut ops, &Command::Write, &params),
            Err(Error::Usage(_))
        ));
        assert_eq!(ops.count("write"), 0);
    }

    #[test]
    fn test_write_unknown_object() {
        let mut ops = MockOps::default();
        let params = ParameterSet {
            object_type: 9,
            positional: vec!["00".into()],
            ..Default::default()
        };
        assert!(matches!(
            execute(&mut ops, &Command::Write, &params),
            Err(Error::ObjectNotFound { .. })
        ));
    }

    #[test]
    fn test_read_raw_needs_count() {
        let mut ops = MockOps::default();
        assert!(matches!(
            execute(&mut ops, &Command::Read, &ParameterSet::default()),
            Err(Error::MissingCount)
        ));
        assert_eq!(ops.count("read"), 0);
    }

    #[test]
    fn test_read_symbolic() {
        let mut ops = MockOps::default();
        let params = ParameterSet {
            object_type: 7,
            format: true,
            ..Default::default()
        };
        execute(&mut ops, &Command::Read, &params).unwrap();
        assert_eq!(
            ops.reads,
            vec![ReadRequest {
                window: RegisterWindow {
                    address: 100,
                    length: 8
                },
                object: Some((7, 0)),
                format: true,
            }]
        );
    }

    #[test]
    fn test_flash_is_not_executed_on_open_device() {
        let mut ops = MockOps::default();
        assert!(execute(&mut ops, &Command::Flash("fw.enc".into()), &ParameterSet::default()).is_err());
        assert!(ops.calls.is_empty());
    }
}
