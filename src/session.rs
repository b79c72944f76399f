//! Operations on an open device
//!
//! `Session` implements the orchestrator's `Operations` trait on top of a
//! `DeviceHandle`. Register dumps and the menu go to the session's output,
//! everything else is logged.

use crate::progress::BarProgress;
use mxt_core::address::RegisterWindow;
use mxt_core::hex::encode_hex;
use mxt_core::info::ObjectDirectory;
use mxt_core::orchestrator::{Operations, ReadRequest};
use mxt_core::params::DiagMode;
use mxt_core::{bridge, config, ops, Result};
use mxt_device::DeviceHandle;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

/// An open device plus the terminal it is driven from
pub struct Session<'a> {
    pub(crate) handle: &'a mut DeviceHandle,
    pub(crate) input: &'a mut dyn BufRead,
    pub(crate) output: &'a mut dyn Write,
}

impl<'a> Session<'a> {
    pub fn new(
        handle: &'a mut DeviceHandle,
        input: &'a mut dyn BufRead,
        output: &'a mut dyn Write,
    ) -> Self {
        Self {
            handle,
            input,
            output,
        }
    }

    /// Print register contents
    ///
    /// Formatted output lists one byte per line with its offset; otherwise
    /// the bytes are printed as a single hex line.
    pub(crate) fn print_registers(&mut self, request: &ReadRequest, data: &[u8]) -> Result<()> {
        match request.object {
            Some((object_type, instance)) if request.format => {
                writeln!(
                    self.output,
                    "T{} instance {} (0x{:04X}, {} bytes):",
                    object_type,
                    instance,
                    request.window.address,
                    data.len()
                )?;
                for (i, byte) in data.iter().enumerate() {
                    writeln!(self.output, "[{:3}]: 0x{:02X} ({})", i, byte, byte)?;
                }
            }
            _ if request.format => {
                for (i, byte) in data.iter().enumerate() {
                    let addr = usize::from(request.window.address) + i;
                    writeln!(self.output, "0x{:04X}: 0x{:02X} ({})", addr, byte, byte)?;
                }
            }
            _ => writeln!(self.output, "{}", encode_hex(data, " "))?,
        }
        Ok(())
    }
}

impl Operations for Session<'_> {
    fn directory(&self) -> &dyn ObjectDirectory {
        self.handle.info()
    }

    fn read_registers(&mut self, request: &ReadRequest) -> Result<()> {
        let mut buf = vec![0u8; request.window.length];
        self.handle
            .device()
            .read_register(request.window.address, &mut buf)?;
        self.print_registers(request, &buf)
    }

    fn write_registers(&mut self, window: RegisterWindow, data: &[u8]) -> Result<()> {
        self.handle.device().write_register(window.address, data)?;
        log::info!("Wrote {} bytes to 0x{:04X}", data.len(), window.address);
        Ok(())
    }

    fn self_test(&mut self) -> Result<()> {
        let (dev, info) = self.handle.parts();
        ops::run_self_tests(dev, info)
    }

    fn store_golden_references(&mut self) -> Result<()> {
        let (dev, info) = self.handle.parts();
        ops::store_golden_references(dev, info)
    }

    fn bridge_client(&mut self, host: &str, port: u16) -> Result<()> {
        let (dev, info) = self.handle.parts();
        bridge::run_client(dev, info, host, port)
    }

    fn bridge_server(&mut self, port: u16) -> Result<()> {
        let (dev, info) = self.handle.parts();
        bridge::run_server(dev, info, port)
    }

    fn serial_data_upload(&mut self, path: &Path, datatype: u16) -> Result<()> {
        let (dev, info) = self.handle.parts();
        ops::upload_serial_data(dev, info, path, datatype)
    }

    fn reset(&mut self, bootloader: bool) -> Result<()> {
        let (dev, info) = self.handle.parts();
        ops::reset(dev, info, bootloader)
    }

    fn backup(&mut self) -> Result<()> {
        let (dev, info) = self.handle.parts();
        ops::backup(dev, info)
    }

    fn calibrate(&mut self) -> Result<()> {
        let (dev, info) = self.handle.parts();
        ops::calibrate(dev, info)
    }

    fn debug_dump(&mut self, mode: DiagMode, path: &Path, frames: u16) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        let (dev, info) = self.handle.parts();
        ops::debug_dump(dev, info, mode, frames, &mut out, &mut BarProgress::new())?;
        log::info!("Wrote {}", path.display());
        Ok(())
    }

    fn load_config(&mut self, path: &Path) -> Result<()> {
        let (dev, info) = self.handle.parts();
        config::load_config_file(dev, info, path)
    }

    fn save_config(&mut self, path: &Path) -> Result<()> {
        let (dev, info) = self.handle.parts();
        config::save_config_file(dev, info, path)
    }

    fn menu(&mut self) -> Result<()> {
        self.run_menu()
    }
}
