//! Interactive menu, run when no command is given

use crate::session::Session;
use mxt_core::address::resolve;
use mxt_core::hex::decode_hex_into;
use mxt_core::orchestrator::{Operations, ReadRequest};
use mxt_core::Result;

const MENU: &str = "\
Main menu:
  (i) show info block
  (r) read object
  (w) write object
  (b) backup configuration
  (c) calibrate
  (s) reset
  (t) run self tests
  (q) quit";

enum Choice {
    Info,
    Read,
    Write,
    Backup,
    Calibrate,
    Reset,
    SelfTest,
    Quit,
}

impl Choice {
    fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "i" => Some(Self::Info),
            "r" => Some(Self::Read),
            "w" => Some(Self::Write),
            "b" => Some(Self::Backup),
            "c" => Some(Self::Calibrate),
            "s" => Some(Self::Reset),
            "t" => Some(Self::SelfTest),
            "q" => Some(Self::Quit),
            _ => None,
        }
    }
}

impl Session<'_> {
    /// Print `text` and read one line; `None` at end of input
    fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Prompt for a number; `None` at end of input or on bad input
    fn prompt_number<T: std::str::FromStr>(&mut self, text: &str) -> Result<Option<T>> {
        let Some(line) = self.prompt(text)? else {
            return Ok(None);
        };
        match line.parse() {
            Ok(value) => Ok(Some(value)),
            Err(_) => {
                writeln!(self.output, "Invalid number '{}'", line)?;
                Ok(None)
            }
        }
    }

    fn show_info(&mut self) -> Result<()> {
        let info = self.handle.info().clone();
        writeln!(
            self.output,
            "Family: 0x{:02X} Variant: 0x{:02X} Firmware: {}",
            info.id.family_id,
            info.id.variant_id,
            info.id.firmware_version()
        )?;
        writeln!(
            self.output,
            "Matrix: {}x{} Objects: {} Info CRC: 0x{:06X}",
            info.id.matrix_x_size,
            info.id.matrix_y_size,
            info.objects.len(),
            info.crc
        )?;
        for object in &info.objects {
            writeln!(
                self.output,
                "  T{:<3} start 0x{:04X} size {:3} instances {:2} report ids {}",
                object.object_type,
                object.start_address,
                object.size,
                object.instances,
                object.num_report_ids
            )?;
        }
        Ok(())
    }

    fn menu_read(&mut self) -> Result<()> {
        let Some(object_type) = self.prompt_number::<u16>("Object type: ")? else {
            return Ok(());
        };
        let Some(instance) = self.prompt_number::<u8>("Instance: ")? else {
            return Ok(());
        };
        let window = resolve(self.directory(), object_type, instance, 0, 0)?;
        self.read_registers(&ReadRequest {
            window,
            object: Some((object_type, instance)),
            format: true,
        })
    }

    fn menu_write(&mut self) -> Result<()> {
        let Some(object_type) = self.prompt_number::<u16>("Object type: ")? else {
            return Ok(());
        };
        let Some(instance) = self.prompt_number::<u8>("Instance: ")? else {
            return Ok(());
        };
        let Some(offset) = self.prompt_number::<u16>("Offset: ")? else {
            return Ok(());
        };
        let Some(hex) = self.prompt("Data (hex): ")? else {
            return Ok(());
        };

        let mut window = resolve(self.directory(), object_type, instance, offset, 0)?;
        window.length = window.length.saturating_sub(usize::from(offset));
        let data = decode_hex_into(&hex, window.length)?;
        window.length = data.len();
        self.write_registers(window, &data)
    }

    pub(crate) fn run_menu(&mut self) -> Result<()> {
        loop {
            writeln!(self.output, "{}", MENU)?;
            let Some(line) = self.prompt("> ")? else {
                return Ok(());
            };
            let Some(choice) = Choice::parse(&line) else {
                writeln!(self.output, "Unknown choice '{}'", line)?;
                continue;
            };

            let result = match choice {
                Choice::Info => self.show_info(),
                Choice::Read => self.menu_read(),
                Choice::Write => self.menu_write(),
                Choice::Backup => self.backup(),
                Choice::Calibrate => self.calibrate(),
                Choice::Reset => self.reset(false),
                Choice::SelfTest => self.self_test(),
                Choice::Quit => return Ok(()),
            };

            // A failed action leaves the menu running
            if let Err(e) = result {
                log::error!("{}", e);
                writeln!(self.output, "Error: {}", e)?;
            }
        }
    }
}
