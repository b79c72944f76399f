//! Golden references (T66)
//!
//! Storing golden references is a three step sequence. Each step writes a
//! command to the T66 control register and waits for the status message
//! confirming the new sequence state. A step that reports an error flag or
//! the wrong state stops the sequence.

use super::messages::wait_for_message;
use crate::chain::StepChain;
use crate::device::RegisterAccess;
use crate::error::{Error, Result};
use crate::info::InfoBlock;
use crate::objects::{t66, types};

/// Time allowed for each step of the sequence
const STEP_TIMEOUT_MS: u32 = 10_000;

struct Golden<'d, D: ?Sized> {
    device: &'d mut D,
    info: &'d InfoBlock,
    base: u16,
}

impl<D: RegisterAccess + ?Sized> Golden<'_, D> {
    /// Send `command` and check the reported state against `expected`
    fn command(&mut self, command: u8, expected: u8, what: &'static str) -> Result<t66::Status> {
        let ctrl = t66::CTRL_ENABLE | t66::CTRL_RPTEN | command;
        self.device.write_register(self.base + t66::CTRL, &[ctrl])?;

        let message = wait_for_message(
            &mut *self.device,
            self.info,
            types::SPT_GOLDENREFERENCES_T66,
            STEP_TIMEOUT_MS,
            what,
        )?;
        let raw = message.status();
        let status = t66::Status::from_bits_truncate(raw);
        log::debug!("T66 status 0x{:02X} ({:?})", raw, status);

        let errors = t66::Status::BADSTOREDATA
            | t66::Status::SEQERR
            | t66::Status::SEQTO
            | t66::Status::FAIL;
        if status.intersects(errors) || raw & t66::STATE_MASK != expected {
            return Err(Error::GoldenReferences(raw));
        }
        Ok(status)
    }
}

fn golden_chain<'d, D: RegisterAccess + ?Sized + 'd>() -> StepChain<'d, Golden<'d, D>> {
    StepChain::new()
        .step("prime", "Golden references primed", |g: &mut Golden<'d, D>| {
            g.command(t66::CMD_PRIME, t66::STATE_PRIMED, "golden references prime")
                .map(drop)
        })
        .step(
            "generate",
            "Golden references generated",
            |g: &mut Golden<'d, D>| {
                let status = g.command(
                    t66::CMD_GENERATE,
                    t66::STATE_GENERATED,
                    "golden references generate",
                )?;
                if !status.contains(t66::Status::PASS) {
                    return Err(Error::GoldenReferences(status.bits()));
                }
                Ok(())
            },
        )
        .step("store", "Golden references stored", |g: &mut Golden<'d, D>| {
            let status = g.command(t66::CMD_STORE, t66::STATE_IDLE, "golden references store")?;
            if !status.contains(t66::Status::SEQDONE) {
                return Err(Error::GoldenReferences(status.bits()));
            }
            Ok(())
        })
}

/// Prime, generate and store golden references
pub fn store_golden_references<D: RegisterAccess + ?Sized>(
    device: &mut D,
    info: &InfoBlock,
) -> Result<()> {
    let t66 = info.require(types::SPT_GOLDENREFERENCES_T66, 0)?;

    while super::read_message(device, info)?.is_some() {}

    let mut golden = Golden {
        device,
        info,
        base: t66.base,
    };
    golden_chain().run(&mut golden)
}
